use std::collections::BTreeSet;

use crate::math::geo::{GeoHelper, KN_TO_MPS, METERS_PER_NM};
use crate::model::{
    EnvironmentSummary, FieldConfidence, FusedState, GeoPoint, SensorExtras, SensorKind,
    SensorReading, Target,
};
use crate::pipeline::history::HistoryBuffer;
use crate::pipeline::tracker::{Observation, TargetTracker};
use crate::prelude::FusionConfig;
use crate::telemetry::log::LogManager;

/// Semantic field a reading sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedField {
    Position,
    Speed,
    Course,
    Heading,
}

/// A reading excluded from this cycle's average, kept as degraded-sensor
/// evidence for the anomaly detector.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSample {
    pub kind: SensorKind,
    pub field: FusedField,
    pub deviation: f64,
    pub limit: f64,
}

/// Same-cycle position disagreement between two sensor kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSpread {
    pub first: SensorKind,
    pub second: SensorKind,
    pub meters: f64,
}

/// Cross-stage evidence produced by fusion and consumed by the anomaly
/// detector; fusion itself never acts on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionEvidence {
    pub rejected: Vec<RejectedSample>,
    pub position_spread: Vec<PositionSpread>,
}

/// Everything one fusion pass yields. The tracker is the proposed next
/// arena state; the orchestrator commits it when the cycle completes.
#[derive(Debug, Clone)]
pub struct FusionOutcome {
    pub state: FusedState,
    pub targets: Vec<Target>,
    pub tracker: TargetTracker,
    pub evidence: FusionEvidence,
    pub environment: EnvironmentSummary,
}

/// Sensor fusion stage: reliability-weighted averaging with outlier
/// rejection, temporal smoothing, and RADAR/AIS target correlation.
pub struct FusionStage {
    config: FusionConfig,
    logger: LogManager,
}

impl FusionStage {
    pub fn new(config: FusionConfig) -> Self {
        Self {
            config,
            logger: LogManager::new(),
        }
    }

    pub fn fuse(
        &self,
        readings: &[SensorReading],
        history: &HistoryBuffer,
        tracker: &TargetTracker,
    ) -> FusionOutcome {
        let previous = history.last();
        let mut evidence = FusionEvidence::default();
        let mut contributors: BTreeSet<SensorKind> = BTreeSet::new();

        let environment = collect_environment(readings);
        let timestamp = readings
            .iter()
            .map(|r| r.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);

        if readings.is_empty() {
            let state = match previous {
                Some(prev) => FusedState {
                    contributors: Vec::new(),
                    confidence: FieldConfidence::uniform(self.config.confidence_floor),
                    ..prev.clone()
                },
                None => FusedState::default(),
            };
            self.logger
                .record("FusionStage empty batch, carrying previous state");
            let mut next_tracker = tracker.clone();
            let targets = self.correlate_targets(readings, &state, &mut next_tracker);
            return FusionOutcome {
                state,
                targets,
                tracker: next_tracker,
                evidence,
                environment,
            };
        }

        // Pairwise position spread across sensor kinds, recorded before any
        // rejection so disagreement between two live sensors is never hidden.
        let position_samples: Vec<(SensorKind, GeoPoint, f64)> = readings
            .iter()
            .filter_map(|r| r.position.map(|p| (r.kind, p, r.weight)))
            .collect();
        for i in 0..position_samples.len() {
            for j in (i + 1)..position_samples.len() {
                let (kind_a, pos_a, _) = position_samples[i];
                let (kind_b, pos_b, _) = position_samples[j];
                if kind_a == kind_b {
                    continue;
                }
                evidence.position_spread.push(PositionSpread {
                    first: kind_a,
                    second: kind_b,
                    meters: GeoHelper::haversine_m(pos_a, pos_b),
                });
            }
        }

        let (position, position_confidence) = self.fuse_position(
            &position_samples,
            previous,
            &mut evidence,
            &mut contributors,
        );

        let speed_samples: Vec<(SensorKind, f64, f64)> = readings
            .iter()
            .filter_map(|r| r.speed_kn.map(|s| (r.kind, s, r.weight)))
            .collect();
        let (speed_kn, speed_confidence) =
            self.fuse_speed(&speed_samples, previous, &mut evidence, &mut contributors);

        let course_samples: Vec<(SensorKind, f64, f64)> = readings
            .iter()
            .filter_map(|r| r.course_deg.map(|c| (r.kind, c, r.weight)))
            .collect();
        let (course_deg, course_confidence) = self.fuse_angle(
            &course_samples,
            previous.map(|p| (p.course_deg, p.confidence.course)),
            &mut contributors,
        );

        let heading_samples: Vec<(SensorKind, f64, f64)> = readings
            .iter()
            .filter_map(|r| r.heading_deg.map(|h| (r.kind, h, r.weight)))
            .collect();
        let (heading_deg, heading_confidence) = self.fuse_angle(
            &heading_samples,
            previous.map(|p| (p.heading_deg, p.confidence.heading)),
            &mut contributors,
        );

        let state = FusedState {
            timestamp,
            position,
            speed_kn,
            course_deg,
            heading_deg,
            contributors: contributors.into_iter().collect(),
            confidence: FieldConfidence {
                position: position_confidence.clamp(0.0, 1.0),
                speed: speed_confidence.clamp(0.0, 1.0),
                course: course_confidence.clamp(0.0, 1.0),
                heading: heading_confidence.clamp(0.0, 1.0),
            },
        };

        self.logger.record(&format!(
            "FusionStage fused {} readings, position confidence {:.2}",
            readings.len(),
            state.confidence.position
        ));

        let mut next_tracker = tracker.clone();
        let targets = self.correlate_targets(readings, &state, &mut next_tracker);

        FusionOutcome {
            state,
            targets,
            tracker: next_tracker,
            evidence,
            environment,
        }
    }

    fn fuse_position(
        &self,
        samples: &[(SensorKind, GeoPoint, f64)],
        previous: Option<&FusedState>,
        evidence: &mut FusionEvidence,
        contributors: &mut BTreeSet<SensorKind>,
    ) -> (GeoPoint, f64) {
        let reference = previous.filter(|p| p.confidence.position > 0.0);
        let mut accepted: Vec<(SensorKind, GeoPoint, f64)> = Vec::new();
        let mut rejected = 0usize;

        for &(kind, point, weight) in samples {
            if let Some(prev) = reference {
                let deviation = GeoHelper::haversine_m(point, prev.position);
                if deviation > self.config.position_outlier_m {
                    evidence.rejected.push(RejectedSample {
                        kind,
                        field: FusedField::Position,
                        deviation,
                        limit: self.config.position_outlier_m,
                    });
                    rejected += 1;
                    continue;
                }
            }
            accepted.push((kind, point, weight));
        }

        let total_weight: f64 = accepted.iter().map(|(_, _, w)| w).sum();
        if accepted.is_empty() || total_weight <= 0.0 {
            return match previous {
                Some(prev) => (
                    prev.position,
                    prev.confidence.position * self.config.confidence_decay,
                ),
                None => (GeoPoint::default(), 0.0),
            };
        }

        let mut lat = 0.0;
        let mut lon = 0.0;
        for &(kind, point, weight) in &accepted {
            lat += point.lat * weight;
            lon += point.lon * weight;
            contributors.insert(kind);
        }
        let average = GeoPoint::new(lat / total_weight, lon / total_weight);

        let fused = match reference {
            Some(prev) => {
                let alpha = self.config.smoothing_factor;
                GeoPoint::new(
                    alpha * average.lat + (1.0 - alpha) * prev.position.lat,
                    alpha * average.lon + (1.0 - alpha) * prev.position.lon,
                )
            }
            None => average,
        };

        let mean_weight = total_weight / accepted.len() as f64;
        let acceptance = accepted.len() as f64 / (accepted.len() + rejected) as f64;
        (fused, mean_weight * acceptance)
    }

    fn fuse_speed(
        &self,
        samples: &[(SensorKind, f64, f64)],
        previous: Option<&FusedState>,
        evidence: &mut FusionEvidence,
        contributors: &mut BTreeSet<SensorKind>,
    ) -> (f64, f64) {
        let reference = previous.filter(|p| p.confidence.speed > 0.0);
        let mut accepted: Vec<(SensorKind, f64, f64)> = Vec::new();
        let mut rejected = 0usize;

        for &(kind, speed, weight) in samples {
            if let Some(prev) = reference {
                let deviation = (speed - prev.speed_kn).abs();
                if deviation > self.config.speed_outlier_kn {
                    evidence.rejected.push(RejectedSample {
                        kind,
                        field: FusedField::Speed,
                        deviation,
                        limit: self.config.speed_outlier_kn,
                    });
                    rejected += 1;
                    continue;
                }
            }
            accepted.push((kind, speed, weight));
        }

        let total_weight: f64 = accepted.iter().map(|(_, _, w)| w).sum();
        if accepted.is_empty() || total_weight <= 0.0 {
            return match previous {
                Some(prev) => (
                    prev.speed_kn,
                    prev.confidence.speed * self.config.confidence_decay,
                ),
                None => (0.0, 0.0),
            };
        }

        let mut sum = 0.0;
        for &(kind, speed, weight) in &accepted {
            sum += speed * weight;
            contributors.insert(kind);
        }
        let average = sum / total_weight;

        let fused = match reference {
            Some(prev) => {
                let alpha = self.config.smoothing_factor;
                alpha * average + (1.0 - alpha) * prev.speed_kn
            }
            None => average,
        };

        let mean_weight = total_weight / accepted.len() as f64;
        let acceptance = accepted.len() as f64 / (accepted.len() + rejected) as f64;
        (fused.max(0.0), mean_weight * acceptance)
    }

    fn fuse_angle(
        &self,
        samples: &[(SensorKind, f64, f64)],
        previous: Option<(f64, f64)>,
        contributors: &mut BTreeSet<SensorKind>,
    ) -> (f64, f64) {
        let weighted: Vec<(f64, f64)> = samples.iter().map(|&(_, a, w)| (a, w)).collect();
        let average = match GeoHelper::circular_mean_deg(&weighted) {
            Some(mean) => mean,
            None => {
                return match previous {
                    Some((value, confidence)) => {
                        (value, confidence * self.config.confidence_decay)
                    }
                    None => (0.0, 0.0),
                };
            }
        };

        for &(kind, _, _) in samples {
            contributors.insert(kind);
        }

        let fused = match previous.filter(|&(_, confidence)| confidence > 0.0) {
            Some((prev_value, _)) => {
                let alpha = self.config.smoothing_factor;
                GeoHelper::norm_deg(
                    prev_value + alpha * GeoHelper::angle_diff_deg(average, prev_value),
                )
            }
            None => average,
        };

        let total_weight: f64 = samples.iter().map(|(_, _, w)| w).sum();
        (fused, total_weight / samples.len() as f64)
    }

    /// Merges AIS and RADAR contacts, feeds the track arena, and derives
    /// bearing/range and CPA/TCPA relative to the fused ego state.
    fn correlate_targets(
        &self,
        readings: &[SensorReading],
        ego: &FusedState,
        tracker: &mut TargetTracker,
    ) -> Vec<Target> {
        let mut ais_contacts = Vec::new();
        let mut radar_contacts = Vec::new();
        for reading in readings {
            match &reading.extras {
                SensorExtras::Ais { contacts, .. } => {
                    ais_contacts.extend(contacts.iter().map(|c| (c.clone(), reading.weight)));
                }
                SensorExtras::Radar { contacts } => {
                    radar_contacts.extend(contacts.iter().map(|c| (c.clone(), reading.weight)));
                }
                _ => {}
            }
        }

        let mut observations: Vec<Observation> = ais_contacts
            .iter()
            .map(|(c, _)| Observation {
                external_id: c.external_id.clone(),
                position: c.position,
                speed_kn: c.speed_kn,
                course_deg: c.course_deg,
            })
            .collect();

        for (radar, radar_weight) in &radar_contacts {
            let matched = ais_contacts
                .iter()
                .enumerate()
                .map(|(idx, (ais, weight))| {
                    (
                        idx,
                        GeoHelper::haversine_m(radar.position, ais.position),
                        *weight,
                    )
                })
                .filter(|&(_, distance, _)| distance <= self.config.target_match_m)
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match matched {
                Some((idx, _, ais_weight)) => {
                    // Position from the higher-reliability source.
                    if *radar_weight > ais_weight {
                        observations[idx].position = radar.position;
                    }
                }
                None => observations.push(Observation {
                    external_id: radar.external_id.clone(),
                    position: radar.position,
                    speed_kn: radar.speed_kn,
                    course_deg: radar.course_deg,
                }),
            }
        }

        tracker.observe(
            &observations,
            self.config.target_match_m,
            self.config.target_drop_cycles,
        );

        tracker
            .tracks()
            .iter()
            .map(|track| {
                let range_nm =
                    GeoHelper::haversine_m(ego.position, track.position) / METERS_PER_NM;
                let bearing_deg = GeoHelper::bearing_deg(ego.position, track.position);
                let (cpa_nm, tcpa_min) = closest_approach(
                    ego.position,
                    ego.speed_kn,
                    ego.course_deg,
                    track.position,
                    track.speed_kn,
                    track.course_deg,
                );
                Target {
                    id: track.id,
                    external_id: track.external_id.clone(),
                    position: track.position,
                    speed_kn: track.speed_kn,
                    course_deg: track.course_deg,
                    bearing_deg,
                    range_nm,
                    cpa_nm,
                    tcpa_min,
                }
            })
            .collect()
    }
}

/// Constant-velocity closest point of approach between the ego vessel and
/// a target. Returns `(None, None)` when the target is diverging or the
/// relative motion is degenerate.
fn closest_approach(
    ego_pos: GeoPoint,
    ego_speed_kn: f64,
    ego_course_deg: f64,
    target_pos: GeoPoint,
    target_speed_kn: f64,
    target_course_deg: f64,
) -> (Option<f64>, Option<f64>) {
    let (rx, ry) = GeoHelper::local_offset_m(ego_pos, target_pos);

    let ego_speed = ego_speed_kn * KN_TO_MPS;
    let target_speed = target_speed_kn * KN_TO_MPS;
    let (vex, vey) = (
        ego_speed * ego_course_deg.to_radians().sin(),
        ego_speed * ego_course_deg.to_radians().cos(),
    );
    let (vtx, vty) = (
        target_speed * target_course_deg.to_radians().sin(),
        target_speed * target_course_deg.to_radians().cos(),
    );
    let (vx, vy) = (vtx - vex, vty - vey);

    let closing = vx * vx + vy * vy;
    if closing < 1e-9 {
        return (None, None);
    }
    let tcpa_s = -(rx * vx + ry * vy) / closing;
    if tcpa_s < 0.0 {
        return (None, None);
    }
    let cpa_m = ((rx + vx * tcpa_s).powi(2) + (ry + vy * tcpa_s).powi(2)).sqrt();
    (Some(cpa_m / METERS_PER_NM), Some(tcpa_s / 60.0))
}

/// Passes WEATHER/TIDE/CURRENT values through untouched.
fn collect_environment(readings: &[SensorReading]) -> EnvironmentSummary {
    let mut environment = EnvironmentSummary::default();
    for reading in readings {
        match reading.extras {
            SensorExtras::Weather {
                wind_speed_kn,
                wind_dir_deg,
            } => {
                environment.wind_speed_kn = Some(wind_speed_kn);
                environment.wind_dir_deg = Some(wind_dir_deg);
            }
            SensorExtras::Tide { height_m } => {
                environment.tide_height_m = Some(height_m);
            }
            SensorExtras::Current { set_kn, drift_deg } => {
                environment.current_set_kn = Some(set_kn);
                environment.current_drift_deg = Some(drift_deg);
            }
            _ => {}
        }
    }
    environment
}

use std::collections::BTreeMap;

use crate::math::geo::GeoHelper;
use crate::model::{Anomaly, AnomalyKind, Evidence, FusedState, SensorKind, Severity, Target};
use crate::pipeline::fusion::FusionEvidence;
use crate::pipeline::history::HistoryBuffer;
use crate::prelude::AnomalyConfig;
use crate::telemetry::log::LogManager;

/// Anomaly detection stage. Reads the fused state, the target list, and
/// the history; it never mutates any of them and never carries findings
/// across cycles.
pub struct AnomalyStage {
    config: AnomalyConfig,
    logger: LogManager,
}

impl AnomalyStage {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            logger: LogManager::new(),
        }
    }

    pub fn detect(
        &self,
        state: &FusedState,
        targets: &[Target],
        evidence: &FusionEvidence,
        history: &HistoryBuffer,
        degraded: &BTreeMap<SensorKind, u32>,
    ) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        self.check_trajectory(state, history, &mut anomalies);
        self.check_speed(state, history, &mut anomalies);
        self.check_mismatch(state, evidence, &mut anomalies);
        self.check_collisions(state, targets, &mut anomalies);
        self.check_maneuver(state, history, &mut anomalies);
        self.check_degradation(state, degraded, &mut anomalies);

        if !anomalies.is_empty() {
            self.logger.record_warning(&format!(
                "AnomalyStage flagged {} condition(s)",
                anomalies.len()
            ));
        }
        anomalies
    }

    /// Compares the fused position against a dead-reckoned prediction from
    /// the two most recent history entries.
    fn check_trajectory(
        &self,
        state: &FusedState,
        history: &HistoryBuffer,
        anomalies: &mut Vec<Anomaly>,
    ) {
        let Some((older, newer)) = history.last_two() else {
            return;
        };
        let baseline_dt = newer.timestamp - older.timestamp;
        let forward_dt = state.timestamp - newer.timestamp;
        if baseline_dt <= 0.0 || forward_dt <= 0.0 {
            return;
        }

        let (east, north) = GeoHelper::local_offset_m(older.position, newer.position);
        let (ve, vn) = (east / baseline_dt, north / baseline_dt);
        let predicted = GeoHelper::offset_point(
            newer.position,
            ve * forward_dt,
            vn * forward_dt,
        );

        let deviation = GeoHelper::haversine_m(state.position, predicted);
        if deviation > self.config.trajectory_deviation_m {
            anomalies.push(Anomaly {
                kind: AnomalyKind::TrajectoryDeviation,
                severity: Severity::from_ratio(deviation / self.config.trajectory_deviation_m),
                description: format!(
                    "position {:.0} m off the dead-reckoned track",
                    deviation
                ),
                evidence: Evidence {
                    value: deviation,
                    threshold: self.config.trajectory_deviation_m,
                },
                target_id: None,
                timestamp: state.timestamp,
            });
        }
    }

    fn check_speed(
        &self,
        state: &FusedState,
        history: &HistoryBuffer,
        anomalies: &mut Vec<Anomaly>,
    ) {
        let Some(previous) = history.last() else {
            return;
        };
        if previous.confidence.speed <= 0.0 {
            return;
        }
        let delta = (state.speed_kn - previous.speed_kn).abs();
        if delta > self.config.speed_delta_kn {
            anomalies.push(Anomaly {
                kind: AnomalyKind::SpeedAnomaly,
                severity: Severity::from_ratio(delta / self.config.speed_delta_kn),
                description: format!(
                    "fused speed changed {:.1} kn in one cycle",
                    delta
                ),
                evidence: Evidence {
                    value: delta,
                    threshold: self.config.speed_delta_kn,
                },
                target_id: None,
                timestamp: state.timestamp,
            });
        }
    }

    /// One anomaly per disagreeing sensor pair, from the spreads the fusion
    /// stage measured before rejection.
    fn check_mismatch(
        &self,
        state: &FusedState,
        evidence: &FusionEvidence,
        anomalies: &mut Vec<Anomaly>,
    ) {
        for spread in &evidence.position_spread {
            if spread.meters > self.config.mismatch_m {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::SensorMismatch,
                    severity: Severity::from_ratio(spread.meters / self.config.mismatch_m),
                    description: format!(
                        "{:?} and {:?} positions disagree by {:.0} m",
                        spread.first, spread.second, spread.meters
                    ),
                    evidence: Evidence {
                        value: spread.meters,
                        threshold: self.config.mismatch_m,
                    },
                    target_id: None,
                    timestamp: state.timestamp,
                });
            }
        }
    }

    fn check_collisions(
        &self,
        state: &FusedState,
        targets: &[Target],
        anomalies: &mut Vec<Anomaly>,
    ) {
        for target in targets {
            let (Some(cpa_nm), Some(tcpa_min)) = (target.cpa_nm, target.tcpa_min) else {
                continue;
            };
            if cpa_nm >= self.config.cpa_limit_nm || tcpa_min >= self.config.tcpa_limit_min {
                continue;
            }
            let ratio = (self.config.cpa_limit_nm / cpa_nm.max(1e-6))
                .min(self.config.tcpa_limit_min / tcpa_min.max(1e-6));
            anomalies.push(Anomaly {
                kind: AnomalyKind::CollisionRisk,
                severity: Severity::from_ratio(ratio),
                description: format!(
                    "target {} closing to {:.2} nm in {:.1} min",
                    target.id, cpa_nm, tcpa_min
                ),
                evidence: Evidence {
                    value: cpa_nm,
                    threshold: self.config.cpa_limit_nm,
                },
                target_id: Some(target.id),
                timestamp: state.timestamp,
            });
        }
    }

    fn check_maneuver(
        &self,
        state: &FusedState,
        history: &HistoryBuffer,
        anomalies: &mut Vec<Anomaly>,
    ) {
        let Some(previous) = history.last() else {
            return;
        };
        let dt = state.timestamp - previous.timestamp;
        if dt <= 0.0 || previous.confidence.course <= 0.0 {
            return;
        }
        let turn = GeoHelper::angle_diff_deg(state.course_deg, previous.course_deg).abs();
        let rot = turn / (dt / 60.0);
        if rot > self.config.rot_limit_deg_min {
            anomalies.push(Anomaly {
                kind: AnomalyKind::SuddenManeuver,
                severity: Severity::from_ratio(rot / self.config.rot_limit_deg_min),
                description: format!("turn rate {:.1} deg/min", rot),
                evidence: Evidence {
                    value: rot,
                    threshold: self.config.rot_limit_deg_min,
                },
                target_id: None,
                timestamp: state.timestamp,
            });
        }
    }

    fn check_degradation(
        &self,
        state: &FusedState,
        degraded: &BTreeMap<SensorKind, u32>,
        anomalies: &mut Vec<Anomaly>,
    ) {
        for (&kind, &unusable_cycles) in degraded {
            if !self.config.critical_sensors.contains(&kind) {
                continue;
            }
            if unusable_cycles >= self.config.degraded_cycles {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::SensorDegradation,
                    severity: Severity::from_ratio(
                        unusable_cycles as f64 / self.config.degraded_cycles as f64,
                    ),
                    description: format!(
                        "{:?} absent or rejected for {} cycle(s)",
                        kind, unusable_cycles
                    ),
                    evidence: Evidence {
                        value: unusable_cycles as f64,
                        threshold: self.config.degraded_cycles as f64,
                    },
                    target_id: None,
                    timestamp: state.timestamp,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldConfidence, GeoPoint};
    use crate::pipeline::fusion::PositionSpread;

    fn fused(ts: f64, lat: f64, lon: f64, speed: f64, course: f64) -> FusedState {
        FusedState {
            timestamp: ts,
            position: GeoPoint::new(lat, lon),
            speed_kn: speed,
            course_deg: course,
            heading_deg: course,
            contributors: vec![SensorKind::Gps],
            confidence: FieldConfidence::uniform(0.9),
        }
    }

    fn target(cpa: Option<f64>, tcpa: Option<f64>) -> Target {
        Target {
            id: 0,
            external_id: None,
            position: GeoPoint::new(51.05, 0.0),
            speed_kn: 12.0,
            course_deg: 180.0,
            bearing_deg: 0.0,
            range_nm: 3.0,
            cpa_nm: cpa,
            tcpa_min: tcpa,
        }
    }

    fn stage() -> AnomalyStage {
        AnomalyStage::new(AnomalyConfig::default())
    }

    #[test]
    fn close_cpa_and_tcpa_is_at_least_critical() {
        let state = fused(100.0, 51.0, 0.0, 10.0, 0.0);
        let anomalies = stage().detect(
            &state,
            &[target(Some(1.0), Some(5.0))],
            &FusionEvidence::default(),
            &HistoryBuffer::with_capacity(4),
            &BTreeMap::new(),
        );
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::CollisionRisk);
        assert!(anomalies[0].severity >= Severity::Critical);
        assert_eq!(anomalies[0].target_id, Some(0));
    }

    #[test]
    fn diverging_target_is_not_a_collision_risk() {
        let state = fused(100.0, 51.0, 0.0, 10.0, 0.0);
        let anomalies = stage().detect(
            &state,
            &[target(None, None)],
            &FusionEvidence::default(),
            &HistoryBuffer::with_capacity(4),
            &BTreeMap::new(),
        );
        assert!(anomalies.is_empty());
    }

    #[test]
    fn position_spread_past_threshold_is_a_mismatch() {
        let state = fused(100.0, 51.0, 0.0, 10.0, 0.0);
        let evidence = FusionEvidence {
            rejected: Vec::new(),
            position_spread: vec![PositionSpread {
                first: SensorKind::Gps,
                second: SensorKind::Ais,
                meters: 450.0,
            }],
        };
        let anomalies = stage().detect(
            &state,
            &[],
            &evidence,
            &HistoryBuffer::with_capacity(4),
            &BTreeMap::new(),
        );
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::SensorMismatch);
        assert_eq!(anomalies[0].severity, Severity::Critical);
    }

    #[test]
    fn speed_jump_between_cycles_is_flagged() {
        let mut history = HistoryBuffer::with_capacity(4);
        history.push(fused(90.0, 51.0, 0.0, 10.0, 0.0));
        let state = fused(100.0, 51.0005, 0.0, 18.0, 0.0);
        let anomalies = stage().detect(
            &state,
            &[],
            &FusionEvidence::default(),
            &history,
            &BTreeMap::new(),
        );
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::SpeedAnomaly));
    }

    #[test]
    fn repeated_identical_states_raise_nothing() {
        // Static scenario: identical timestamps disable the rate checks and
        // identical values leave nothing to flag.
        let mut history = HistoryBuffer::with_capacity(8);
        let state = fused(100.0, 51.0, 0.0, 10.0, 45.0);
        history.push(state.clone());
        history.push(state.clone());
        let anomalies = stage().detect(
            &state,
            &[],
            &FusionEvidence::default(),
            &history,
            &BTreeMap::new(),
        );
        assert!(anomalies.is_empty());
    }

    #[test]
    fn silent_critical_sensor_reports_degradation() {
        let state = fused(100.0, 51.0, 0.0, 10.0, 0.0);
        let mut degraded = BTreeMap::new();
        degraded.insert(SensorKind::Gps, 3u32);
        degraded.insert(SensorKind::Engine, 10u32);
        let anomalies = stage().detect(
            &state,
            &[],
            &FusionEvidence::default(),
            &HistoryBuffer::with_capacity(4),
            &degraded,
        );
        // ENGINE is not critical, only the GPS report surfaces.
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::SensorDegradation);
    }
}

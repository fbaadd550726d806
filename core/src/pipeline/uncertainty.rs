use crate::math::{GeoHelper, StatsHelper};
use crate::model::{
    Anomaly, AnomalyKind, FieldUncertainty, FusedState, GeoPoint, Severity, SpoofAlert, SpoofKind,
    Target, TargetUncertainty, UncertaintyReport,
};
use crate::pipeline::history::HistoryBuffer;
use crate::prelude::UncertaintyConfig;
use crate::telemetry::log::LogManager;

// Reliability deductions per active finding. Alerts from raw-reading
// cross-validation weigh more than fused-state anomalies.
const ANOMALY_POSITION_PENALTY: f64 = 0.10;
const ANOMALY_SPEED_PENALTY: f64 = 0.10;
const ANOMALY_COURSE_PENALTY: f64 = 0.10;
const SPOOF_POSITION_PENALTY: f64 = 0.20;
const SPOOF_SPEED_PENALTY: f64 = 0.20;
const SPOOF_TIMING_PENALTY: f64 = 0.15;
const TARGET_BASE_RELIABILITY: f64 = 0.7;
const TARGET_COLLISION_PENALTY: f64 = 0.2;

/// Uncertainty modeling stage: spread statistics over the recent history
/// widened into confidence intervals, degraded by active findings.
pub struct UncertaintyStage {
    config: UncertaintyConfig,
    logger: LogManager,
}

impl UncertaintyStage {
    pub fn new(config: UncertaintyConfig) -> Self {
        Self {
            config,
            logger: LogManager::new(),
        }
    }

    pub fn model(
        &self,
        state: &FusedState,
        targets: &[Target],
        anomalies: &[Anomaly],
        spoof_alerts: &[SpoofAlert],
        history: &HistoryBuffer,
    ) -> UncertaintyReport {
        // The current state is part of the sample set; it has not been
        // committed to the history yet when this stage runs.
        let mut samples: Vec<&FusedState> =
            history.recent(self.config.sample_window.saturating_sub(1));
        samples.push(state);

        let mut position = self.position_uncertainty(&samples, state);
        let mut speed = self.scalar_uncertainty(
            samples.iter().map(|s| s.speed_kn).collect(),
            self.config.speed_prior_kn,
            state.confidence.speed,
        );
        let mut course = self.angular_uncertainty(
            samples.iter().map(|s| s.course_deg).collect(),
            self.config.course_prior_deg,
            state.confidence.course,
        );
        let mut heading = self.angular_uncertainty(
            samples.iter().map(|s| s.heading_deg).collect(),
            self.config.heading_prior_deg,
            state.confidence.heading,
        );

        for anomaly in anomalies {
            match anomaly.kind {
                AnomalyKind::TrajectoryDeviation | AnomalyKind::SensorMismatch => {
                    position.reliability -= ANOMALY_POSITION_PENALTY;
                }
                AnomalyKind::SpeedAnomaly => speed.reliability -= ANOMALY_SPEED_PENALTY,
                AnomalyKind::SuddenManeuver => course.reliability -= ANOMALY_COURSE_PENALTY,
                AnomalyKind::CollisionRisk | AnomalyKind::SensorDegradation => {}
            }
        }
        for alert in spoof_alerts {
            match alert.kind {
                SpoofKind::PositionJump | SpoofKind::MultiSensorMismatch => {
                    position.reliability -= SPOOF_POSITION_PENALTY;
                }
                SpoofKind::ImpossibleSpeed => speed.reliability -= SPOOF_SPEED_PENALTY,
                SpoofKind::TimeManipulation => {
                    position.reliability -= SPOOF_TIMING_PENALTY;
                    speed.reliability -= SPOOF_TIMING_PENALTY;
                }
            }
        }
        for field in [&mut position, &mut speed, &mut course, &mut heading] {
            field.reliability = field.reliability.clamp(0.0, 1.0);
        }

        let target_uncertainty = targets
            .iter()
            .map(|target| self.target_uncertainty(target, anomalies))
            .collect();

        let weight_sum = self.config.position_weight
            + self.config.speed_weight
            + self.config.course_weight
            + self.config.heading_weight;
        let mut overall = (position.reliability * self.config.position_weight
            + speed.reliability * self.config.speed_weight
            + course.reliability * self.config.course_weight
            + heading.reliability * self.config.heading_weight)
            / weight_sum;

        let emergency_active = anomalies.iter().any(|a| a.severity == Severity::Emergency)
            || spoof_alerts.iter().any(|a| a.severity == Severity::Emergency);
        if emergency_active {
            overall -= self.config.emergency_penalty;
        }
        let overall = overall.clamp(0.0, 1.0);

        self.logger.record(&format!(
            "UncertaintyStage overall reliability {:.2}",
            overall
        ));

        UncertaintyReport {
            position,
            speed,
            course,
            heading,
            targets: target_uncertainty,
            overall_reliability: overall,
        }
    }

    /// Position spread measured as distances from the sample mean point,
    /// in meters.
    fn position_uncertainty(&self, samples: &[&FusedState], state: &FusedState) -> FieldUncertainty {
        if samples.len() < 2 {
            return self.from_prior(self.config.position_prior_m, state.confidence.position);
        }
        let n = samples.len() as f64;
        let mean_point = GeoPoint::new(
            samples.iter().map(|s| s.position.lat).sum::<f64>() / n,
            samples.iter().map(|s| s.position.lon).sum::<f64>() / n,
        );
        let distances: Vec<f64> = samples
            .iter()
            .map(|s| GeoHelper::haversine_m(s.position, mean_point))
            .collect();
        let mean = StatsHelper::mean(&distances).unwrap_or(0.0);
        let std_dev = StatsHelper::sample_std(&distances).unwrap_or(0.0);
        let spread = self.config.z_score * std_dev;
        FieldUncertainty {
            mean,
            std_dev,
            interval: ((mean - spread).max(0.0), mean + spread),
            reliability: self.reliability(
                std_dev,
                self.config.position_prior_m,
                state.confidence.position,
            ),
        }
    }

    fn scalar_uncertainty(
        &self,
        values: Vec<f64>,
        prior: f64,
        confidence: f64,
    ) -> FieldUncertainty {
        if values.len() < 2 {
            return self.from_prior(prior, confidence);
        }
        let mean = StatsHelper::mean(&values).unwrap_or(0.0);
        let std_dev = StatsHelper::sample_std(&values).unwrap_or(0.0);
        let spread = self.config.z_score * std_dev;
        FieldUncertainty {
            mean,
            std_dev,
            interval: ((mean - spread).max(0.0), mean + spread),
            reliability: self.reliability(std_dev, prior, confidence),
        }
    }

    fn angular_uncertainty(
        &self,
        values: Vec<f64>,
        prior: f64,
        confidence: f64,
    ) -> FieldUncertainty {
        if values.len() < 2 {
            return self.from_prior(prior, confidence);
        }
        let weighted: Vec<(f64, f64)> = values.iter().map(|&v| (v, 1.0)).collect();
        let mean = GeoHelper::circular_mean_deg(&weighted).unwrap_or(0.0);
        let std_dev = StatsHelper::circular_std_deg(&values).unwrap_or(0.0);
        let spread = self.config.z_score * std_dev;
        FieldUncertainty {
            mean,
            std_dev,
            interval: (
                GeoHelper::norm_deg(mean - spread),
                GeoHelper::norm_deg(mean + spread),
            ),
            reliability: self.reliability(std_dev, prior, confidence),
        }
    }

    fn from_prior(&self, prior: f64, confidence: f64) -> FieldUncertainty {
        let spread = self.config.z_score * prior;
        FieldUncertainty {
            mean: 0.0,
            std_dev: prior,
            interval: (0.0, spread),
            reliability: self.reliability(prior, prior, confidence),
        }
    }

    /// Reliability is the fused confidence discounted by how much the
    /// observed spread exceeds the prior. A spread of zero returns the
    /// confidence untouched.
    fn reliability(&self, std_dev: f64, prior: f64, confidence: f64) -> f64 {
        (confidence * prior / (prior + std_dev)).clamp(0.0, 1.0)
    }

    /// Target tracking error grows with range; radar and AIS both degrade
    /// with distance. Collision findings against the target reduce trust
    /// in its track.
    fn target_uncertainty(&self, target: &Target, anomalies: &[Anomaly]) -> TargetUncertainty {
        let std_dev = 0.1 + target.range_nm * 0.02;
        let spread = self.config.z_score * std_dev;
        let collision_hits = anomalies
            .iter()
            .filter(|a| {
                a.kind == AnomalyKind::CollisionRisk && a.target_id == Some(target.id)
            })
            .count();
        let reliability = (TARGET_BASE_RELIABILITY
            - TARGET_COLLISION_PENALTY * collision_hits as f64)
            .clamp(0.0, 1.0);
        TargetUncertainty {
            target_id: target.id,
            uncertainty: FieldUncertainty {
                mean: target.range_nm,
                std_dev,
                interval: ((target.range_nm - spread).max(0.0), target.range_nm + spread),
                reliability,
            },
        }
    }
}

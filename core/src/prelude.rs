use serde::{Deserialize, Serialize};

use crate::model::SensorKind;

/// Tunables for the sensor fusion stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Position deviation from the previous fused value that excludes a
    /// reading from this cycle's average, in meters.
    pub position_outlier_m: f64,
    /// Speed deviation from the previous fused value that excludes a
    /// reading from this cycle's average, in knots.
    pub speed_outlier_kn: f64,
    /// Weight of the current cycle's average in the exponential blend with
    /// the previous fused value. Must lie in (0, 1].
    pub smoothing_factor: f64,
    /// Multiplier applied to a field's confidence when its value had to be
    /// carried forward from the previous cycle.
    pub confidence_decay: f64,
    /// Confidence assigned to every field when a cycle arrives with no
    /// usable readings at all.
    pub confidence_floor: f64,
    /// RADAR and AIS contacts closer than this are merged into one target,
    /// in meters.
    pub target_match_m: f64,
    /// Consecutive cycles a tracked target may go unobserved before it is
    /// dropped.
    pub target_drop_cycles: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            position_outlier_m: 100.0,
            speed_outlier_kn: 10.0,
            smoothing_factor: 0.7,
            confidence_decay: 0.8,
            confidence_floor: 0.1,
            target_match_m: 500.0,
            target_drop_cycles: 5,
        }
    }
}

/// Tunables for the anomaly detection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Distance from the linearly-extrapolated position that flags a
    /// trajectory deviation, in meters.
    pub trajectory_deviation_m: f64,
    /// Cycle-over-cycle fused speed change that flags a speed anomaly,
    /// in knots.
    pub speed_delta_kn: f64,
    /// Same-cycle position disagreement between two sensors that flags a
    /// sensor mismatch, in meters.
    pub mismatch_m: f64,
    /// CPA below which a target is a collision risk, in nautical miles.
    pub cpa_limit_nm: f64,
    /// TCPA below which a target is a collision risk, in minutes.
    pub tcpa_limit_min: f64,
    /// Rate of turn that flags a sudden maneuver, in degrees per minute.
    pub rot_limit_deg_min: f64,
    /// Consecutive non-contributing cycles before a critical sensor is
    /// reported as degraded.
    pub degraded_cycles: u32,
    /// Sensors whose absence is worth a degradation report.
    pub critical_sensors: Vec<SensorKind>,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            trajectory_deviation_m: 500.0,
            speed_delta_kn: 5.0,
            mismatch_m: 200.0,
            cpa_limit_nm: 2.0,
            tcpa_limit_min: 10.0,
            rot_limit_deg_min: 15.0,
            degraded_cycles: 3,
            critical_sensors: vec![SensorKind::Gps, SensorKind::Ais, SensorKind::Radar],
        }
    }
}

/// Tunables for the spoofing detection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoofingConfig {
    /// Single-sensor position change within one cycle that is physically
    /// implausible, in meters.
    pub position_jump_m: f64,
    /// Absolute speed ceiling for any reported value, in knots.
    pub max_speed_kn: f64,
    /// Same-cycle position disagreement between two sensor kinds treated as
    /// deliberate manipulation rather than noise, in meters.
    pub cross_mismatch_m: f64,
    /// Tolerated difference between a reading's timestamp and the cycle
    /// clock, in seconds.
    pub clock_skew_s: f64,
}

impl Default for SpoofingConfig {
    fn default() -> Self {
        Self {
            position_jump_m: 1000.0,
            max_speed_kn: 60.0,
            cross_mismatch_m: 500.0,
            clock_skew_s: 60.0,
        }
    }
}

/// Tunables for the uncertainty modeling stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UncertaintyConfig {
    /// History entries sampled when deriving baseline standard deviations.
    pub sample_window: usize,
    /// Z-score applied when widening a standard deviation into a
    /// confidence interval. 1.96 corresponds to 95%.
    pub z_score: f64,
    /// Prior standard deviations used until enough history accumulates.
    pub position_prior_m: f64,
    pub speed_prior_kn: f64,
    pub course_prior_deg: f64,
    pub heading_prior_deg: f64,
    /// Field weights for the overall reliability combination.
    pub position_weight: f64,
    pub speed_weight: f64,
    pub course_weight: f64,
    pub heading_weight: f64,
    /// Flat reduction of the overall score while any emergency-severity
    /// alert is active.
    pub emergency_penalty: f64,
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        Self {
            sample_window: 10,
            z_score: 1.96,
            position_prior_m: 25.0,
            speed_prior_kn: 2.0,
            course_prior_deg: 10.0,
            heading_prior_deg: 15.0,
            position_weight: 0.4,
            speed_weight: 0.2,
            course_weight: 0.2,
            heading_weight: 0.2,
            emergency_penalty: 0.2,
        }
    }
}

/// Complete configuration injected into the pipeline at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the fused-state rolling history. Zero selects the
    /// default; the effective value must cover the longest anomaly
    /// lookback.
    pub history_capacity: usize,
    pub fusion: FusionConfig,
    pub anomaly: AnomalyConfig,
    pub spoofing: SpoofingConfig,
    pub uncertainty: UncertaintyConfig,
}

pub const DEFAULT_HISTORY_CAPACITY: usize = 32;

impl PipelineConfig {
    /// Effective history capacity after applying the default.
    pub fn effective_history_capacity(&self) -> usize {
        if self.history_capacity == 0 {
            DEFAULT_HISTORY_CAPACITY
        } else {
            self.history_capacity
        }
    }

    /// Fail-fast validation run once at pipeline construction.
    pub fn validate(&self) -> SaResult<()> {
        fn positive(name: &str, value: f64) -> SaResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SaError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        }
        fn unit(name: &str, value: f64) -> SaResult<()> {
            if value.is_finite() && value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(SaError::InvalidConfig(format!(
                    "{} must lie in (0, 1], got {}",
                    name, value
                )))
            }
        }

        if self.effective_history_capacity() < 2 {
            return Err(SaError::InvalidConfig(format!(
                "history_capacity must be at least 2, got {}",
                self.history_capacity
            )));
        }

        positive("fusion.position_outlier_m", self.fusion.position_outlier_m)?;
        positive("fusion.speed_outlier_kn", self.fusion.speed_outlier_kn)?;
        unit("fusion.smoothing_factor", self.fusion.smoothing_factor)?;
        unit("fusion.confidence_decay", self.fusion.confidence_decay)?;
        unit("fusion.confidence_floor", self.fusion.confidence_floor)?;
        positive("fusion.target_match_m", self.fusion.target_match_m)?;

        positive(
            "anomaly.trajectory_deviation_m",
            self.anomaly.trajectory_deviation_m,
        )?;
        positive("anomaly.speed_delta_kn", self.anomaly.speed_delta_kn)?;
        positive("anomaly.mismatch_m", self.anomaly.mismatch_m)?;
        positive("anomaly.cpa_limit_nm", self.anomaly.cpa_limit_nm)?;
        positive("anomaly.tcpa_limit_min", self.anomaly.tcpa_limit_min)?;
        positive("anomaly.rot_limit_deg_min", self.anomaly.rot_limit_deg_min)?;
        if self.anomaly.degraded_cycles == 0 {
            return Err(SaError::InvalidConfig(
                "anomaly.degraded_cycles must be at least 1".into(),
            ));
        }

        positive("spoofing.position_jump_m", self.spoofing.position_jump_m)?;
        positive("spoofing.max_speed_kn", self.spoofing.max_speed_kn)?;
        positive("spoofing.cross_mismatch_m", self.spoofing.cross_mismatch_m)?;
        positive("spoofing.clock_skew_s", self.spoofing.clock_skew_s)?;

        if self.uncertainty.sample_window < 2 {
            return Err(SaError::InvalidConfig(format!(
                "uncertainty.sample_window must be at least 2, got {}",
                self.uncertainty.sample_window
            )));
        }
        positive("uncertainty.z_score", self.uncertainty.z_score)?;
        positive("uncertainty.position_prior_m", self.uncertainty.position_prior_m)?;
        positive("uncertainty.speed_prior_kn", self.uncertainty.speed_prior_kn)?;
        positive("uncertainty.course_prior_deg", self.uncertainty.course_prior_deg)?;
        positive("uncertainty.heading_prior_deg", self.uncertainty.heading_prior_deg)?;
        let weight_sum = self.uncertainty.position_weight
            + self.uncertainty.speed_weight
            + self.uncertainty.course_weight
            + self.uncertainty.heading_weight;
        if !(weight_sum.is_finite() && weight_sum > 0.0) {
            return Err(SaError::InvalidConfig(format!(
                "uncertainty field weights must sum to a positive value, got {}",
                weight_sum
            )));
        }
        if !(0.0..=1.0).contains(&self.uncertainty.emergency_penalty) {
            return Err(SaError::InvalidConfig(format!(
                "uncertainty.emergency_penalty must lie in [0, 1], got {}",
                self.uncertainty.emergency_penalty
            )));
        }

        Ok(())
    }
}

/// Error type for the core. Data-quality conditions never surface here;
/// they become anomalies, spoof alerts, or lowered confidence instead.
#[derive(thiserror::Error, Debug)]
pub enum SaError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type SaResult<T> = Result<T, SaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let mut config = PipelineConfig::default();
        config.anomaly.cpa_limit_nm = -1.0;
        assert!(matches!(
            config.validate(),
            Err(SaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn smoothing_factor_above_one_is_rejected() {
        let mut config = PipelineConfig::default();
        config.fusion.smoothing_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_selects_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.effective_history_capacity(), DEFAULT_HISTORY_CAPACITY);
    }
}

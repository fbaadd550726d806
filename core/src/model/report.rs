use serde::{Deserialize, Serialize};

use super::alert::{Anomaly, SpoofAlert};
use super::state::{FusedState, Target};

/// Mean, spread, and reliability for one fused field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldUncertainty {
    pub mean: f64,
    pub std_dev: f64,
    /// 95% confidence interval, clipped to the field's physical range.
    pub interval: (f64, f64),
    /// Reliability in [0, 1].
    pub reliability: f64,
}

impl Default for FieldUncertainty {
    fn default() -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            interval: (0.0, 0.0),
            reliability: 1.0,
        }
    }
}

/// Tracking uncertainty for one target, keyed by its stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetUncertainty {
    pub target_id: u32,
    pub uncertainty: FieldUncertainty,
}

/// Calibrated confidence intervals and reliability scores for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    pub position: FieldUncertainty,
    pub speed: FieldUncertainty,
    pub course: FieldUncertainty,
    pub heading: FieldUncertainty,
    pub targets: Vec<TargetUncertainty>,
    /// Weighted combination of the per-field reliabilities, in [0, 1].
    pub overall_reliability: f64,
}

/// Environmental values carried through from WEATHER, TIDE, and CURRENT
/// readings without numerical treatment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    pub wind_speed_kn: Option<f64>,
    pub wind_dir_deg: Option<f64>,
    pub tide_height_m: Option<f64>,
    pub current_set_kn: Option<f64>,
    pub current_drift_deg: Option<f64>,
}

/// Everything the pipeline produces for one cycle, handed back to the
/// external caller (and serialized to JSON by the HTTP collaborator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReport {
    pub fused: FusedState,
    pub targets: Vec<Target>,
    pub anomalies: Vec<Anomaly>,
    pub spoof_alerts: Vec<SpoofAlert>,
    pub uncertainty: UncertaintyReport,
    pub environment: EnvironmentSummary,
    /// Wall-clock cost of producing this report, in milliseconds.
    pub processing_ms: f64,
}

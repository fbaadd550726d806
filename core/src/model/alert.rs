use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl Severity {
    /// Deterministic severity from how far a metric exceeds its threshold.
    /// A ratio of 1 means "just past the threshold".
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 4.0 {
            Severity::Emergency
        } else if ratio >= 2.0 {
            Severity::Critical
        } else if ratio >= 1.0 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// Numeric values that triggered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TrajectoryDeviation,
    SpeedAnomaly,
    SensorMismatch,
    CollisionRisk,
    SuddenManeuver,
    SensorDegradation,
}

/// Condition flagged by the anomaly detector. Append-only per cycle and
/// never carried across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub evidence: Evidence,
    /// Target the condition concerns, for collision risks.
    pub target_id: Option<u32>,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoofKind {
    PositionJump,
    ImpossibleSpeed,
    MultiSensorMismatch,
    TimeManipulation,
}

/// Warning raised by the spoofing detector from raw-reading
/// cross-validation. Same lifecycle as [`Anomaly`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoofAlert {
    pub kind: SpoofKind,
    pub severity: Severity,
    pub description: String,
    pub evidence: Evidence,
    pub recommended_action: String,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_breakpoints() {
        assert_eq!(Severity::from_ratio(0.5), Severity::Info);
        assert_eq!(Severity::from_ratio(1.0), Severity::Warning);
        assert_eq!(Severity::from_ratio(2.0), Severity::Critical);
        assert_eq!(Severity::from_ratio(4.5), Severity::Emergency);
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Emergency > Severity::Critical);
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}

use serde::{Deserialize, Serialize};

use super::reading::{GeoPoint, SensorKind};

/// Per-field confidence of a fused state, each value in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub position: f64,
    pub speed: f64,
    pub course: f64,
    pub heading: f64,
}

impl FieldConfidence {
    pub fn uniform(value: f64) -> Self {
        let clamped = value.clamp(0.0, 1.0);
        Self {
            position: clamped,
            speed: clamped,
            course: clamped,
            heading: clamped,
        }
    }
}

/// Best-estimate vessel state for one cycle. Created by the fusion stage
/// and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusedState {
    /// Epoch seconds of the newest contributing reading.
    pub timestamp: f64,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
    pub heading_deg: f64,
    /// Sensor kinds that contributed at least one accepted sample.
    pub contributors: Vec<SensorKind>,
    pub confidence: FieldConfidence,
}

/// Tracked target vessel with a stable identifier assigned at first
/// detection and retained across cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: u32,
    /// External identity when one was reported (AIS MMSI).
    pub external_id: Option<String>,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
    /// Bearing from the ego vessel, degrees true.
    pub bearing_deg: f64,
    /// Range from the ego vessel, nautical miles.
    pub range_nm: f64,
    /// Closest point of approach in nautical miles; `None` when the
    /// target is diverging or the geometry is undefined.
    pub cpa_nm: Option<f64>,
    /// Minutes to CPA; `None` alongside `cpa_nm`.
    pub tcpa_min: Option<f64>,
}

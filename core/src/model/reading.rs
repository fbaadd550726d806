use serde::{Deserialize, Serialize};

/// Sensor families feeding the pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Gps,
    Ais,
    Radar,
    Weather,
    Engine,
    Tide,
    Current,
}

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Target contact reported by AIS or RADAR within a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// External identity when the source provides one (AIS MMSI).
    pub external_id: Option<String>,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
}

/// Sensor-specific payload, one variant per kind so a reading can only
/// carry the fields its sensor legitimately reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "lowercase")]
pub enum SensorExtras {
    Gps {
        hdop: Option<f64>,
    },
    Ais {
        rate_of_turn_deg_min: Option<f64>,
        contacts: Vec<Contact>,
    },
    Radar {
        contacts: Vec<Contact>,
    },
    Weather {
        wind_speed_kn: f64,
        wind_dir_deg: f64,
    },
    Engine {
        rpm: f64,
    },
    Tide {
        height_m: f64,
    },
    Current {
        set_kn: f64,
        drift_deg: f64,
    },
}

impl SensorExtras {
    /// Kind this payload belongs to.
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorExtras::Gps { .. } => SensorKind::Gps,
            SensorExtras::Ais { .. } => SensorKind::Ais,
            SensorExtras::Radar { .. } => SensorKind::Radar,
            SensorExtras::Weather { .. } => SensorKind::Weather,
            SensorExtras::Engine { .. } => SensorKind::Engine,
            SensorExtras::Tide { .. } => SensorKind::Tide,
            SensorExtras::Current { .. } => SensorKind::Current,
        }
    }

    /// Empty payload for a kind.
    pub fn empty(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Gps => SensorExtras::Gps { hdop: None },
            SensorKind::Ais => SensorExtras::Ais {
                rate_of_turn_deg_min: None,
                contacts: Vec::new(),
            },
            SensorKind::Radar => SensorExtras::Radar {
                contacts: Vec::new(),
            },
            SensorKind::Weather => SensorExtras::Weather {
                wind_speed_kn: 0.0,
                wind_dir_deg: 0.0,
            },
            SensorKind::Engine => SensorExtras::Engine { rpm: 0.0 },
            SensorKind::Tide => SensorExtras::Tide { height_m: 0.0 },
            SensorKind::Current => SensorExtras::Current {
                set_kn: 0.0,
                drift_deg: 0.0,
            },
        }
    }
}

/// One sensor's report for one cycle. Immutable once created; a batch of
/// these arrives per cycle in no particular order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub kind: SensorKind,
    /// Epoch seconds as reported by the sensor.
    pub timestamp: f64,
    pub position: Option<GeoPoint>,
    pub speed_kn: Option<f64>,
    pub course_deg: Option<f64>,
    pub heading_deg: Option<f64>,
    /// Declared reliability weight in [0, 1].
    pub weight: f64,
    pub extras: SensorExtras,
}

impl SensorReading {
    /// Minimal reading with no navigation fields.
    pub fn new(kind: SensorKind, timestamp: f64, weight: f64) -> Self {
        Self {
            kind,
            timestamp,
            position: None,
            speed_kn: None,
            course_deg: None,
            heading_deg: None,
            weight,
            extras: SensorExtras::empty(kind),
        }
    }

    /// Checks the reading for malformed values. A failing reading is
    /// dropped from the cycle, never raised as an error.
    pub fn validate(&self) -> Result<(), String> {
        if !self.timestamp.is_finite() {
            return Err(format!("{:?}: non-finite timestamp", self.kind));
        }
        if !(0.0..=1.0).contains(&self.weight) || !self.weight.is_finite() {
            return Err(format!(
                "{:?}: weight {} outside [0, 1]",
                self.kind, self.weight
            ));
        }
        if let Some(pos) = &self.position {
            if !pos.lat.is_finite() || pos.lat.abs() > 90.0 {
                return Err(format!("{:?}: latitude {} out of range", self.kind, pos.lat));
            }
            if !pos.lon.is_finite() || pos.lon.abs() > 180.0 {
                return Err(format!(
                    "{:?}: longitude {} out of range",
                    self.kind, pos.lon
                ));
            }
        }
        if let Some(speed) = self.speed_kn {
            if !speed.is_finite() || speed < 0.0 {
                return Err(format!("{:?}: speed {} invalid", self.kind, speed));
            }
        }
        for (name, angle) in [("course", self.course_deg), ("heading", self.heading_deg)] {
            if let Some(value) = angle {
                if !value.is_finite() || !(0.0..360.0).contains(&value) {
                    return Err(format!(
                        "{:?}: {} {} outside [0, 360)",
                        self.kind, name, value
                    ));
                }
            }
        }
        if self.extras.kind() != self.kind {
            return Err(format!(
                "{:?}: extras payload belongs to {:?}",
                self.kind,
                self.extras.kind()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_reading_passes() {
        let mut reading = SensorReading::new(SensorKind::Gps, 1000.0, 0.95);
        reading.position = Some(GeoPoint::new(51.5, -0.12));
        reading.speed_kn = Some(12.0);
        reading.course_deg = Some(45.0);
        assert!(reading.validate().is_ok());
    }

    #[test]
    fn course_outside_range_fails() {
        let mut reading = SensorReading::new(SensorKind::Ais, 1000.0, 0.85);
        reading.course_deg = Some(400.0);
        assert!(reading.validate().is_err());
    }

    #[test]
    fn mismatched_extras_fail() {
        let mut reading = SensorReading::new(SensorKind::Gps, 1000.0, 0.9);
        reading.extras = SensorExtras::empty(SensorKind::Tide);
        assert!(reading.validate().is_err());
    }

    #[test]
    fn extras_serialize_with_a_sensor_tag() {
        let extras = SensorExtras::Weather {
            wind_speed_kn: 18.0,
            wind_dir_deg: 220.0,
        };
        let json = serde_json::to_value(&extras).unwrap();
        assert_eq!(json["sensor"], "weather");
        assert_eq!(json["wind_speed_kn"], 18.0);
    }

    #[test]
    fn negative_speed_fails() {
        let mut reading = SensorReading::new(SensorKind::Gps, 1000.0, 0.9);
        reading.speed_kn = Some(-3.0);
        assert!(reading.validate().is_err());
    }
}

use crate::math::GeoHelper;
use crate::model::{Evidence, SensorReading, Severity, SpoofAlert, SpoofKind};
use crate::prelude::SpoofingConfig;
use crate::telemetry::log::LogManager;

/// Spoofing detection stage. Works on raw readings only, before fusion
/// smooths anything away, and compares against the previous cycle's raw
/// batch rather than the fused history.
pub struct SpoofingStage {
    config: SpoofingConfig,
    logger: LogManager,
}

impl SpoofingStage {
    pub fn new(config: SpoofingConfig) -> Self {
        Self {
            config,
            logger: LogManager::new(),
        }
    }

    /// `cycle_time` is the orchestrator's wall clock for this cycle, in
    /// epoch seconds.
    pub fn detect(
        &self,
        readings: &[SensorReading],
        previous_batch: &[SensorReading],
        cycle_time: f64,
    ) -> Vec<SpoofAlert> {
        let mut alerts = Vec::new();

        self.check_position_jumps(readings, previous_batch, &mut alerts);
        self.check_impossible_speeds(readings, &mut alerts);
        self.check_cross_mismatch(readings, cycle_time, &mut alerts);
        self.check_clock_skew(readings, cycle_time, &mut alerts);

        if !alerts.is_empty() {
            self.logger.record_warning(&format!(
                "SpoofingStage raised {} alert(s)",
                alerts.len()
            ));
        }
        alerts
    }

    /// A single sensor teleporting between consecutive cycles. Compared
    /// per sensor kind so one spoofed feed cannot hide behind the others.
    fn check_position_jumps(
        &self,
        readings: &[SensorReading],
        previous_batch: &[SensorReading],
        alerts: &mut Vec<SpoofAlert>,
    ) {
        for reading in readings {
            let Some(position) = reading.position else {
                continue;
            };
            let Some(previous) = previous_batch
                .iter()
                .find(|p| p.kind == reading.kind && p.position.is_some())
            else {
                continue;
            };
            let jump = GeoHelper::haversine_m(position, previous.position.unwrap_or_default());
            if jump > self.config.position_jump_m {
                alerts.push(SpoofAlert {
                    kind: SpoofKind::PositionJump,
                    severity: Severity::from_ratio(jump / self.config.position_jump_m),
                    description: format!(
                        "{:?} position moved {:.0} m since the previous cycle",
                        reading.kind, jump
                    ),
                    evidence: Evidence {
                        value: jump,
                        threshold: self.config.position_jump_m,
                    },
                    recommended_action: format!(
                        "Treat {:?} as untrusted and verify position against the remaining sensors",
                        reading.kind
                    ),
                    timestamp: reading.timestamp,
                });
            }
        }
    }

    fn check_impossible_speeds(&self, readings: &[SensorReading], alerts: &mut Vec<SpoofAlert>) {
        for reading in readings {
            let Some(speed) = reading.speed_kn else {
                continue;
            };
            if speed > self.config.max_speed_kn {
                alerts.push(SpoofAlert {
                    kind: SpoofKind::ImpossibleSpeed,
                    severity: Severity::from_ratio(speed / self.config.max_speed_kn),
                    description: format!(
                        "{:?} reports {:.1} kn, beyond any plausible vessel speed",
                        reading.kind, speed
                    ),
                    evidence: Evidence {
                        value: speed,
                        threshold: self.config.max_speed_kn,
                    },
                    recommended_action: format!(
                        "Discard {:?} speed until it returns to a plausible range",
                        reading.kind
                    ),
                    timestamp: reading.timestamp,
                });
            }
        }
    }

    /// One aggregated alert carrying the worst same-cycle disagreement
    /// between two sensor kinds. Smaller spreads are the anomaly
    /// detector's business; past this threshold they read as manipulation.
    fn check_cross_mismatch(
        &self,
        readings: &[SensorReading],
        cycle_time: f64,
        alerts: &mut Vec<SpoofAlert>,
    ) {
        let positions: Vec<_> = readings
            .iter()
            .filter_map(|r| r.position.map(|p| (r.kind, p)))
            .collect();

        let mut worst: Option<(f64, String)> = None;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let (kind_a, pos_a) = positions[i];
                let (kind_b, pos_b) = positions[j];
                if kind_a == kind_b {
                    continue;
                }
                let spread = GeoHelper::haversine_m(pos_a, pos_b);
                if spread > self.config.cross_mismatch_m
                    && worst.as_ref().map_or(true, |(w, _)| spread > *w)
                {
                    worst = Some((spread, format!("{:?}/{:?}", kind_a, kind_b)));
                }
            }
        }

        if let Some((spread, pair)) = worst {
            alerts.push(SpoofAlert {
                kind: SpoofKind::MultiSensorMismatch,
                severity: Severity::from_ratio(spread / self.config.cross_mismatch_m),
                description: format!(
                    "{} positions disagree by {:.0} m in the same cycle",
                    pair, spread
                ),
                evidence: Evidence {
                    value: spread,
                    threshold: self.config.cross_mismatch_m,
                },
                recommended_action:
                    "Cross-check all position sources and fall back to the most trusted one"
                        .to_string(),
                timestamp: cycle_time,
            });
        }
    }

    fn check_clock_skew(
        &self,
        readings: &[SensorReading],
        cycle_time: f64,
        alerts: &mut Vec<SpoofAlert>,
    ) {
        for reading in readings {
            let skew = (reading.timestamp - cycle_time).abs();
            if skew > self.config.clock_skew_s {
                alerts.push(SpoofAlert {
                    kind: SpoofKind::TimeManipulation,
                    severity: Severity::from_ratio(skew / self.config.clock_skew_s),
                    description: format!(
                        "{:?} timestamp is {:.0} s away from the cycle clock",
                        reading.kind, skew
                    ),
                    evidence: Evidence {
                        value: skew,
                        threshold: self.config.clock_skew_s,
                    },
                    recommended_action: format!(
                        "Verify the {:?} feed's clock before trusting its timing",
                        reading.kind
                    ),
                    timestamp: cycle_time,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPoint, SensorKind};

    fn reading(kind: SensorKind, ts: f64, lat: f64, lon: f64, speed: f64) -> SensorReading {
        let mut reading = SensorReading::new(kind, ts, 0.9);
        reading.position = Some(GeoPoint::new(lat, lon));
        reading.speed_kn = Some(speed);
        reading
    }

    fn stage() -> SpoofingStage {
        SpoofingStage::new(SpoofingConfig::default())
    }

    #[test]
    fn clean_batch_raises_nothing() {
        let previous = vec![reading(SensorKind::Gps, 99.0, 51.0, 0.0, 10.0)];
        let current = vec![
            reading(SensorKind::Gps, 100.0, 51.0001, 0.0, 10.1),
            reading(SensorKind::Ais, 100.0, 51.0002, 0.0, 10.0),
        ];
        assert!(stage().detect(&current, &previous, 100.0).is_empty());
    }

    #[test]
    fn kilometer_jump_raises_exactly_one_alert() {
        let previous = vec![reading(SensorKind::Gps, 99.0, 51.0, 0.0, 10.0)];
        // ~1.2 km north in one cycle.
        let current = vec![reading(SensorKind::Gps, 100.0, 51.0108, 0.0, 10.0)];
        let alerts = stage().detect(&current, &previous, 100.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, SpoofKind::PositionJump);
        assert!(!alerts[0].recommended_action.is_empty());
    }

    #[test]
    fn impossible_speed_is_flagged() {
        let current = vec![reading(SensorKind::Gps, 100.0, 51.0, 0.0, 75.0)];
        let alerts = stage().detect(&current, &[], 100.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, SpoofKind::ImpossibleSpeed);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn cross_sensor_disagreement_is_one_aggregated_alert() {
        // GPS vs both AIS and RADAR disagree, still a single alert with the
        // worst pair's distance.
        let current = vec![
            reading(SensorKind::Gps, 100.0, 51.0, 0.0, 10.0),
            reading(SensorKind::Ais, 100.0, 51.006, 0.0, 10.0),
            reading(SensorKind::Radar, 100.0, 51.008, 0.0, 10.0),
        ];
        let alerts = stage().detect(&current, &[], 100.0);
        let mismatches: Vec<_> = alerts
            .iter()
            .filter(|a| a.kind == SpoofKind::MultiSensorMismatch)
            .collect();
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].evidence.value > 800.0);
    }

    #[test]
    fn stale_timestamp_is_time_manipulation() {
        let current = vec![reading(SensorKind::Ais, 100.0, 51.0, 0.0, 10.0)];
        let alerts = stage().detect(&current, &[], 300.0);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, SpoofKind::TimeManipulation);
    }
}

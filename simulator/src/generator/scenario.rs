use clap::ValueEnum;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sacore::math::geo::{GeoHelper, KN_TO_MPS};
use sacore::model::{Contact, GeoPoint, SensorExtras, SensorKind, SensorReading};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// Injection points for the fault scenarios.
const SPOOF_START_CYCLE: u64 = 15;
const SPOOF_RAMP_CYCLES: u64 = 3;
const SPOOF_RAMP_STEP_M: f64 = 600.0;
const STALE_CLOCK_CYCLE: u64 = 22;
const IMPOSSIBLE_SPEED_CYCLE: u64 = 25;
const SPEED_SPIKE_CYCLE: u64 = 20;
const HARD_TURN_CYCLE: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    /// Steady transit; all three targets keep safe geometry.
    Normal,
    /// The head-on target runs a true reciprocal course at close range.
    Collision,
    /// GPS feed manipulated mid-run: offset ramp, stale clock, then an
    /// impossible speed.
    Spoofing,
    /// Own-ship faults: a speed spike and a hard turn.
    Anomaly,
}

#[derive(Debug, Clone)]
struct Vessel {
    position: GeoPoint,
    speed_kn: f64,
    course_deg: f64,
}

impl Vessel {
    fn advance(&mut self, dt_s: f64) {
        let distance = self.speed_kn * KN_TO_MPS * dt_s;
        let east = distance * self.course_deg.to_radians().sin();
        let north = distance * self.course_deg.to_radians().cos();
        self.position = GeoHelper::offset_point(self.position, east, north);
    }
}

#[derive(Debug, Clone)]
struct ScriptedTarget {
    vessel: Vessel,
    /// AIS identity; radar-only targets have none.
    mmsi: Option<String>,
}

/// Deterministic synthetic sensor feed: a seeded own-ship track, three
/// scripted targets (crossing, overtaking, head-on), and per-scenario
/// fault injections. Timestamps follow the wall clock so the pipeline's
/// clock checks see plausible timing.
pub struct ScenarioGenerator {
    kind: ScenarioKind,
    interval_s: f64,
    rng: StdRng,
    cycle: u64,
    own: Vessel,
    targets: Vec<ScriptedTarget>,
}

impl ScenarioGenerator {
    pub fn new(kind: ScenarioKind, seed: u64, interval_s: f64) -> Self {
        let own = Vessel {
            position: GeoPoint::new(51.0, 0.0),
            speed_kn: 10.0,
            course_deg: 0.0,
        };
        // Head-on: dead ahead and reciprocal in the collision scenario,
        // otherwise laterally offset far enough to keep CPA outside the
        // default limit.
        let head_on_lon = if kind == ScenarioKind::Collision { 0.0 } else { 0.06 };
        let targets = vec![
            ScriptedTarget {
                vessel: Vessel {
                    position: GeoPoint::new(51.05, head_on_lon),
                    speed_kn: 10.0,
                    course_deg: 180.0,
                },
                mmsi: Some("235067890".into()),
            },
            // Crossing traffic well to the east, opening the range.
            ScriptedTarget {
                vessel: Vessel {
                    position: GeoPoint::new(51.0, 0.12),
                    speed_kn: 12.0,
                    course_deg: 90.0,
                },
                mmsi: Some("235012345".into()),
            },
            // Overtaking from astern, radar-only.
            ScriptedTarget {
                vessel: Vessel {
                    position: GeoPoint::new(50.983, 0.0),
                    speed_kn: 14.0,
                    course_deg: 0.0,
                },
                mmsi: None,
            },
        ];
        Self {
            kind,
            interval_s,
            rng: StdRng::seed_from_u64(seed),
            cycle: 0,
            own,
            targets,
        }
    }

    pub fn next_batch(&mut self) -> Vec<SensorReading> {
        if self.cycle > 0 {
            self.own.advance(self.interval_s);
            for target in &mut self.targets {
                target.vessel.advance(self.interval_s);
            }
        }
        self.apply_own_ship_faults();

        let t = epoch_seconds();
        let mut batch = Vec::with_capacity(6);

        let mut gps = SensorReading::new(SensorKind::Gps, t, 0.95);
        gps.position = Some(self.jitter_position(self.spoofed_gps_position(), 10.0));
        gps.speed_kn = Some(self.gps_speed());
        gps.course_deg = Some(GeoHelper::norm_deg(self.own.course_deg + self.jitter(1.0)));
        batch.push(gps);

        let ais_timestamp =
            if self.kind == ScenarioKind::Spoofing && self.cycle == STALE_CLOCK_CYCLE {
                t - 120.0
            } else {
                t
            };
        let mut ais = SensorReading::new(SensorKind::Ais, ais_timestamp, 0.85);
        ais.position = Some(self.jitter_position(self.own.position, 25.0));
        ais.speed_kn = Some((self.own.speed_kn + self.jitter(0.4)).max(0.0));
        ais.course_deg = Some(GeoHelper::norm_deg(self.own.course_deg + self.jitter(2.0)));
        ais.heading_deg = Some(GeoHelper::norm_deg(self.own.course_deg + self.jitter(2.0)));
        let ais_contacts = self
            .targets
            .clone()
            .iter()
            .filter(|target| target.mmsi.is_some())
            .map(|target| Contact {
                external_id: target.mmsi.clone(),
                position: self.jitter_position(target.vessel.position, 20.0),
                speed_kn: (target.vessel.speed_kn + self.jitter(0.3)).max(0.0),
                course_deg: GeoHelper::norm_deg(target.vessel.course_deg + self.jitter(1.5)),
            })
            .collect();
        ais.extras = SensorExtras::Ais {
            rate_of_turn_deg_min: Some(self.jitter(1.5)),
            contacts: ais_contacts,
        };
        batch.push(ais);

        let mut radar = SensorReading::new(SensorKind::Radar, t, 0.8);
        radar.position = Some(self.jitter_position(self.own.position, 40.0));
        let radar_contacts = self
            .targets
            .clone()
            .iter()
            .map(|target| Contact {
                external_id: None,
                position: self.jitter_position(target.vessel.position, 60.0),
                speed_kn: (target.vessel.speed_kn + self.jitter(0.8)).max(0.0),
                course_deg: GeoHelper::norm_deg(target.vessel.course_deg + self.jitter(4.0)),
            })
            .collect();
        radar.extras = SensorExtras::Radar {
            contacts: radar_contacts,
        };
        batch.push(radar);

        if self.cycle % 5 == 0 {
            let mut weather = SensorReading::new(SensorKind::Weather, t, 0.9);
            weather.extras = SensorExtras::Weather {
                wind_speed_kn: 14.0 + self.jitter(2.0),
                wind_dir_deg: GeoHelper::norm_deg(225.0 + self.jitter(10.0)),
            };
            batch.push(weather);

            let mut tide = SensorReading::new(SensorKind::Tide, t, 0.9);
            tide.extras = SensorExtras::Tide {
                height_m: 1.2 + self.jitter(0.1),
            };
            batch.push(tide);
        }

        self.cycle += 1;
        batch
    }

    /// GPS truth plus the spoofing scenario's eastward offset ramp.
    fn spoofed_gps_position(&self) -> GeoPoint {
        if self.kind != ScenarioKind::Spoofing {
            return self.own.position;
        }
        let ramp = (SPOOF_START_CYCLE..SPOOF_START_CYCLE + SPOOF_RAMP_CYCLES)
            .contains(&self.cycle);
        if !ramp {
            return self.own.position;
        }
        let steps = (self.cycle - SPOOF_START_CYCLE + 1) as f64;
        GeoHelper::offset_point(self.own.position, steps * SPOOF_RAMP_STEP_M, 0.0)
    }

    fn gps_speed(&mut self) -> f64 {
        if self.kind == ScenarioKind::Spoofing && self.cycle == IMPOSSIBLE_SPEED_CYCLE {
            return 85.0;
        }
        (self.own.speed_kn + self.jitter(0.2)).max(0.0)
    }

    fn apply_own_ship_faults(&mut self) {
        if self.kind != ScenarioKind::Anomaly {
            return;
        }
        match self.cycle {
            SPEED_SPIKE_CYCLE => self.own.speed_kn += 9.0,
            c if c == SPEED_SPIKE_CYCLE + 1 => self.own.speed_kn -= 9.0,
            HARD_TURN_CYCLE => {
                self.own.course_deg = GeoHelper::norm_deg(self.own.course_deg + 45.0)
            }
            _ => {}
        }
    }

    fn jitter(&mut self, magnitude: f64) -> f64 {
        self.rng.gen_range(-magnitude..=magnitude)
    }

    fn jitter_position(&mut self, position: GeoPoint, magnitude_m: f64) -> GeoPoint {
        let east = self.jitter(magnitude_m);
        let north = self.jitter(magnitude_m);
        GeoHelper::offset_point(position, east, north)
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_positions() {
        let mut a = ScenarioGenerator::new(ScenarioKind::Normal, 42, 1.0);
        let mut b = ScenarioGenerator::new(ScenarioKind::Normal, 42, 1.0);
        for _ in 0..10 {
            let batch_a = a.next_batch();
            let batch_b = b.next_batch();
            assert_eq!(batch_a[0].position, batch_b[0].position);
            assert_eq!(batch_a[1].extras, batch_b[1].extras);
        }
    }

    #[test]
    fn batches_carry_three_targets() {
        let mut generator = ScenarioGenerator::new(ScenarioKind::Normal, 1, 1.0);
        let batch = generator.next_batch();
        let radar = batch.iter().find(|r| r.kind == SensorKind::Radar).unwrap();
        let SensorExtras::Radar { contacts } = &radar.extras else {
            panic!("radar reading without radar extras");
        };
        assert_eq!(contacts.len(), 3);
        let ais = batch.iter().find(|r| r.kind == SensorKind::Ais).unwrap();
        let SensorExtras::Ais { contacts, .. } = &ais.extras else {
            panic!("ais reading without ais extras");
        };
        // The overtaking target is radar-only.
        assert_eq!(contacts.len(), 2);
    }

    #[test]
    fn collision_head_on_target_closes_range() {
        let mut generator = ScenarioGenerator::new(ScenarioKind::Collision, 1, 1.0);
        generator.next_batch();
        let start = GeoHelper::haversine_m(
            generator.own.position,
            generator.targets[0].vessel.position,
        );
        for _ in 0..30 {
            generator.next_batch();
        }
        let end = GeoHelper::haversine_m(
            generator.own.position,
            generator.targets[0].vessel.position,
        );
        assert!(end < start, "range opened from {:.0} to {:.0} m", start, end);
    }

    #[test]
    fn spoofing_scenario_offsets_gps_only() {
        let mut generator = ScenarioGenerator::new(ScenarioKind::Spoofing, 3, 1.0);
        for _ in 0..SPOOF_START_CYCLE {
            generator.next_batch();
        }
        let batch = generator.next_batch();
        let gps = batch.iter().find(|r| r.kind == SensorKind::Gps).unwrap();
        let ais = batch.iter().find(|r| r.kind == SensorKind::Ais).unwrap();
        let spread = GeoHelper::haversine_m(gps.position.unwrap(), ais.position.unwrap());
        assert!(spread > 400.0, "expected spoofed spread, got {:.0} m", spread);
    }

    #[test]
    fn spoofing_scenario_injects_impossible_speed() {
        let mut generator = ScenarioGenerator::new(ScenarioKind::Spoofing, 3, 1.0);
        for _ in 0..IMPOSSIBLE_SPEED_CYCLE {
            generator.next_batch();
        }
        let batch = generator.next_batch();
        let gps = batch.iter().find(|r| r.kind == SensorKind::Gps).unwrap();
        assert!(gps.speed_kn.unwrap() > 60.0);
    }

    #[test]
    fn every_generated_reading_validates() {
        for kind in [
            ScenarioKind::Normal,
            ScenarioKind::Collision,
            ScenarioKind::Spoofing,
            ScenarioKind::Anomaly,
        ] {
            let mut generator = ScenarioGenerator::new(kind, 9, 1.0);
            for _ in 0..40 {
                for reading in generator.next_batch() {
                    reading.validate().unwrap();
                }
            }
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::math::GeoHelper;
use crate::model::GeoPoint;

/// A contact after AIS/RADAR merging, ready for track association.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub external_id: Option<String>,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
}

/// One tracked target in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u32,
    pub external_id: Option<String>,
    pub position: GeoPoint,
    pub speed_kn: f64,
    pub course_deg: f64,
    /// Consecutive cycles without an observation.
    pub misses: u32,
}

/// Arena of tracked targets with stable index-based identifiers. Cloned
/// by the orchestrator each cycle and committed only when the cycle
/// completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetTracker {
    next_id: u32,
    tracks: Vec<Track>,
}

impl TargetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates this cycle's observations with existing tracks (nearest
    /// neighbour within `match_m`), creates tracks for the rest, and drops
    /// tracks unobserved for more than `drop_cycles` cycles. Returns the
    /// ids of tracks observed this cycle.
    pub fn observe(
        &mut self,
        observations: &[Observation],
        match_m: f64,
        drop_cycles: u32,
    ) -> Vec<u32> {
        let mut matched_track: Vec<Option<usize>> = vec![None; observations.len()];
        let mut claimed = vec![false; self.tracks.len()];

        for (obs_idx, obs) in observations.iter().enumerate() {
            let mut best: Option<(usize, f64)> = None;
            for (track_idx, track) in self.tracks.iter().enumerate() {
                if claimed[track_idx] {
                    continue;
                }
                // Shared external identity wins regardless of distance.
                if obs.external_id.is_some() && obs.external_id == track.external_id {
                    best = Some((track_idx, 0.0));
                    break;
                }
                let distance = GeoHelper::haversine_m(obs.position, track.position);
                if distance <= match_m && best.map_or(true, |(_, d)| distance < d) {
                    best = Some((track_idx, distance));
                }
            }
            if let Some((track_idx, _)) = best {
                claimed[track_idx] = true;
                matched_track[obs_idx] = Some(track_idx);
            }
        }

        let mut seen = Vec::with_capacity(observations.len());
        for (obs_idx, obs) in observations.iter().enumerate() {
            match matched_track[obs_idx] {
                Some(track_idx) => {
                    let track = &mut self.tracks[track_idx];
                    track.position = obs.position;
                    track.speed_kn = obs.speed_kn;
                    track.course_deg = obs.course_deg;
                    if track.external_id.is_none() {
                        track.external_id = obs.external_id.clone();
                    }
                    track.misses = 0;
                    seen.push(track.id);
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.tracks.push(Track {
                        id,
                        external_id: obs.external_id.clone(),
                        position: obs.position,
                        speed_kn: obs.speed_kn,
                        course_deg: obs.course_deg,
                        misses: 0,
                    });
                    seen.push(id);
                }
            }
        }

        for (track_idx, track) in self.tracks.iter_mut().enumerate() {
            if track_idx < claimed.len() && !claimed[track_idx] && !seen.contains(&track.id) {
                track.misses += 1;
            }
        }
        self.tracks.retain(|t| t.misses <= drop_cycles);

        seen
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(lat: f64, lon: f64) -> Observation {
        Observation {
            external_id: None,
            position: GeoPoint::new(lat, lon),
            speed_kn: 10.0,
            course_deg: 90.0,
        }
    }

    #[test]
    fn ids_stay_stable_across_cycles() {
        let mut tracker = TargetTracker::new();
        let first = tracker.observe(&[obs(51.0, 0.0)], 500.0, 2);
        // Moved ~110 m east, well inside the match radius.
        let second = tracker.observe(&[obs(51.0, 0.0016)], 500.0, 2);
        assert_eq!(first, second);
        assert_eq!(tracker.tracks().len(), 1);
    }

    #[test]
    fn unmatched_observation_opens_new_track() {
        let mut tracker = TargetTracker::new();
        tracker.observe(&[obs(51.0, 0.0)], 500.0, 2);
        tracker.observe(&[obs(51.0, 0.0), obs(51.2, 0.5)], 500.0, 2);
        assert_eq!(tracker.tracks().len(), 2);
        assert_ne!(tracker.tracks()[0].id, tracker.tracks()[1].id);
    }

    #[test]
    fn stale_tracks_are_dropped_after_miss_budget() {
        let mut tracker = TargetTracker::new();
        tracker.observe(&[obs(51.0, 0.0)], 500.0, 1);
        tracker.observe(&[], 500.0, 1);
        assert_eq!(tracker.tracks().len(), 1);
        tracker.observe(&[], 500.0, 1);
        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn external_identity_beats_distance() {
        let mut tracker = TargetTracker::new();
        let mut tagged = obs(51.0, 0.0);
        tagged.external_id = Some("235012345".into());
        tracker.observe(std::slice::from_ref(&tagged), 500.0, 2);
        // Same identity reappearing far away still matches the track.
        tagged.position = GeoPoint::new(51.5, 0.5);
        let seen = tracker.observe(std::slice::from_ref(&tagged), 500.0, 2);
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(seen, vec![tracker.tracks()[0].id]);
    }
}

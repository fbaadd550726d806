use crate::model::GeoPoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METERS_PER_NM: f64 = 1_852.0;
pub const KN_TO_MPS: f64 = 0.514_444;

pub struct GeoHelper;

impl GeoHelper {
    /// Great-circle distance between two points in meters.
    pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
        let phi1 = a.lat.to_radians();
        let phi2 = b.lat.to_radians();
        let dphi = (b.lat - a.lat).to_radians();
        let dlambda = (b.lon - a.lon).to_radians();

        let h = (dphi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Initial bearing from `a` to `b`, degrees true in [0, 360).
    pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
        let phi1 = a.lat.to_radians();
        let phi2 = b.lat.to_radians();
        let dlambda = (b.lon - a.lon).to_radians();

        let y = dlambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();

        Self::norm_deg(y.atan2(x).to_degrees())
    }

    /// East/north offset of `point` from `origin` in meters, flat-earth
    /// approximation valid at target-tracking ranges.
    pub fn local_offset_m(origin: GeoPoint, point: GeoPoint) -> (f64, f64) {
        let meters_per_deg_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        let north = (point.lat - origin.lat) * meters_per_deg_lat;
        let east =
            (point.lon - origin.lon) * meters_per_deg_lat * origin.lat.to_radians().cos();
        (east, north)
    }

    /// Point reached from `origin` after moving `east`/`north` meters,
    /// inverse of [`Self::local_offset_m`].
    pub fn offset_point(origin: GeoPoint, east: f64, north: f64) -> GeoPoint {
        let meters_per_deg_lat = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        let lat = origin.lat + north / meters_per_deg_lat;
        let lon = origin.lon
            + east / (meters_per_deg_lat * origin.lat.to_radians().cos());
        GeoPoint::new(lat, lon)
    }

    /// Weighted circular mean of angles in degrees. `None` when the input
    /// is empty, carries no weight, or the resultant vector vanishes.
    pub fn circular_mean_deg(samples: &[(f64, f64)]) -> Option<f64> {
        let mut sin_sum = 0.0;
        let mut cos_sum = 0.0;
        let mut weight_sum = 0.0;
        for &(angle, weight) in samples {
            sin_sum += angle.to_radians().sin() * weight;
            cos_sum += angle.to_radians().cos() * weight;
            weight_sum += weight;
        }
        if weight_sum <= 0.0 {
            return None;
        }
        if sin_sum.hypot(cos_sum) < 1e-12 {
            return None;
        }
        Some(Self::norm_deg(sin_sum.atan2(cos_sum).to_degrees()))
    }

    /// Signed smallest difference `a - b` in degrees, in [-180, 180).
    pub fn angle_diff_deg(a: f64, b: f64) -> f64 {
        let mut diff = (a - b) % 360.0;
        if diff < -180.0 {
            diff += 360.0;
        } else if diff >= 180.0 {
            diff -= 360.0;
        }
        diff
    }

    /// Normalizes an angle to [0, 360).
    pub fn norm_deg(angle: f64) -> f64 {
        let wrapped = angle % 360.0;
        if wrapped < 0.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_of_identical_points_is_zero() {
        let p = GeoPoint::new(51.5, -0.12);
        assert!(GeoHelper::haversine_m(p, p) < 1e-6);
    }

    #[test]
    fn haversine_matches_one_degree_latitude() {
        let a = GeoPoint::new(50.0, 0.0);
        let b = GeoPoint::new(51.0, 0.0);
        let d = GeoHelper::haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 100.0, "got {}", d);
    }

    #[test]
    fn bearing_due_north() {
        let a = GeoPoint::new(50.0, 0.0);
        let b = GeoPoint::new(51.0, 0.0);
        assert!(GeoHelper::bearing_deg(a, b).abs() < 1e-6);
    }

    #[test]
    fn circular_mean_handles_wraparound() {
        let mean = GeoHelper::circular_mean_deg(&[(350.0, 1.0), (10.0, 1.0)]).unwrap();
        assert!(mean < 1e-6 || (mean - 360.0).abs() < 1e-6, "got {}", mean);
    }

    #[test]
    fn angle_diff_is_signed_and_wrapped() {
        assert!((GeoHelper::angle_diff_deg(10.0, 350.0) - 20.0).abs() < 1e-9);
        assert!((GeoHelper::angle_diff_deg(350.0, 10.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn offset_point_inverts_local_offset() {
        let origin = GeoPoint::new(51.0, -0.1);
        let moved = GeoHelper::offset_point(origin, 250.0, -400.0);
        let (east, north) = GeoHelper::local_offset_m(origin, moved);
        assert!((east - 250.0).abs() < 1e-6);
        assert!((north + 400.0).abs() < 1e-6);
    }

    #[test]
    fn local_offset_north_is_positive_lat() {
        let origin = GeoPoint::new(51.0, 0.0);
        let (east, north) = GeoHelper::local_offset_m(origin, GeoPoint::new(51.01, 0.0));
        assert!(east.abs() < 1e-6);
        assert!((north - 1_111.95).abs() < 1.0, "got {}", north);
    }
}

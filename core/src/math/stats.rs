pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Sample standard deviation (n - 1 denominator). `None` below two
    /// samples.
    pub fn sample_std(samples: &[f64]) -> Option<f64> {
        if samples.len() < 2 {
            return None;
        }
        let mean = Self::mean(samples)?;
        let var = samples
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (samples.len() - 1) as f64;
        Some(var.sqrt())
    }

    /// Circular standard deviation of angles in degrees, via the resultant
    /// vector length. `None` below two samples.
    pub fn circular_std_deg(angles_deg: &[f64]) -> Option<f64> {
        if angles_deg.len() < 2 {
            return None;
        }
        let n = angles_deg.len() as f64;
        let sin_mean = angles_deg.iter().map(|a| a.to_radians().sin()).sum::<f64>() / n;
        let cos_mean = angles_deg.iter().map(|a| a.to_radians().cos()).sum::<f64>() / n;
        let resultant = sin_mean.hypot(cos_mean).min(1.0);
        if resultant <= f64::EPSILON {
            // Uniformly spread angles carry no directional information.
            return Some(180.0);
        }
        Some((-2.0 * resultant.ln()).sqrt().to_degrees())
    }
}

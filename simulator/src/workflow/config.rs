use anyhow::Context;
use sacore::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::generator::scenario::ScenarioKind;

/// One simulation run: scenario script, pacing, and the full pipeline
/// configuration handed to the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub cycles: usize,
    pub interval_s: f64,
    pub seed: u64,
    pub scenario: ScenarioKind,
    pub pipeline: PipelineConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cycles: 60,
            interval_s: 1.0,
            seed: 7,
            scenario: ScenarioKind::Normal,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading simulation config {}", path_ref.display()))?;
        let config: SimulationConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing simulation config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(cycles: usize, scenario: ScenarioKind, seed: u64) -> Self {
        Self {
            cycles,
            scenario,
            seed,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_keeps_pipeline_defaults() {
        let cfg = SimulationConfig::from_args(30, ScenarioKind::Collision, 11);
        assert_eq!(cfg.cycles, 30);
        assert!(cfg.pipeline.validate().is_ok());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"cycles: 25\nseed: 3\nscenario: spoofing\npipeline:\n  anomaly:\n    cpa_limit_nm: 1.5\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = SimulationConfig::load(&path).unwrap();
        assert_eq!(cfg.cycles, 25);
        assert_eq!(cfg.scenario, ScenarioKind::Spoofing);
        assert_eq!(cfg.pipeline.anomaly.cpa_limit_nm, 1.5);
        // Fields absent from the file keep their defaults.
        assert_eq!(cfg.interval_s, 1.0);
    }
}

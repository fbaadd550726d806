use crate::workflow::config::SimulationConfig;
use anyhow::{anyhow, Context};
use sacore::model::{CombinedReport, SensorReading};
use sacore::telemetry::MetricsSnapshot;
use sacore::SituationPipeline;
use std::sync::Mutex;

/// Owns the pipeline and serializes access to it, so the offline loop and
/// the HTTP bridge can share one instance behind an `Arc`.
pub struct Runner {
    pipeline: Mutex<SituationPipeline>,
}

impl Runner {
    pub fn new(config: &SimulationConfig) -> anyhow::Result<Self> {
        let pipeline = SituationPipeline::new(config.pipeline.clone())
            .context("constructing situational-awareness pipeline")?;
        Ok(Self {
            pipeline: Mutex::new(pipeline),
        })
    }

    pub fn execute(&self, readings: &[SensorReading]) -> anyhow::Result<CombinedReport> {
        let mut pipeline = self
            .pipeline
            .lock()
            .map_err(|_| anyhow!("pipeline lock poisoned"))?;
        pipeline.process(readings).context("processing cycle")
    }

    pub fn reset(&self) -> anyhow::Result<()> {
        let mut pipeline = self
            .pipeline
            .lock()
            .map_err(|_| anyhow!("pipeline lock poisoned"))?;
        pipeline.reset();
        Ok(())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pipeline
            .lock()
            .map(|p| p.metrics())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::scenario::{ScenarioGenerator, ScenarioKind};
    use sacore::model::AnomalyKind;

    #[test]
    fn runner_processes_generated_batches() {
        let config = SimulationConfig::default();
        let runner = Runner::new(&config).unwrap();
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        for _ in 0..5 {
            let report = runner.execute(&generator.next_batch()).unwrap();
            assert!(!report.fused.contributors.is_empty());
        }
        assert_eq!(runner.metrics().cycles, 5);
    }

    #[test]
    fn collision_scenario_flags_a_risk() {
        let config = SimulationConfig::from_args(10, ScenarioKind::Collision, 5);
        let runner = Runner::new(&config).unwrap();
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        let mut flagged = false;
        for _ in 0..config.cycles {
            let report = runner.execute(&generator.next_batch()).unwrap();
            flagged |= report
                .anomalies
                .iter()
                .any(|a| a.kind == AnomalyKind::CollisionRisk);
        }
        assert!(flagged, "reciprocal-course target never flagged");
    }

    #[test]
    fn reset_starts_target_ids_over() {
        let config = SimulationConfig::from_args(5, ScenarioKind::Collision, 5);
        let runner = Runner::new(&config).unwrap();
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        let first = runner.execute(&generator.next_batch()).unwrap();
        runner.reset().unwrap();
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        let second = runner.execute(&generator.next_batch()).unwrap();
        assert_eq!(
            first.targets.iter().map(|t| t.id).collect::<Vec<_>>(),
            second.targets.iter().map(|t| t.id).collect::<Vec<_>>()
        );
    }
}

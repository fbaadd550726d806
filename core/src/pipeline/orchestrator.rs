use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;

use crate::model::{CombinedReport, SensorKind, SensorReading};
use crate::pipeline::anomaly::AnomalyStage;
use crate::pipeline::fusion::FusionStage;
use crate::pipeline::history::HistoryBuffer;
use crate::pipeline::spoofing::SpoofingStage;
use crate::pipeline::tracker::TargetTracker;
use crate::pipeline::uncertainty::UncertaintyStage;
use crate::prelude::{PipelineConfig, SaError, SaResult};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Constructed or reset; no cycle has completed yet.
    Initialized,
    /// At least one cycle has completed since the last reset.
    Running,
}

/// The situational-awareness pipeline: fusion, anomaly detection,
/// spoofing detection, and uncertainty modeling run in a fixed order over
/// each batch of readings. Owns every piece of cross-cycle state; the
/// stages themselves are stateless.
pub struct SituationPipeline {
    config: PipelineConfig,
    fusion: FusionStage,
    anomaly: AnomalyStage,
    spoofing: SpoofingStage,
    uncertainty: UncertaintyStage,
    history: HistoryBuffer,
    tracker: TargetTracker,
    degraded: BTreeMap<SensorKind, u32>,
    previous_batch: Vec<SensorReading>,
    state: PipelineState,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl SituationPipeline {
    /// Fails fast on an invalid configuration; nothing is constructed
    /// half-way.
    pub fn new(config: PipelineConfig) -> SaResult<Self> {
        config.validate()?;
        let capacity = config.effective_history_capacity();
        Ok(Self {
            fusion: FusionStage::new(config.fusion.clone()),
            anomaly: AnomalyStage::new(config.anomaly.clone()),
            spoofing: SpoofingStage::new(config.spoofing.clone()),
            uncertainty: UncertaintyStage::new(config.uncertainty.clone()),
            history: HistoryBuffer::with_capacity(capacity),
            tracker: TargetTracker::new(),
            degraded: BTreeMap::new(),
            previous_batch: Vec::new(),
            state: PipelineState::Initialized,
            logger: LogManager::new(),
            metrics: MetricsRecorder::new(),
            config,
        })
    }

    /// Runs one full cycle over a batch of readings and returns the
    /// combined report. Malformed and out-of-order readings are dropped
    /// and counted, never fatal; the only error paths are broken internal
    /// invariants.
    pub fn process(&mut self, readings: &[SensorReading]) -> SaResult<CombinedReport> {
        let started = Instant::now();
        let cycle_time = epoch_seconds();

        if self.history.len() > self.history.capacity() {
            return Err(SaError::InvariantViolation(format!(
                "history holds {} entries, capacity is {}",
                self.history.len(),
                self.history.capacity()
            )));
        }

        let accepted = self.screen(readings);

        let outcome = self
            .fusion
            .fuse(&accepted, &self.history, &self.tracker);

        // A critical sensor counts as degraded both when it is silent and
        // when fusion rejected one of its samples as an outlier.
        let rejected_kinds: BTreeSet<SensorKind> = outcome
            .evidence
            .rejected
            .iter()
            .map(|sample| sample.kind)
            .collect();
        for &kind in &self.config.anomaly.critical_sensors {
            if outcome.state.contributors.contains(&kind) && !rejected_kinds.contains(&kind) {
                self.degraded.insert(kind, 0);
            } else {
                *self.degraded.entry(kind).or_insert(0) += 1;
            }
        }

        let anomalies = self.anomaly.detect(
            &outcome.state,
            &outcome.targets,
            &outcome.evidence,
            &self.history,
            &self.degraded,
        );
        let spoof_alerts = self
            .spoofing
            .detect(&accepted, &self.previous_batch, cycle_time);
        let uncertainty = self.uncertainty.model(
            &outcome.state,
            &outcome.targets,
            &anomalies,
            &spoof_alerts,
            &self.history,
        );

        // Commit point: nothing above mutates cross-cycle state, so a
        // report is always built from one coherent cycle.
        self.tracker = outcome.tracker;
        if !(accepted.is_empty() && self.history.is_empty()) {
            self.history.push(outcome.state.clone());
            // The first committed state marks the first successful cycle;
            // a degenerate opening cycle leaves the pipeline Initialized.
            self.state = PipelineState::Running;
        }
        self.previous_batch = accepted;

        let processing_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_cycle(processing_ms);
        self.logger.record(&format!(
            "cycle complete in {:.2} ms, {} anomaly(ies), {} spoof alert(s)",
            processing_ms,
            anomalies.len(),
            spoof_alerts.len()
        ));

        Ok(CombinedReport {
            fused: outcome.state,
            targets: outcome.targets,
            anomalies,
            spoof_alerts,
            uncertainty,
            environment: outcome.environment,
            processing_ms,
        })
    }

    /// Drops malformed and out-of-order readings, counting and logging
    /// each drop.
    fn screen(&self, readings: &[SensorReading]) -> Vec<SensorReading> {
        let mut accepted = Vec::with_capacity(readings.len());
        let mut dropped = 0usize;
        let last_timestamp = self.history.last().map(|s| s.timestamp);

        for reading in readings {
            if let Err(reason) = reading.validate() {
                self.logger.record_warning(&format!(
                    "dropping malformed {:?} reading: {}",
                    reading.kind, reason
                ));
                dropped += 1;
                continue;
            }
            if let Some(last) = last_timestamp {
                if reading.timestamp < last {
                    self.logger.record_warning(&format!(
                        "dropping out-of-order {:?} reading ({:.1} s behind)",
                        reading.kind,
                        last - reading.timestamp
                    ));
                    dropped += 1;
                    continue;
                }
            }
            accepted.push(reading.clone());
        }

        if dropped > 0 {
            self.metrics.record_dropped(dropped);
        }
        accepted
    }

    /// Returns the pipeline to its just-constructed state: history,
    /// tracks, degradation counters, the previous raw batch, and metrics
    /// are all discarded. The configuration is kept.
    pub fn reset(&mut self) {
        self.history.clear();
        self.tracker.clear();
        self.degraded.clear();
        self.previous_batch.clear();
        self.state = PipelineState::Initialized;
        self.metrics.reset();
        self.logger.record("pipeline reset");
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Pipeline handle shared across async tasks, for callers that feed
/// readings from one task and serve reports from another.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<SituationPipeline>>,
}

impl SharedPipeline {
    pub fn new(config: PipelineConfig) -> SaResult<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(SituationPipeline::new(config)?)),
        })
    }

    pub async fn process(&self, readings: &[SensorReading]) -> SaResult<CombinedReport> {
        self.inner.lock().await.process(readings)
    }

    pub async fn reset(&self) {
        self.inner.lock().await.reset();
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        self.inner.lock().await.metrics()
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
    use crate::model::GeoPoint;

    fn gps(ts: f64, lat: f64) -> SensorReading {
        let mut reading = SensorReading::new(SensorKind::Gps, ts, 0.95);
        reading.position = Some(GeoPoint::new(lat, 0.0));
        reading.speed_kn = Some(10.0);
        reading.course_deg = Some(0.0);
        reading
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.fusion.smoothing_factor = 0.0;
        assert!(SituationPipeline::new(config).is_err());
    }

    #[test]
    fn first_cycle_moves_to_running() {
        let mut pipeline = SituationPipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Initialized);
        pipeline.process(&[gps(100.0, 51.0)]).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Running);
        assert_eq!(pipeline.metrics().cycles, 1);
    }

    #[test]
    fn malformed_reading_is_dropped_not_fatal() {
        let mut pipeline = SituationPipeline::new(PipelineConfig::default()).unwrap();
        let mut bad = gps(100.0, 51.0);
        bad.course_deg = Some(400.0);
        let report = pipeline.process(&[bad]).unwrap();
        assert!(report.fused.contributors.is_empty());
        assert_eq!(pipeline.metrics().dropped_readings, 1);
    }

    #[test]
    fn out_of_order_reading_is_dropped() {
        let mut pipeline = SituationPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.process(&[gps(100.0, 51.0)]).unwrap();
        let report = pipeline.process(&[gps(50.0, 51.0)]).unwrap();
        assert!(report.fused.contributors.is_empty());
        assert_eq!(pipeline.metrics().dropped_readings, 1);
    }

    #[test]
    fn reset_returns_to_initialized() {
        let mut pipeline = SituationPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.process(&[gps(100.0, 51.0)]).unwrap();
        pipeline.reset();
        assert_eq!(pipeline.state(), PipelineState::Initialized);
        assert_eq!(pipeline.metrics(), MetricsSnapshot::default());
    }

    #[test]
    fn shared_pipeline_processes_from_async_context() {
        let shared = SharedPipeline::new(PipelineConfig::default()).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let report = shared.process(&[gps(100.0, 51.0)]).await.unwrap();
            assert_eq!(report.fused.contributors, vec![SensorKind::Gps]);
            shared.reset().await;
            assert_eq!(shared.metrics().await.cycles, 0);
        });
    }

    #[test]
    fn empty_first_cycle_leaves_no_history() {
        let mut pipeline = SituationPipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.process(&[]).unwrap();
        assert!(report.fused.contributors.is_empty());
        // Nothing was committed, so this was not a successful cycle.
        assert_eq!(pipeline.state(), PipelineState::Initialized);
        // The degenerate state must not poison later cycles.
        let report = pipeline.process(&[gps(100.0, 51.0)]).unwrap();
        assert!((report.fused.position.lat - 51.0).abs() < 1e-9);
        assert_eq!(pipeline.state(), PipelineState::Running);
    }
}

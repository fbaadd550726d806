use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

#[derive(Default)]
struct Metrics {
    cycles: usize,
    dropped_readings: usize,
    total_ms: f64,
    max_ms: f64,
}

/// Aggregate view of the recorder's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub cycles: usize,
    pub dropped_readings: usize,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_cycle(&self, elapsed_ms: f64) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.cycles += 1;
            metrics.total_ms += elapsed_ms;
            if elapsed_ms > metrics.max_ms {
                metrics.max_ms = elapsed_ms;
            }
        }
    }

    pub fn record_dropped(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.dropped_readings += count;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            MetricsSnapshot {
                cycles: metrics.cycles,
                dropped_readings: metrics.dropped_readings,
                avg_ms: if metrics.cycles > 0 {
                    metrics.total_ms / metrics.cycles as f64
                } else {
                    0.0
                },
                max_ms: metrics.max_ms,
            }
        } else {
            MetricsSnapshot::default()
        }
    }

    pub fn reset(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            *metrics = Metrics::default();
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

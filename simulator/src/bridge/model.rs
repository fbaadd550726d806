use sacore::model::CombinedReport;
use sacore::telemetry::MetricsSnapshot;
use serde::{Deserialize, Serialize};

/// What the HTTP bridge serves: the latest cycle's report plus run-level
/// counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardModel {
    pub report: Option<CombinedReport>,
    pub metrics: MetricsSnapshot,
    pub cycles_completed: usize,
}

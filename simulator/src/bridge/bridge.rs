use crate::bridge::model::DashboardModel;
use crate::workflow::runner::Runner;
use anyhow::Result;
use sacore::model::{CombinedReport, SensorReading};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

fn bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug)]
struct WarpError;

impl warp::reject::Reject for WarpError {}

/// Hosts the report endpoint and feeds posted reading batches through the
/// shared runner.
pub struct ReportBridge {
    state: Arc<RwLock<DashboardModel>>,
}

impl ReportBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        let state = Arc::new(RwLock::new(DashboardModel::default()));
        let state_for_filter = state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());
        let runner_filter = warp::any().map(move || runner.clone());

        let report_route = warp::path("report")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<RwLock<DashboardModel>>| {
                warp::reply::json(&*state.read().unwrap())
            });

        let ingest_route = warp::path("ingest")
            .and(warp::post())
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(runner_filter.clone())
            .and_then(
                |readings: Vec<SensorReading>,
                 state: Arc<RwLock<DashboardModel>>,
                 runner: Arc<Runner>| async move {
                    match runner.execute(&readings) {
                        Ok(report) => {
                            let mut guard = state.write().unwrap();
                            guard.cycles_completed += 1;
                            guard.metrics = runner.metrics();
                            let anomalies = report.anomalies.len();
                            let spoof_alerts = report.spoof_alerts.len();
                            guard.report = Some(report);
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({
                                    "status": "ok",
                                    "anomalies": anomalies,
                                    "spoof_alerts": spoof_alerts,
                                })),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            eprintln!("ingest error: {}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        let reset_route = warp::path("reset")
            .and(warp::post())
            .and(state_filter)
            .and(runner_filter)
            .and_then(
                |state: Arc<RwLock<DashboardModel>>, runner: Arc<Runner>| async move {
                    match runner.reset() {
                        Ok(()) => {
                            let mut guard = state.write().unwrap();
                            *guard = DashboardModel::default();
                            Ok::<_, warp::Rejection>(warp::reply::with_status(
                                warp::reply::json(&json!({"status": "reset"})),
                                StatusCode::OK,
                            ))
                        }
                        Err(err) => {
                            eprintln!("reset error: {}", err);
                            Err(warp::reject::custom(WarpError))
                        }
                    }
                },
            );

        thread::spawn(move || {
            let routes = report_route.or(ingest_route).or(reset_route);
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build runtime");
            runtime.block_on(async move {
                warp::serve(routes).run(bind_address()).await;
            });
        });

        Self { state }
    }

    pub fn publish(&self, report: &CombinedReport, cycles_completed: usize) -> Result<()> {
        let mut guard = self.state.write().unwrap();
        guard.report = Some(report.clone());
        guard.cycles_completed = cycles_completed;
        println!(
            "[BRIDGE] cycle {}: {} target(s), {} anomaly(ies), {} spoof alert(s)",
            cycles_completed,
            report.targets.len(),
            report.anomalies.len(),
            report.spoof_alerts.len()
        );
        Ok(())
    }

    pub fn publish_status(&self, message: &str) {
        println!("[BRIDGE] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> DashboardModel {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::scenario::ScenarioGenerator;
    use crate::workflow::config::SimulationConfig;
    use std::sync::Arc;

    #[test]
    fn bridge_publishes_latest_report() {
        let config = SimulationConfig::default();
        let runner = Arc::new(Runner::new(&config).unwrap());
        let bridge = ReportBridge::new(runner.clone());
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        let report = runner.execute(&generator.next_batch()).unwrap();
        bridge.publish(&report, 1).unwrap();
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.cycles_completed, 1);
        assert!(snapshot.report.is_some());
    }
}

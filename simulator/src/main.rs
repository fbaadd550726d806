use anyhow::Context;
use bridge::bridge::ReportBridge;
use clap::Parser;
use generator::scenario::{ScenarioGenerator, ScenarioKind};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::SimulationConfig;
use workflow::runner::Runner;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Situational-awareness scenario driver")]
struct Args {
    /// Run a scripted scenario offline and emit a run summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a simulation config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 60)]
    cycles: usize,
    #[arg(long, value_enum, default_value = "normal")]
    scenario: ScenarioKind,
    #[arg(long, default_value_t = 7)]
    seed: u64,
    /// Keep the HTTP bridge alive for posted reading batches
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = if let Some(path) = args.workflow {
        SimulationConfig::load(path)?
    } else {
        SimulationConfig::from_args(args.cycles, args.scenario, args.seed)
    };

    let runner = Arc::new(Runner::new(&config)?);
    let report_bridge = ReportBridge::new(runner.clone());

    if args.offline {
        let mut generator =
            ScenarioGenerator::new(config.scenario, config.seed, config.interval_s);
        let mut anomalies = 0usize;
        let mut spoof_alerts = 0usize;
        let mut last_report = None;

        for cycle in 0..config.cycles {
            let report = runner.execute(&generator.next_batch())?;
            anomalies += report.anomalies.len();
            spoof_alerts += report.spoof_alerts.len();
            if !report.anomalies.is_empty() || !report.spoof_alerts.is_empty() {
                report_bridge.publish(&report, cycle + 1)?;
            }
            last_report = Some(report);
        }

        let metrics = runner.metrics();
        println!(
            "Offline run -> cycles {}, anomalies {}, spoof alerts {}, avg {:.2} ms",
            metrics.cycles, anomalies, spoof_alerts, metrics.avg_ms
        );

        if let Some(report) = &last_report {
            report_bridge.publish(report, config.cycles)?;
            report_bridge.publish_status("Offline scenario results ready.");

            let summary = format!(
                "scenario={:?} cycles={} anomalies={} spoof_alerts={} reliability={:.3} avg_ms={:.2}\n",
                config.scenario,
                metrics.cycles,
                anomalies,
                spoof_alerts,
                report.uncertainty.overall_reliability,
                metrics.avg_ms
            );
            let summary_path = PathBuf::from("tools/data/offline_run.log");
            if let Some(parent) = summary_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(summary_path)?;
            file.write_all(summary.as_bytes())?;
        }
    }
    if args.serve {
        report_bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for signal handling")?;
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

use daemon_harness::config::{load_settings, render_settings, SettingsOverrides};
use daemon_harness::diagnostics::ShellDiagnostics;
use daemon_harness::{DaemonClient, Orchestrator, EXIT_FATAL};

#[derive(Parser)]
#[command(name = "daemon-harness")]
#[command(about = "End-to-end validation run against a live execution daemon")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/harness.toml")]
    config: PathBuf,

    /// Daemon gRPC endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Number of doubling calculations to submit
    #[arg(short = 'n', long)]
    calculations: Option<usize>,

    /// Number of plain nested workflows to submit
    #[arg(short, long)]
    workflows: Option<usize>,

    /// Seconds between polling rounds
    #[arg(long)]
    interval: Option<u64>,

    /// Seconds after which polling gives up
    #[arg(long)]
    deadline: Option<u64>,

    /// Daemon log file dumped at the end of the run
    #[arg(long, value_name = "FILE")]
    daemon_log: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            endpoint: self.endpoint.clone(),
            calculations: self.calculations,
            workflows: self.workflows,
            interval_secs: self.interval,
            deadline_secs: self.deadline,
            daemon_log_file: self.daemon_log.clone(),
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let settings = load_settings(Some(args.config.as_path()), &args.overrides())?;

    if args.print_config {
        print!("{}", render_settings(&settings)?);
        return Ok(0);
    }

    info!("Using daemon at {}", settings.daemon.endpoint);
    let daemon = Arc::new(DaemonClient::with_config(settings.client_config())?);
    let diagnostics = Arc::new(ShellDiagnostics::new(&settings.diagnostics));

    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current polling round");
            let _ = cancel_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(settings, daemon, diagnostics);
    let report = orchestrator.run(&mut cancel_rx).await?;

    if let Some(path) = &args.report {
        report.write_to(path)?;
    }
    Ok(report.exit_code)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("Harness run failed: {e:#}");
            EXIT_FATAL
        }
    };
    std::process::exit(code);
}

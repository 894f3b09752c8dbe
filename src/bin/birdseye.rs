//! birdseye: terminal operations dashboard.
//!
//! Usage:
//!   birdseye [--config <path>] [--summary-path <path>] [--interval-secs <n>] [--once] [--no-clear]
//!
//! Credentials come from GITHUB_TOKEN, HEROKU_TOKEN and SNAPCI_TOKEN (SNAPCI_USER optional).
//! Logs go to stderr; filter with BIRDSEYE_LOG or RUST_LOG (default "warn").

use anyhow::Context;
use birdseye::config::{Credentials, DashboardConfig};
use birdseye::render::Terminal;
use birdseye::Dashboard;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "birdseye", version, about = "Bird's Eye View operations dashboard")]
struct Args {
    /// YAML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override where the ok/warn/crit summary is written
    #[arg(long)]
    summary_path: Option<PathBuf>,

    /// Override the pause between refresh cycles
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Run a single cycle and exit
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Do not clear the screen before drawing
    #[arg(long, default_value_t = false)]
    no_clear: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("BIRDSEYE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    // Missing credentials end the process here, before any request is made.
    let credentials = Credentials::from_env().context("missing API credentials")?;

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(path) = args.summary_path {
        config.summary_path = path;
    }
    if let Some(secs) = args.interval_secs {
        config.refresh_interval_secs = secs;
    }
    config.validate().context("invalid configuration")?;

    let dashboard = Dashboard::from_config(&config, &credentials)?;
    let mut term = Terminal::stdout(!args.no_clear);

    if args.once {
        dashboard.initialize(&mut term).await?;
        let outcome = dashboard.run_cycle(&mut term).await?;
        for report in outcome.report.failed_sources() {
            eprintln!("source {} failed: {:?}", report.source, report.status);
        }
        return Ok(());
    }

    dashboard
        .run(&mut term, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}

//! vpn-checker: scheduled reachability checks for VPN account configs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpn_checker::channels::{build_destinations, Notifier};
use vpn_checker::config::Config;
use vpn_checker::cycle::{shutdown_signal, CycleRunner, Orchestrator, Scheduler};
use vpn_checker::metrics::Metrics;
use vpn_checker::probe::{ProbeConfig, Prober};
use vpn_checker::report::{summary_message, CycleReport};
use vpn_checker::sources::{self, LocalDirSource};
use vpn_checker::status::{self, AppState, StatusBoard};

#[derive(Parser)]
#[command(name = "vpn-checker", version, about = "Reachability checks for VPN account configs")]
struct Cli {
    /// Config file (default: ~/.vpn-checker/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check on a fixed interval, serve status, and send notifications
    Run,
    /// Run a single cycle against the configured source
    Once {
        /// Print the report as JSON instead of the text summary
        #[arg(long)]
        json: bool,
        /// Also deliver the report to configured channels
        #[arg(long)]
        notify: bool,
    },
    /// Check local files without a config file
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 3)]
        concurrency: usize,
        #[arg(long, default_value_t = 8)]
        timeout_secs: u64,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(verbosity: u8, json: bool) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn print_report(report: &CycleReport, json: bool, interval_minutes: Option<u64>) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", summary_message(report, interval_minutes));
    }
    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    let shutdown = CancellationToken::new();
    let metrics = Metrics::new().context("failed to register metrics")?;
    let board = StatusBoard::new();

    let orchestrator = Orchestrator::new(
        sources::from_config(&config.source)?,
        Prober::from_config(&config.check)?,
    )
    .with_cancellation(shutdown.clone());

    let notifier = Notifier::new(
        build_destinations(&config)?,
        config.notify.clone(),
        config.check.interval_minutes,
    );
    if notifier.is_empty() {
        tracing::warn!("no notification channels configured; reports are only logged");
    }
    for (channel, healthy) in notifier.health_check().await {
        if !healthy {
            tracing::warn!(channel = %channel, "channel health check failed");
        }
    }

    let status_task = if config.status.enabled {
        let listener = status::bind(&config.status.host, config.status.port).await?;
        let state = AppState {
            board: board.clone(),
            metrics: metrics.clone(),
        };
        let shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            let result = status::serve(listener, state, shutdown).await;
            if let Err(e) = &result {
                tracing::error!("status listener stopped: {e:#}");
            }
            result
        }))
    } else {
        None
    };

    let runner = CycleRunner::new(Arc::new(orchestrator), board, metrics, notifier);
    let scheduler = tokio::spawn(
        Scheduler::new(runner, config.check.interval()).run(shutdown.clone()),
    );

    shutdown_signal().await?;
    shutdown.cancel();

    scheduler.await.context("scheduler task failed")?;
    if let Some(task) = status_task {
        task.await.context("status task failed")??;
    }
    Ok(())
}

async fn run_once(config: Config, json: bool, notify: bool) -> Result<()> {
    let orchestrator = Orchestrator::new(
        sources::from_config(&config.source)?,
        Prober::from_config(&config.check)?,
    );
    let report = orchestrator.run_cycle().await?;
    print_report(&report, json, Some(config.check.interval_minutes))?;

    if notify {
        let notifier = Notifier::new(
            build_destinations(&config)?,
            config.notify.clone(),
            config.check.interval_minutes,
        );
        notifier.notify(&report).await;
    }
    Ok(())
}

async fn run_check(
    files: Vec<PathBuf>,
    concurrency: usize,
    timeout_secs: u64,
    json: bool,
) -> Result<()> {
    if concurrency == 0 {
        bail!("--concurrency must be greater than 0");
    }
    if timeout_secs == 0 {
        bail!("--timeout-secs must be greater than 0");
    }
    let prober = Prober::new(ProbeConfig {
        max_concurrency: concurrency,
        timeout: Duration::from_secs(timeout_secs),
    });
    let orchestrator = Orchestrator::new(Arc::new(LocalDirSource::from_files(files)), prober);
    let report = orchestrator.run_cycle().await?;
    print_report(&report, json, None)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Command::Run => run_service(Config::load(cli.config.as_deref())?).await,
        Command::Once { json, notify } => {
            run_once(Config::load(cli.config.as_deref())?, json, notify).await
        }
        Command::Check {
            files,
            concurrency,
            timeout_secs,
            json,
        } => run_check(files, concurrency, timeout_secs, json).await,
    }
}

//! Periodic cycle driver.
//!
//! The first cycle starts immediately; later ticks start a cycle only when
//! the previous one has finished (overlapping ticks are skipped and counted,
//! never queued).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::orchestrator::{CycleError, Orchestrator};
use crate::channels::Notifier;
use crate::metrics::Metrics;
use crate::report::CycleReport;
use crate::status::StatusBoard;

/// Runs one cycle and hands the result to every consumer: metrics, the
/// status board, and notification channels.
#[derive(Clone)]
pub struct CycleRunner {
    orchestrator: Arc<Orchestrator>,
    board: StatusBoard,
    metrics: Metrics,
    notifier: Notifier,
}

impl CycleRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        board: StatusBoard,
        metrics: Metrics,
        notifier: Notifier,
    ) -> Self {
        Self {
            orchestrator,
            board,
            metrics,
            notifier,
        }
    }

    pub async fn run_once(&self) -> Option<CycleReport> {
        match self.orchestrator.run_cycle().await {
            Ok(report) => {
                self.metrics.record_cycle(&report);
                self.board.publish(report.clone());
                self.notifier.notify(&report).await;
                Some(report)
            }
            Err(CycleError::AlreadyRunning) => {
                tracing::info!("previous cycle still running, skipping");
                self.metrics.record_skipped();
                None
            }
            Err(e) => {
                tracing::error!("check cycle failed: {e}");
                self.notifier
                    .broadcast(&format!(
                        "🚨 VPN Checker Error\n\n{e}\n\nWill retry on the next check."
                    ))
                    .await;
                None
            }
        }
    }
}

pub struct Scheduler {
    runner: CycleRunner,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: CycleRunner, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Tick until `shutdown` is cancelled, then wait for the in-flight cycle.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        tracing::info!(interval_secs = self.interval.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if in_flight.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        tracing::info!("tick skipped: cycle still running");
                        self.runner.metrics.record_skipped();
                        continue;
                    }
                    let runner = self.runner.clone();
                    in_flight = Some(tokio::spawn(async move {
                        runner.run_once().await;
                    }));
                }
            }
        }

        if let Some(handle) = in_flight {
            tracing::info!("waiting for in-flight cycle to finish");
            if let Err(e) = handle.await {
                tracing::warn!("cycle task ended abnormally: {e}");
            }
        }
        tracing::info!("scheduler stopped");
    }
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() -> anyhow::Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("failed to install Ctrl-C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<anyhow::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            tracing::info!("received Ctrl-C, shutting down");
        }
        result = terminate => {
            result?;
            tracing::info!("received SIGTERM, shutting down");
        }
    }
    Ok(())
}

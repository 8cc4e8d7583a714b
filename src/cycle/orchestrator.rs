//! Single-cycle pipeline: list → fetch → parse → extract → probe → aggregate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::accounts::{ensure_ws_path, extract, parse_document};
use crate::probe::Prober;
use crate::report::{aggregate, CycleReport, SourceResult};
use crate::sources::ConfigSource;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("a check cycle is already running")]
    AlreadyRunning,
    #[error("failed to list sources: {0}")]
    Enumerate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Idle,
    Running,
}

/// Clears the running flag when a cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs check cycles over one [`ConfigSource`]. At most one cycle runs at a
/// time; sources are processed in listing order.
pub struct Orchestrator {
    source: Arc<dyn ConfigSource>,
    prober: Prober,
    running: AtomicBool,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn ConfigSource>, prober: Prober) -> Self {
        Self {
            source,
            prober,
            running: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop starting new sources and new probes once `token` is cancelled.
    /// Probes already in flight finish or time out.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> CycleState {
        if self.running.load(Ordering::Acquire) {
            CycleState::Running
        } else {
            CycleState::Idle
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let _guard = RunningGuard::acquire(&self.running).ok_or(CycleError::AlreadyRunning)?;
        let started_at = Utc::now();

        let ids = self
            .source
            .list()
            .await
            .map_err(|e| CycleError::Enumerate(format!("{e:#}")))?;
        tracing::info!(source = self.source.name(), files = ids.len(), "starting check cycle");

        let mut results = Vec::with_capacity(ids.len());
        let mut interrupted = false;
        for id in &ids {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    remaining = ids.len() - results.len(),
                    "shutdown requested, stopping cycle early"
                );
                interrupted = true;
                break;
            }
            results.push(self.check_source(id).await);
        }
        // A stop during the last source still skipped its unstarted probes.
        interrupted |= self.cancel.is_cancelled();

        let report = CycleReport::new(results, started_at, Utc::now(), interrupted);
        tracing::info!(
            reachable = report.totals.successful,
            total = report.totals.total,
            sources = report.sources.len(),
            "check cycle finished"
        );
        Ok(report)
    }

    async fn check_source(&self, id: &str) -> SourceResult {
        let bytes = match self.source.fetch(id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(source = %id, error = %e, "fetch failed");
                return SourceResult::empty(id, format!("fetch failed: {e}"));
            }
        };
        let document = match parse_document(id, &bytes) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(source = %id, error = %e, "unreadable document");
                return SourceResult::empty(id, e.to_string());
            }
        };

        let extraction = extract(&document);
        for err in &extraction.errors {
            tracing::debug!(source = %id, "skipped descriptor: {err}");
        }
        let rejected = extraction.errors.len();
        let accounts = ensure_ws_path(extraction.accounts);
        let outcomes = self.prober.probe_until(&accounts, &self.cancel).await;

        let mut result = aggregate(id, &accounts, &outcomes);
        result.extraction_errors = rejected;
        if result.total == 0 && rejected > 0 {
            result.note = Some(format!("no accounts found ({rejected} descriptors rejected)"));
        }
        tracing::info!(
            source = %id,
            reachable = result.successful,
            total = result.total,
            rejected,
            "source checked"
        );
        result
    }
}

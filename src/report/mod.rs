//! Per-source and per-cycle result model, ranking, and message formatting.

pub mod aggregator;
pub mod format;
pub mod ranker;

pub use aggregator::aggregate;
pub use format::{failure_alert, summary_message};
pub use ranker::{rank, RankedAccount};

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate over all outcomes originating from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source_id: String,
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    /// ParseError outcomes; already counted in `failed`.
    pub parse_errors: usize,
    /// Descriptors the extractor rejected; never counted in `total`.
    pub extraction_errors: usize,
    pub success_rate: f64,
    pub countries: BTreeSet<String>,
    pub ranked_accounts: Vec<RankedAccount>,
    /// Failed accounts with their outcome, in input order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RankedAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SourceResult {
    /// A source that produced nothing to probe.
    pub fn empty(source_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            successful: 0,
            failed: 0,
            total: 0,
            parse_errors: 0,
            extraction_errors: 0,
            success_rate: 0.0,
            countries: BTreeSet::new(),
            ranked_accounts: Vec::new(),
            failures: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Sum of all per-source counts in a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
    pub success_rate: f64,
}

/// Everything one cycle produced, in source listing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub sources: Vec<SourceResult>,
    pub totals: Totals,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Set when a stop signal cut the cycle short.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn new(
        sources: Vec<SourceResult>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        interrupted: bool,
    ) -> Self {
        let totals = totals_of(&sources);
        Self {
            sources,
            totals,
            started_at,
            finished_at,
            interrupted,
        }
    }

    /// No source yielded a single account to probe.
    pub fn is_empty(&self) -> bool {
        self.totals.total == 0
    }

    pub fn has_failures(&self) -> bool {
        self.totals.failed > 0
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

pub(crate) fn success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        successful as f64 / total as f64
    }
}

fn totals_of(sources: &[SourceResult]) -> Totals {
    let (successful, failed, total) = sources.iter().fold((0, 0, 0), |(s, f, t), r| {
        (s + r.successful, f + r.failed, t + r.total)
    });
    Totals {
        successful,
        failed,
        total,
        success_rate: success_rate(successful, total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, successful: usize, failed: usize) -> SourceResult {
        SourceResult {
            successful,
            failed,
            total: successful + failed,
            success_rate: success_rate(successful, successful + failed),
            note: None,
            ..SourceResult::empty(id, "")
        }
    }

    #[test]
    fn totals_sum_all_sources() {
        let now = Utc::now();
        let report = CycleReport::new(vec![source("a", 3, 0), source("b", 0, 2)], now, now, false);
        assert_eq!(report.totals.successful, 3);
        assert_eq!(report.totals.failed, 2);
        assert_eq!(report.totals.total, 5);
        assert!((report.totals.success_rate - 0.6).abs() < f64::EPSILON);
        assert!(report.has_failures());
        assert!(!report.is_empty());
    }

    #[test]
    fn empty_report_has_zero_rate() {
        let now = Utc::now();
        let report = CycleReport::new(Vec::new(), now, now, false);
        assert!(report.is_empty());
        assert_eq!(report.totals.success_rate, 0.0);
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn empty_source_carries_note() {
        let result = SourceResult::empty("x.json", "fetch failed");
        assert_eq!(result.total, 0);
        assert_eq!(result.success_rate, 0.0);
        assert_eq!(result.note.as_deref(), Some("fetch failed"));
    }
}

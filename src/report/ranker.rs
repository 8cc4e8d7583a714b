//! Priority ranking of reachable accounts.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::accounts::Account;
use crate::probe::Outcome;

/// An account paired with the outcome of its probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAccount {
    pub account: Account,
    pub outcome: Outcome,
}

fn compare_country(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keep reachable entries only, fastest first.
///
/// Ties on latency are broken by country (case-insensitive, missing last),
/// then by input order. `rank(rank(x)) == rank(x)`.
pub fn rank(entries: Vec<RankedAccount>) -> Vec<RankedAccount> {
    let mut reachable: Vec<RankedAccount> = entries
        .into_iter()
        .filter(|entry| entry.outcome.is_reachable())
        .collect();
    reachable.sort_by(|a, b| {
        a.outcome
            .latency_ms
            .unwrap_or(u64::MAX)
            .cmp(&b.outcome.latency_ms.unwrap_or(u64::MAX))
            .then_with(|| {
                compare_country(a.outcome.country.as_deref(), b.outcome.country.as_deref())
            })
    });
    reachable
}

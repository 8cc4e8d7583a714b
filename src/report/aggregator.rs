//! Reduction of one source's outcomes into a [`SourceResult`].

use std::collections::BTreeSet;

use super::ranker::{rank, RankedAccount};
use super::{success_rate, SourceResult};
use crate::accounts::Account;
use crate::probe::{Outcome, ProbeStatus};

/// Note attached to a source whose document held no probe-able account.
pub const NO_ACCOUNTS_NOTE: &str = "no accounts found";

/// Summarize one source. `outcomes[i]` must belong to `accounts[i]`.
///
/// Pure: the same inputs always produce an identical result.
pub fn aggregate(source_id: &str, accounts: &[Account], outcomes: &[Outcome]) -> SourceResult {
    debug_assert_eq!(accounts.len(), outcomes.len());

    let entries: Vec<RankedAccount> = accounts
        .iter()
        .zip(outcomes)
        .map(|(account, outcome)| RankedAccount {
            account: account.clone(),
            outcome: outcome.clone(),
        })
        .collect();

    let successful = entries.iter().filter(|e| e.outcome.is_reachable()).count();
    let parse_errors = entries
        .iter()
        .filter(|e| e.outcome.status == ProbeStatus::ParseError)
        .count();
    let total = entries.len();
    let countries: BTreeSet<String> = entries
        .iter()
        .filter(|e| e.outcome.is_reachable())
        .filter_map(|e| e.outcome.country.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
        .collect();
    let failures: Vec<RankedAccount> = entries
        .iter()
        .filter(|e| !e.outcome.is_reachable())
        .cloned()
        .collect();

    SourceResult {
        source_id: source_id.to_string(),
        successful,
        failed: total - successful,
        total,
        parse_errors,
        extraction_errors: 0,
        success_rate: success_rate(successful, total),
        countries,
        ranked_accounts: rank(entries),
        failures,
        note: (total == 0).then(|| NO_ACCOUNTS_NOTE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use std::time::Duration;

    fn account(tag: &str) -> Account {
        Account {
            tag: tag.into(),
            protocol: "vless".into(),
            host: format!("{tag}.example.com"),
            port: 443,
            transport: None,
            path: None,
            raw: serde_json::Value::Null,
        }
    }

    fn reachable(ms: u64, country: Option<&str>) -> Outcome {
        let mut outcome = Outcome::reachable(Duration::from_millis(ms));
        outcome.country = country.map(Into::into);
        outcome
    }

    #[test]
    fn counts_rates_and_countries() {
        let accounts = vec![account("a"), account("b"), account("c"), account("d")];
        let mut dead = Outcome::unreachable(&ProbeError::Timeout);
        dead.country = Some("Japan".into());
        let outcomes = vec![
            reachable(40, Some("Singapore")),
            dead,
            reachable(10, Some("Germany")),
            Outcome::parse_error("missing host"),
        ];

        let result = aggregate("nodes.json", &accounts, &outcomes);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 2);
        assert_eq!(result.total, 4);
        assert_eq!(result.parse_errors, 1);
        assert!((result.success_rate - 0.5).abs() < f64::EPSILON);
        let countries: Vec<&str> = result.countries.iter().map(String::as_str).collect();
        assert_eq!(countries, vec!["Germany", "Singapore"]);
        let ranked: Vec<&str> = result
            .ranked_accounts
            .iter()
            .map(|e| e.account.tag.as_str())
            .collect();
        assert_eq!(ranked, vec!["c", "a"]);
        let failed: Vec<&str> = result.failures.iter().map(|e| e.account.tag.as_str()).collect();
        assert_eq!(failed, vec!["b", "d"]);
        assert!(result.note.is_none());
    }

    #[test]
    fn empty_source_is_zero_rate_with_note() {
        let result = aggregate("empty.json", &[], &[]);
        assert_eq!(result.total, 0);
        assert_eq!(result.success_rate, 0.0);
        assert_eq!(result.note.as_deref(), Some(NO_ACCOUNTS_NOTE));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let accounts = vec![account("a"), account("b")];
        let outcomes = vec![reachable(5, None), Outcome::unreachable(&ProbeError::ConnectionRefused)];
        assert_eq!(
            aggregate("s", &accounts, &outcomes),
            aggregate("s", &accounts, &outcomes)
        );
    }
}

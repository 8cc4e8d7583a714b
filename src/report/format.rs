//! Human-readable report messages for notification channels.
//!
//! Output is Telegram-flavoured Markdown (`*bold*`); WhatsApp renders the
//! same markers natively.

use std::fmt::Write as _;

use super::{CycleReport, SourceResult};

/// Countries rendered per source.
const MAX_FLAGS: usize = 5;

/// Failed accounts listed individually in an alert.
const MAX_LISTED_FAILURES: usize = 10;

const FALLBACK_FLAG: &str = "🌍";

const COUNTRY_CODES: &[(&str, &str)] = &[
    ("Indonesia", "ID"),
    ("Singapore", "SG"),
    ("Malaysia", "MY"),
    ("Thailand", "TH"),
    ("Philippines", "PH"),
    ("Vietnam", "VN"),
    ("United States", "US"),
    ("Canada", "CA"),
    ("United Kingdom", "GB"),
    ("Germany", "DE"),
    ("France", "FR"),
    ("Netherlands", "NL"),
    ("The Netherlands", "NL"),
    ("Japan", "JP"),
    ("South Korea", "KR"),
    ("Australia", "AU"),
    ("India", "IN"),
    ("China", "CN"),
    ("Hong Kong", "HK"),
    ("Taiwan", "TW"),
    ("Brazil", "BR"),
    ("Argentina", "AR"),
    ("Mexico", "MX"),
    ("Russia", "RU"),
    ("Turkey", "TR"),
    ("Sweden", "SE"),
    ("Norway", "NO"),
    ("Finland", "FI"),
    ("Denmark", "DK"),
    ("Switzerland", "CH"),
    ("Austria", "AT"),
    ("Belgium", "BE"),
    ("Italy", "IT"),
    ("Spain", "ES"),
    ("Poland", "PL"),
    ("Czech Republic", "CZ"),
    ("Czechia", "CZ"),
    ("Hungary", "HU"),
    ("Romania", "RO"),
    ("Bulgaria", "BG"),
    ("Croatia", "HR"),
    ("Ukraine", "UA"),
    ("Estonia", "EE"),
    ("Latvia", "LV"),
    ("Lithuania", "LT"),
    ("Slovakia", "SK"),
    ("Slovenia", "SI"),
    ("South Africa", "ZA"),
    ("Egypt", "EG"),
    ("Israel", "IL"),
    ("UAE", "AE"),
    ("United Arab Emirates", "AE"),
    ("Saudi Arabia", "SA"),
    ("New Zealand", "NZ"),
];

fn regional_indicators(code: &str) -> Option<String> {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    code.to_ascii_uppercase()
        .chars()
        .map(|c| char::from_u32(0x1F1E6 + (c as u32 - 'A' as u32)))
        .collect()
}

/// Flag emoji for a country name or ISO 3166 alpha-2 code.
pub fn country_flag(country: &str) -> String {
    let country = country.trim();
    regional_indicators(country)
        .or_else(|| {
            COUNTRY_CODES
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(country))
                .and_then(|(_, code)| regional_indicators(code))
        })
        .unwrap_or_else(|| FALLBACK_FLAG.to_string())
}

fn status_emoji(success_rate: f64) -> &'static str {
    if success_rate >= 0.8 {
        "✅"
    } else if success_rate >= 0.5 {
        "⚠️"
    } else {
        "❌"
    }
}

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn write_source(out: &mut String, source: &SourceResult) {
    let _ = writeln!(out, "{} *{}*", status_emoji(source.success_rate), source.source_id);
    if let Some(note) = source.note.as_deref().filter(|_| source.total == 0) {
        let _ = writeln!(out, "   {note}");
        out.push('\n');
        return;
    }
    let _ = writeln!(
        out,
        "   Alive: {} | Dead: {} | Total: {}",
        source.successful, source.failed, source.total
    );
    let _ = writeln!(out, "   Status: {} working", percent(source.success_rate));
    if let Some(best) = source.ranked_accounts.first() {
        if let Some(ms) = best.outcome.latency_ms {
            let _ = writeln!(out, "   Fastest: {} ({ms} ms)", best.account.tag);
        }
    }
    if !source.countries.is_empty() {
        let flags: Vec<String> = source
            .countries
            .iter()
            .take(MAX_FLAGS)
            .map(|c| country_flag(c))
            .collect();
        let _ = writeln!(out, "   Countries: {}", flags.join(" "));
    }
    out.push('\n');
}

/// Per-source breakdown, global summary, and (for scheduled runs) a cadence
/// footer.
///
/// An empty report renders a distinct "nothing to check" message rather
/// than a 0% summary.
pub fn summary_message(report: &CycleReport, interval_minutes: Option<u64>) -> String {
    let check_time = report.finished_at.format("%H:%M:%S");
    let mut out = format!("🔍 *VPN Status Report* - {check_time}\n\n");

    if report.is_empty() {
        out.push_str("📭 Nothing to check: no accounts were found in any source.\n");
        for source in &report.sources {
            if let Some(note) = &source.note {
                let _ = writeln!(out, "• {}: {note}", source.source_id);
            }
        }
        if report.sources.is_empty() {
            out.push_str("• no config sources listed\n");
        }
    } else {
        for source in &report.sources {
            write_source(&mut out, source);
        }
        let totals = &report.totals;
        out.push_str("📊 *TOTAL SUMMARY*\n");
        let _ = writeln!(out, "✅ Total Alive: {}", totals.successful);
        let _ = writeln!(out, "❌ Total Dead: {}", totals.failed);
        let _ = writeln!(out, "📦 Total Accounts: {}", totals.total);
        let _ = writeln!(out, "📈 Success Rate: {}", percent(totals.success_rate));
    }

    if report.interrupted {
        out.push_str("\n⏹️ Cycle interrupted before all sources were checked.\n");
    }
    if let Some(minutes) = interval_minutes {
        let _ = write!(out, "\n🔄 Automatic check every {minutes} minutes");
    }
    out
}

/// Alert listing failed accounts, or `None` when nothing failed.
pub fn failure_alert(report: &CycleReport) -> Option<String> {
    let failures: Vec<_> = report
        .sources
        .iter()
        .flat_map(|source| source.failures.iter())
        .collect();
    if failures.is_empty() {
        return None;
    }

    let mut out = String::from("🚨 VPN Accounts Down Alert\n\n");
    let _ = writeln!(out, "❌ {} accounts failed:\n", failures.len());
    for entry in failures.iter().take(MAX_LISTED_FAILURES) {
        let _ = writeln!(
            out,
            "• {}: {} ({})",
            entry.account.protocol.to_uppercase(),
            entry.account.tag,
            entry.outcome.detail.as_deref().unwrap_or("unreachable")
        );
    }
    if failures.len() > MAX_LISTED_FAILURES {
        let _ = write!(
            out,
            "\n... and {} more accounts failed",
            failures.len() - MAX_LISTED_FAILURES
        );
    }
    Some(out)
}

use crate::domain::quote::QuoteSummary;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Codes whose stored snapshot is missing or older than `max_age`, in input order. Each code
/// appears at most once.
pub fn codes_needing_fetch(
    codes: &[String],
    stored: &[QuoteSummary],
    now: DateTime<Utc>,
    max_age: Duration,
) -> Vec<String> {
    let by_code: HashMap<&str, &QuoteSummary> =
        stored.iter().map(|s| (s.code.as_str(), s)).collect();

    let mut seen = HashSet::new();
    codes
        .iter()
        .filter(|code| seen.insert(code.as_str()))
        .filter(|code| match by_code.get(code.as_str()) {
            Some(s) => s.is_stale(now, max_age),
            None => true,
        })
        .cloned()
        .collect()
}

/// Lines snapshots up with `codes`, preferring `fetched` over `stored`. Codes with neither are
/// skipped.
pub fn merge_in_order(
    codes: &[String],
    stored: Vec<QuoteSummary>,
    fetched: Vec<QuoteSummary>,
) -> Vec<QuoteSummary> {
    let mut by_code: HashMap<String, QuoteSummary> = HashMap::new();
    for s in stored.into_iter().chain(fetched) {
        by_code.insert(s.code.clone(), s);
    }

    codes.iter().filter_map(|c| by_code.remove(c)).collect()
}

use crate::domain::quote::QuoteSummary;
use crate::domain::recommendation::{recommend_at, Recommendation, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached per-code view: the user's unit price and the signal derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub unit_price: f64,
    pub status: Status,
    pub profit_rate: f64,
}

impl UserData {
    pub fn derive(unit_price: f64, quote: &QuoteSummary, now: DateTime<Utc>) -> Self {
        let Recommendation {
            status,
            profit_rate,
        } = recommend_at(&quote.metrics(), unit_price, now);
        Self {
            unit_price,
            status,
            profit_rate,
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        Recommendation {
            status: self.status,
            profit_rate: self.profit_rate,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    data: UserData,
    quote_fetched_at: DateTime<Utc>,
}

/// Keyed cache of [`UserData`]. An entry is recomputed only when its unit price changes or a
/// quote snapshot with a different `fetched_at` arrives, so repeated reads are stable.
#[derive(Debug, Clone, Default)]
pub struct UserDataStore {
    entries: BTreeMap<String, Entry>,
}

impl UserDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, code: &str) -> Option<UserData> {
        self.entries.get(code).map(|e| e.data)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// Returns the entry for `quote.code`. On first read the unit price comes from
    /// `default_unit_price` (typically the persisted value); later reads reuse the cached unit
    /// price and only recompute when the snapshot changed.
    pub fn get_or_init<F>(
        &mut self,
        quote: &QuoteSummary,
        now: DateTime<Utc>,
        default_unit_price: F,
    ) -> UserData
    where
        F: FnOnce() -> f64,
    {
        if let Some(entry) = self.entries.get_mut(&quote.code) {
            if entry.quote_fetched_at != quote.fetched_at {
                entry.data = UserData::derive(entry.data.unit_price, quote, now);
                entry.quote_fetched_at = quote.fetched_at;
            }
            return entry.data;
        }

        let data = UserData::derive(default_unit_price(), quote, now);
        self.entries.insert(
            quote.code.clone(),
            Entry {
                data,
                quote_fetched_at: quote.fetched_at,
            },
        );
        data
    }

    pub fn set_unit_price(
        &mut self,
        quote: &QuoteSummary,
        unit_price: f64,
        now: DateTime<Utc>,
    ) -> UserData {
        let data = UserData::derive(unit_price, quote, now);
        self.entries.insert(
            quote.code.clone(),
            Entry {
                data,
                quote_fetched_at: quote.fetched_at,
            },
        );
        data
    }

    pub fn remove(&mut self, code: &str) -> Option<UserData> {
        self.entries.remove(code).map(|e| e.data)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn quote(previous_close: &str, fetched_at: DateTime<Utc>) -> QuoteSummary {
        QuoteSummary::new("AAPL", previous_close, "20", "2.5", "Jan 28, 2027", fetched_at)
    }

    #[test]
    fn get_or_init_reads_default_once() {
        let mut store = UserDataStore::new();
        let q = quote("110", now());
        let mut calls = 0;

        let first = store.get_or_init(&q, now(), || {
            calls += 1;
            100.0
        });
        let second = store.get_or_init(&q, now(), || {
            calls += 1;
            0.0
        });

        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert_eq!(second.unit_price, 100.0);
        assert_eq!(second.status, Status::Buy);
    }

    #[test]
    fn newer_snapshot_recomputes_with_cached_unit_price() {
        let mut store = UserDataStore::new();
        store.get_or_init(&quote("110", now()), now(), || 100.0);

        let later = now() + chrono::Duration::hours(1);
        let data = store.get_or_init(&quote("160", later), later, || 0.0);
        assert_eq!(data.unit_price, 100.0);
        assert_eq!(data.status, Status::Sell);
        assert!((data.profit_rate - 60.0).abs() < 1e-9);
    }

    #[test]
    fn set_unit_price_recomputes() {
        let mut store = UserDataStore::new();
        let q = quote("160", now());
        store.get_or_init(&q, now(), || 0.0);
        assert_eq!(store.get("AAPL").unwrap().profit_rate, 0.0);

        let data = store.set_unit_price(&q, 100.0, now());
        assert_eq!(data.status, Status::Sell);
        assert_eq!(store.get("AAPL"), Some(data));
        assert_eq!(data.recommendation().status, Status::Sell);
    }

    #[test]
    fn remove_forgets_entry() {
        let mut store = UserDataStore::new();
        store.set_unit_price(&quote("110", now()), 100.0, now());
        assert!(store.contains("AAPL"));
        assert!(store.remove("AAPL").is_some());
        assert!(store.remove("AAPL").is_none());
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }
}

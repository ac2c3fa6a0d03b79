use crate::time::earnings;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Quote snapshot as delivered by the data source. Numeric fields stay strings here; they are
/// parsed once into [`QuoteMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub code: String,
    pub previous_close: String,
    pub pe_ratio: String,
    pub eps: String,
    pub earnings_date: String,
    pub fetched_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_dividend_and_yield: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ex_dividend_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this_year_target_est: Option<String>,
}

impl QuoteSummary {
    /// Minimal snapshot with only the fields the recommendation engine reads.
    pub fn new(
        code: impl Into<String>,
        previous_close: impl Into<String>,
        pe_ratio: impl Into<String>,
        eps: impl Into<String>,
        earnings_date: impl Into<String>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            previous_close: previous_close.into(),
            pe_ratio: pe_ratio.into(),
            eps: eps.into(),
            earnings_date: earnings_date.into(),
            fetched_at,
            company_name: None,
            open: None,
            bid: None,
            ask: None,
            days_range: None,
            year_range: None,
            volume: None,
            avg_volume: None,
            market_cap: None,
            beta: None,
            forward_dividend_and_yield: None,
            ex_dividend_date: None,
            this_year_target_est: None,
        }
    }

    pub fn metrics(&self) -> QuoteMetrics {
        QuoteMetrics::from_summary(self)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.fetched_at > max_age
    }
}

/// Typed view of the fields the engine compares. Unparseable numbers are `NaN`, which makes
/// every `>`/`<` comparison false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuoteMetrics {
    pub previous_close: f64,
    pub pe_ratio: f64,
    pub eps: f64,
    pub earnings_date: Option<NaiveDate>,
}

impl QuoteMetrics {
    pub fn from_summary(quote: &QuoteSummary) -> Self {
        Self {
            previous_close: parse_field(&quote.code, "previousClose", &quote.previous_close),
            pe_ratio: parse_field(&quote.code, "peRatio", &quote.pe_ratio),
            eps: parse_field(&quote.code, "eps", &quote.eps),
            earnings_date: earnings::effective_earnings_date(&quote.earnings_date),
        }
    }
}

/// Parses a scraped decimal string, tolerating thousands separators and surrounding
/// whitespace. Returns `NaN` for anything else ("N/A", empty, garbage).
pub fn parse_lenient(raw: &str) -> f64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return f64::NAN;
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_field(code: &str, field: &'static str, raw: &str) -> f64 {
    let value = parse_lenient(raw);
    if value.is_nan() && !raw.trim().is_empty() {
        tracing::warn!(%code, field, raw, "quote field is not numeric; comparisons will be false");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn parse_lenient_accepts_plain_and_grouped_numbers() {
        assert_eq!(parse_lenient("123.45"), 123.45);
        assert_eq!(parse_lenient(" 1,234.5 "), 1234.5);
        assert_eq!(parse_lenient("-0.37"), -0.37);
    }

    #[test]
    fn parse_lenient_degrades_to_nan() {
        assert!(parse_lenient("N/A").is_nan());
        assert!(parse_lenient("").is_nan());
        assert!(parse_lenient("12abc").is_nan());
    }

    #[test]
    fn deserializes_camel_case_shape() {
        let v = json!({
            "code": "AAPL",
            "companyName": "Apple Inc. (AAPL)",
            "previousClose": "189.84",
            "peRatio": "29.45",
            "eps": "6.44",
            "earningsDate": "Jul 30, 2026 - Aug 03, 2026",
            "fetchedAt": "2026-06-01T10:00:00.000Z",
            "bid": "189.80 x 1000"
        });

        let quote: QuoteSummary = serde_json::from_value(v).unwrap();
        assert_eq!(quote.code, "AAPL");
        assert_eq!(quote.bid.as_deref(), Some("189.80 x 1000"));
        assert_eq!(quote.open, None);
        assert_eq!(
            quote.fetched_at,
            Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
        );

        let m = quote.metrics();
        assert_eq!(m.previous_close, 189.84);
        assert_eq!(m.pe_ratio, 29.45);
        assert_eq!(m.eps, 6.44);
        assert_eq!(m.earnings_date, NaiveDate::from_ymd_opt(2026, 8, 3));
    }

    #[test]
    fn staleness_uses_fetched_at() {
        let fetched = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        let quote = QuoteSummary::new("AAPL", "1", "1", "1", "", fetched);
        let hour = chrono::Duration::hours(1);
        assert!(!quote.is_stale(fetched + chrono::Duration::minutes(59), hour));
        assert!(quote.is_stale(fetched + chrono::Duration::minutes(61), hour));
    }
}

use chrono::{DateTime, Months, NaiveDate, Utc};

// Formats seen in the "Earnings Date" field: "Apr 27, 2026", "April 27, 2026", ISO dates,
// and full timestamps.
const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%Y-%m-%d", "%m/%d/%Y"];

const RANGE_SEPARATOR: &str = " - ";

/// Splits an earnings range like `"Apr 25, 2026 - Apr 29, 2026"` into its bounds.
/// The upper bound is `None` for open-ended values.
pub fn split_range(raw: &str) -> (&str, Option<&str>) {
    let mut parts = raw.splitn(2, RANGE_SEPARATOR);
    let from = parts.next().unwrap_or_default().trim();
    let to = parts.next().map(str::trim).filter(|s| !s.is_empty());
    (from, to)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// The date the blackout window is anchored on: the upper bound when present, else the lower.
pub fn effective_earnings_date(raw: &str) -> Option<NaiveDate> {
    let (from, to) = split_range(raw);
    match to {
        Some(to) => parse_date(to),
        None => parse_date(from),
    }
}

/// True when `now` falls in `[earnings_date - 1 month, earnings_date)`, both ends taken at
/// midnight UTC.
pub fn is_within_blackout(now: DateTime<Utc>, earnings_date: NaiveDate) -> bool {
    let Some(start) = earnings_date.checked_sub_months(Months::new(1)) else {
        return false;
    };
    let (Some(start), Some(end)) = (start.and_hms_opt(0, 0, 0), earnings_date.and_hms_opt(0, 0, 0))
    else {
        return false;
    };

    let now = now.naive_utc();
    start <= now && now < end
}

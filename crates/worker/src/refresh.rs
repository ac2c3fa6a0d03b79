use std::collections::HashMap;
use std::sync::Arc;
use stockfolio_core::domain::quote::QuoteSummary;
use stockfolio_core::domain::recommendation::recommend_at;
use stockfolio_core::ingest::{fetch_summaries, QuoteProvider};
use stockfolio_core::storage::{quotes, user_kv};

/// Splits `"AAPL, MSFT,,TSLA"` into trimmed, de-duplicated symbols.
pub fn parse_codes(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let code = part.trim().to_string();
        if code.is_empty() || out.contains(&code) {
            continue;
        }
        out.push(code);
    }
    out
}

/// Fetches every code (all or nothing), stores the snapshots and logs the resulting signal.
pub async fn run(
    pool: &sqlx::PgPool,
    provider: Arc<dyn QuoteProvider>,
    codes: &[String],
) -> anyhow::Result<usize> {
    let summaries = fetch_summaries(provider, codes).await?;
    quotes::insert_quote_summaries(pool, &summaries).await?;

    let mut unit_prices = HashMap::with_capacity(summaries.len());
    for s in &summaries {
        unit_prices.insert(s.code.clone(), user_kv::load_unit_price(pool, &s.code).await?);
    }

    log_recommendations(&summaries, |code| {
        unit_prices.get(code).copied().unwrap_or(0.0)
    });
    Ok(summaries.len())
}

pub fn log_recommendations<F>(summaries: &[QuoteSummary], unit_price_of: F)
where
    F: Fn(&str) -> f64,
{
    let now = chrono::Utc::now();
    for s in summaries {
        let unit_price = unit_price_of(&s.code);
        let r = recommend_at(&s.metrics(), unit_price, now);
        tracing::info!(
            code = %s.code,
            fetched_at = %s.fetched_at,
            unit_price,
            status = %r.status,
            profit_rate = r.profit_rate,
            "recommendation"
        );
    }
}

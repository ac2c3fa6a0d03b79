use crate::domain::quote::QuoteSummary;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

pub async fn insert_quote_summaries(
    pool: &sqlx::PgPool,
    summaries: &[QuoteSummary],
) -> anyhow::Result<u64> {
    if summaries.is_empty() {
        return Ok(0);
    }

    let rows = summaries
        .iter()
        .map(|s| {
            serde_json::to_value(s)
                .map(|json| (s.code.as_str(), s.fetched_at, json))
                .with_context(|| format!("serialize quote summary failed (code={})", s.code))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let t0 = std::time::Instant::now();
    let mut qb = sqlx::QueryBuilder::new("INSERT INTO quote_summaries (code, fetched_at, summary) ");
    qb.push_values(rows, |mut b, (code, fetched_at, json)| {
        b.push_bind(code).push_bind(fetched_at).push_bind(json);
    });
    qb.push(" ON CONFLICT (code, fetched_at) DO UPDATE SET summary = EXCLUDED.summary");

    let res = qb
        .build()
        .persistent(false)
        .execute(&mut *tx)
        .await
        .context("insert quote_summaries failed")?;

    tx.commit().await.context("commit transaction failed")?;

    tracing::debug!(
        rows = res.rows_affected(),
        elapsed_ms = t0.elapsed().as_millis(),
        "quote_summaries insert"
    );
    Ok(res.rows_affected())
}

/// Newest stored snapshot per code. Codes without any snapshot are absent from the result.
pub async fn latest_quote_summaries(
    pool: &sqlx::PgPool,
    codes: &[String],
) -> anyhow::Result<Vec<QuoteSummary>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<(String, Value)> = sqlx::query_as(
        "SELECT DISTINCT ON (code) code, summary \
         FROM quote_summaries \
         WHERE code = ANY($1) \
         ORDER BY code, fetched_at DESC",
    )
    .persistent(false)
    .bind(codes)
    .fetch_all(pool)
    .await
    .context("select latest quote_summaries failed")?;

    let mut out = Vec::with_capacity(rows.len());
    for (code, summary) in rows {
        let parsed = serde_json::from_value::<QuoteSummary>(summary)
            .with_context(|| format!("stored quote summary has unexpected shape (code={code})"))?;
        out.push(parsed);
    }
    Ok(out)
}

pub async fn record_refresh_run(
    pool: &sqlx::PgPool,
    started_at: DateTime<Utc>,
    provider: &str,
    codes: &[String],
    fetched: usize,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let status = if error.is_some() { "error" } else { "success" };
    let fetched = i32::try_from(fetched).context("fetched count overflows i32")?;

    sqlx::query(
        "INSERT INTO quote_refresh_runs (id, started_at, provider, status, codes, fetched, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .persistent(false)
    .bind(id)
    .bind(started_at)
    .bind(provider)
    .bind(status)
    .bind(codes)
    .bind(fetched)
    .bind(error)
    .execute(pool)
    .await
    .context("insert quote_refresh_runs failed")?;

    Ok(id)
}

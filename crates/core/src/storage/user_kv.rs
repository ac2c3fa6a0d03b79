use crate::domain::portfolio::Portfolio;
use crate::domain::quote::parse_lenient;
use anyhow::Context;

// Key names match what the dashboard client wrote to local storage.
pub const PORTFOLIO_KEY: &str = "_userPortfolio";

pub fn unit_price_key(code: &str) -> String {
    format!("_{code}unitPrice")
}

/// Missing, unparseable or negative values count as "not purchased".
pub fn parse_unit_price(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let value = parse_lenient(raw);
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        tracing::warn!(raw, "stored unit price is invalid; treating as 0");
        0.0
    }
}

pub async fn get_value(pool: &sqlx::PgPool, key: &str) -> anyhow::Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM user_kv WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("select user_kv failed (key={key})"))?;
    Ok(value)
}

pub async fn put_value(pool: &sqlx::PgPool, key: &str, value: &str) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO user_kv (key, value, updated_at) VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("upsert user_kv failed (key={key})"))?;
    Ok(())
}

pub async fn delete_value(pool: &sqlx::PgPool, key: &str) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM user_kv WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("delete user_kv failed (key={key})"))?;
    Ok(())
}

pub async fn load_portfolio(pool: &sqlx::PgPool) -> anyhow::Result<Portfolio> {
    let raw = get_value(pool, PORTFOLIO_KEY).await?;
    Ok(Portfolio::from_persisted_json(raw.as_deref()))
}

pub async fn save_portfolio(pool: &sqlx::PgPool, portfolio: &Portfolio) -> anyhow::Result<()> {
    let raw = portfolio.to_persisted_json()?;
    put_value(pool, PORTFOLIO_KEY, &raw).await
}

pub async fn load_unit_price(pool: &sqlx::PgPool, code: &str) -> anyhow::Result<f64> {
    let raw = get_value(pool, &unit_price_key(code)).await?;
    Ok(parse_unit_price(raw.as_deref()))
}

pub async fn save_unit_price(pool: &sqlx::PgPool, code: &str, unit_price: f64) -> anyhow::Result<()> {
    anyhow::ensure!(
        unit_price.is_finite() && unit_price >= 0.0,
        "unit price must be a non-negative number (got {unit_price})"
    );
    put_value(pool, &unit_price_key(code), &unit_price.to_string()).await
}

pub async fn delete_unit_price(pool: &sqlx::PgPool, code: &str) -> anyhow::Result<()> {
    delete_value(pool, &unit_price_key(code)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_price_key_is_namespaced_by_code() {
        assert_eq!(unit_price_key("AAPL"), "_AAPLunitPrice");
        assert_eq!(unit_price_key("005930.KS"), "_005930.KSunitPrice");
    }

    #[test]
    fn parse_unit_price_defaults_to_zero() {
        assert_eq!(parse_unit_price(None), 0.0);
        assert_eq!(parse_unit_price(Some("")), 0.0);
        assert_eq!(parse_unit_price(Some("abc")), 0.0);
        assert_eq!(parse_unit_price(Some("-5")), 0.0);
        assert_eq!(parse_unit_price(Some("123.456")), 123.456);
    }
}

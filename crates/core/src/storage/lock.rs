use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks are scoped to the Postgres session. Used as a best-effort guard against two
// refresh runs fetching the same hour's quotes.
const LOCK_NAMESPACE: i64 = 0x5354_4B46_4F4C; // "STKFOL"

pub fn refresh_hour_bucket(now: DateTime<Utc>) -> i64 {
    now.timestamp().div_euclid(3600)
}

fn lock_key_for_bucket(bucket: i64) -> i64 {
    LOCK_NAMESPACE ^ bucket
}

/// A held refresh lock. Owns the session that took the lock so the unlock runs on it too.
#[derive(Debug)]
pub struct RefreshLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl RefreshLock {
    /// `None` when another session already holds the lock for `bucket`.
    pub async fn try_acquire(pool: &sqlx::PgPool, bucket: i64) -> anyhow::Result<Option<Self>> {
        let key = lock_key_for_bucket(bucket);
        let mut conn = pool
            .acquire()
            .await
            .context("failed to check out a connection for the advisory lock")?;

        let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;

        Ok(acquired.0.then_some(Self { conn, key }))
    }

    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key;
        let released: (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (key={key})"))?;
        anyhow::ensure!(released.0, "advisory lock was not held (key={key})");
        Ok(())
    }
}

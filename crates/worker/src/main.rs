use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stockfolio_core::ingest::{HttpJsonQuoteProvider, QuoteProvider};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod refresh;

#[derive(Debug, Parser)]
#[command(name = "stockfolio_worker")]
struct Args {
    /// Comma-separated symbols to refresh. Defaults to the persisted portfolio.
    #[arg(long)]
    codes: Option<String>,

    /// Fetch and log recommendations without touching the database. Requires --codes.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockfolio_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let cli_codes = args.codes.as_deref().map(refresh::parse_codes);

    let provider: Arc<dyn QuoteProvider> = Arc::new(HttpJsonQuoteProvider::from_settings(&settings)?);

    if args.dry_run {
        let codes = cli_codes.context("--codes is required with --dry-run")?;
        let summaries = stockfolio_core::ingest::fetch_summaries(provider, &codes).await?;
        refresh::log_recommendations(&summaries, |_| 0.0);
        tracing::info!(dry_run = true, fetched = summaries.len(), "quote refresh finished");
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockfolio_core::storage::migrate(&pool).await?;

    let codes = match cli_codes {
        Some(codes) => codes,
        None => stockfolio_core::storage::user_kv::load_portfolio(&pool)
            .await?
            .codes()
            .to_vec(),
    };
    if codes.is_empty() {
        tracing::info!("portfolio is empty; nothing to refresh");
        return Ok(());
    }

    let started_at = chrono::Utc::now();
    let bucket = stockfolio_core::storage::lock::refresh_hour_bucket(started_at);
    let Some(lock) = stockfolio_core::storage::lock::RefreshLock::try_acquire(&pool, bucket).await?
    else {
        tracing::warn!(bucket, "refresh lock not acquired; another run in progress");
        return Ok(());
    };

    let result = refresh::run(&pool, Arc::clone(&provider), &codes).await;
    let provider_name = provider.provider_name();

    match result {
        Ok(fetched) => {
            let run_id = stockfolio_core::storage::quotes::record_refresh_run(
                &pool,
                started_at,
                provider_name,
                &codes,
                fetched,
                None,
            )
            .await?;
            tracing::info!(%run_id, fetched, "persisted quote snapshots");
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            let run_id = stockfolio_core::storage::quotes::record_refresh_run(
                &pool,
                started_at,
                provider_name,
                &codes,
                0,
                Some(&format!("{:#}", err)),
            )
            .await?;
            tracing::error!(%run_id, error = %err, "quote refresh failed");
        }
    }

    if let Err(err) = lock.release().await {
        tracing::warn!(bucket, error = %err, "failed to release refresh lock");
    }
    Ok(())
}

fn init_sentry(settings: &stockfolio_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

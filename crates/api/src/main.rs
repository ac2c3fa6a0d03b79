use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockfolio_core::domain::user_data::UserDataStore;
use stockfolio_core::ingest::types::StockSearch;
use stockfolio_core::ingest::{HttpJsonQuoteProvider, QuoteProvider};

mod portfolio;

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

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match stockfolio_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let provider: Option<Arc<dyn QuoteProvider>> =
        match HttpJsonQuoteProvider::from_settings(&settings) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                tracing::error!(error = %e, "quote provider unavailable; serving stored quotes only");
                None
            }
        };

    let state = AppState {
        pool,
        provider,
        store: Arc::new(Mutex::new(UserDataStore::new())),
        edit_lock: Arc::new(Mutex::new(())),
        quote_max_age: settings.quote_max_age(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/search", get(search))
        .route("/portfolio", get(portfolio::get_portfolio))
        .route("/portfolio/symbols", post(portfolio::add_symbol))
        .route("/portfolio/symbols/:code", delete(portfolio::remove_symbol))
        .route(
            "/portfolio/symbols/:code/unit-price",
            put(portfolio::set_unit_price),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: Option<PgPool>,
    pub(crate) provider: Option<Arc<dyn QuoteProvider>>,
    pub(crate) store: Arc<Mutex<UserDataStore>>,
    // Serializes read-modify-write of the persisted symbol list.
    pub(crate) edit_lock: Arc<Mutex<()>>,
    pub(crate) quote_max_age: chrono::Duration,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorBody>);

pub(crate) fn reject(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %format!("{err:#}"), "request failed");
    reject(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<StockSearch>, ApiError> {
    let q = params.q.trim();
    if q.is_empty() {
        return Ok(Json(StockSearch::default()));
    }

    let Some(provider) = &state.provider else {
        return Err(reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "quote provider is not configured",
        ));
    };

    let res = provider.search(q).await.map_err(internal)?;
    Ok(Json(res))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

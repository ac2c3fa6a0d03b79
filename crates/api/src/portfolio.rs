use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use stockfolio_core::domain::format::{format_number, format_profit_rate};
use stockfolio_core::domain::portfolio::MembershipError;
use stockfolio_core::domain::quote::QuoteSummary;
use stockfolio_core::domain::recommendation::Status;
use stockfolio_core::domain::user_data::UserData;
use stockfolio_core::ingest::{fetch_summaries, refresh};
use stockfolio_core::storage::{quotes, user_kv};

use crate::{internal, reject, ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PortfolioRow {
    #[serde(flatten)]
    quote: QuoteSummary,
    user_data: RowUserData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RowUserData {
    unit_price: f64,
    unit_price_text: String,
    status: Status,
    tag_color: Option<&'static str>,
    profit_rate: f64,
    profit_rate_text: String,
}

impl PortfolioRow {
    fn new(quote: QuoteSummary, data: UserData) -> Self {
        Self {
            quote,
            user_data: RowUserData {
                unit_price: data.unit_price,
                unit_price_text: format!("$ {}", format_number(data.unit_price)),
                status: data.status,
                tag_color: data.status.tag_color(),
                profit_rate: data.profit_rate,
                profit_rate_text: format_profit_rate(data.profit_rate),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PortfolioCodes {
    codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddSymbolRequest {
    code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnitPriceRequest {
    unit_price: f64,
}

pub(crate) async fn get_portfolio(
    State(state): State<AppState>,
) -> Result<Json<Vec<PortfolioRow>>, ApiError> {
    let pool = require_pool(&state)?;

    let portfolio = user_kv::load_portfolio(pool).await.map_err(internal)?;
    let summaries = resolve_quotes(&state, pool, portfolio.codes()).await?;
    let rows = build_rows(&state, pool, summaries).await.map_err(internal)?;

    Ok(Json(rows))
}

pub(crate) async fn add_symbol(
    State(state): State<AppState>,
    Json(req): Json<AddSymbolRequest>,
) -> Result<(StatusCode, Json<PortfolioCodes>), ApiError> {
    let _guard = state.edit_lock.lock().await;
    let pool = require_pool(&state)?;

    let mut portfolio = user_kv::load_portfolio(pool).await.map_err(internal)?;
    portfolio
        .add_symbol(&req.code)
        .map_err(|e| reject(membership_status(&e), e.to_string()))?;
    user_kv::save_portfolio(pool, &portfolio)
        .await
        .map_err(internal)?;

    tracing::info!(code = %req.code.trim(), size = portfolio.len(), "symbol added");

    Ok((
        StatusCode::CREATED,
        Json(PortfolioCodes {
            codes: portfolio.codes().to_vec(),
        }),
    ))
}

pub(crate) async fn remove_symbol(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PortfolioCodes>, ApiError> {
    let _guard = state.edit_lock.lock().await;
    let pool = require_pool(&state)?;

    let mut portfolio = user_kv::load_portfolio(pool).await.map_err(internal)?;
    if portfolio.remove_symbol(&code) {
        user_kv::save_portfolio(pool, &portfolio)
            .await
            .map_err(internal)?;
        tracing::info!(%code, size = portfolio.len(), "symbol removed");
    }
    user_kv::delete_unit_price(pool, code.trim())
        .await
        .map_err(internal)?;
    state.store.lock().await.remove(code.trim());

    Ok(Json(PortfolioCodes {
        codes: portfolio.codes().to_vec(),
    }))
}

pub(crate) async fn set_unit_price(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(req): Json<UnitPriceRequest>,
) -> Result<Json<PortfolioRow>, ApiError> {
    // Held until the cache is updated so a concurrent removal can't resurrect the price.
    let _guard = state.edit_lock.lock().await;
    let pool = require_pool(&state)?;
    validate_unit_price(req.unit_price)?;

    let portfolio = user_kv::load_portfolio(pool).await.map_err(internal)?;
    if !portfolio.contains(&code) {
        return Err(reject(
            StatusCode::NOT_FOUND,
            format!("{code} is not in your portfolio"),
        ));
    }

    user_kv::save_unit_price(pool, &code, req.unit_price)
        .await
        .map_err(internal)?;

    let codes = [code.clone()];
    let quote = resolve_quotes(&state, pool, &codes)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            reject(
                StatusCode::BAD_GATEWAY,
                format!("no quote summary available for {code}"),
            )
        })?;

    let data = state
        .store
        .lock()
        .await
        .set_unit_price(&quote, req.unit_price, Utc::now());

    tracing::info!(%code, unit_price = req.unit_price, status = %data.status, "unit price updated");

    Ok(Json(PortfolioRow::new(quote, data)))
}

fn require_pool(state: &AppState) -> Result<&PgPool, ApiError> {
    state.pool.as_ref().ok_or_else(|| {
        reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "database is not available",
        )
    })
}

fn membership_status(err: &MembershipError) -> StatusCode {
    match err {
        MembershipError::EmptySymbol => StatusCode::BAD_REQUEST,
        MembershipError::DuplicateSymbol(_) => StatusCode::CONFLICT,
        MembershipError::PortfolioFull { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn validate_unit_price(unit_price: f64) -> Result<(), ApiError> {
    if unit_price.is_finite() && unit_price >= 0.0 {
        Ok(())
    } else {
        Err(reject(
            StatusCode::BAD_REQUEST,
            "unit price must be a non-negative number",
        ))
    }
}

/// Stored snapshots that are fresh enough, topped up with a live fetch for the rest. A failed
/// fetch fails the request; there are no partial results.
async fn resolve_quotes(
    state: &AppState,
    pool: &PgPool,
    codes: &[String],
) -> Result<Vec<QuoteSummary>, ApiError> {
    let now = Utc::now();
    let stored = quotes::latest_quote_summaries(pool, codes)
        .await
        .map_err(internal)?;
    let missing = refresh::codes_needing_fetch(codes, &stored, now, state.quote_max_age);

    let fetched = if missing.is_empty() {
        Vec::new()
    } else if let Some(provider) = &state.provider {
        let fetched = fetch_summaries(Arc::clone(provider), &missing)
            .await
            .map_err(|e| {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %format!("{e:#}"), "quote fetch failed");
                reject(StatusCode::BAD_GATEWAY, "quote provider request failed")
            })?;
        quotes::insert_quote_summaries(pool, &fetched)
            .await
            .map_err(internal)?;
        fetched
    } else {
        tracing::warn!(missing = missing.len(), "no quote provider; using stored snapshots");
        Vec::new()
    };

    Ok(refresh::merge_in_order(codes, stored, fetched))
}

async fn build_rows(
    state: &AppState,
    pool: &PgPool,
    summaries: Vec<QuoteSummary>,
) -> anyhow::Result<Vec<PortfolioRow>> {
    let uncached: Vec<String> = {
        let store = state.store.lock().await;
        summaries
            .iter()
            .filter(|q| !store.contains(&q.code))
            .map(|q| q.code.clone())
            .collect()
    };

    let mut persisted = HashMap::with_capacity(uncached.len());
    for code in uncached {
        let unit_price = user_kv::load_unit_price(pool, &code).await?;
        persisted.insert(code, unit_price);
    }

    let now = Utc::now();
    let mut store = state.store.lock().await;
    let rows = summaries
        .into_iter()
        .map(|quote| {
            let data = store.get_or_init(&quote, now, || {
                persisted.get(&quote.code).copied().unwrap_or(0.0)
            });
            PortfolioRow::new(quote, data)
        })
        .collect();
    Ok(rows)
}

//! Market endpoints: listing, detail, creation and settlement

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde_json::json;
use staking_core::{MarketFilter, NewMarket, SettlementRequest};
use tracing::info;

use crate::auth::Operator;
use crate::error::{ApiError, JsonBody};
use crate::AppState;

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/markets", get(list_markets).post(create_market))
        .route("/markets/{id}", get(get_market))
        .route("/markets/{id}/settle", put(settle_market))
}

/// List markets with their stats, optionally filtered by `active` / `trending`
async fn list_markets(
    State(state): State<AppState>,
    Query(filter): Query<MarketFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let markets = state.market_service.list_markets(filter)?;
    info!("Returning {} markets", markets.len());
    Ok(Json(json!({
        "success": true,
        "message": "Markets fetched successfully",
        "data": markets,
    })))
}

async fn create_market(
    State(state): State<AppState>,
    _operator: Operator,
    JsonBody(request): JsonBody<NewMarket>,
) -> Result<impl IntoResponse, ApiError> {
    let market = state.market_service.create_market(request)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Market created successfully",
            "data": market,
        })),
    ))
}

/// Single market with its aggregate stats
async fn get_market(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let market = state.market_service.get_market(&id)?;
    Ok(Json(json!({
        "success": true,
        "message": "Market fetched successfully",
        "data": market,
    })))
}

/// Operator settlement with `{ "winningChoice": "yes" | "no" }`
async fn settle_market(
    State(state): State<AppState>,
    _operator: Operator,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<SettlementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let winning_choice = request.validate()?;
    let report = state.settlement.settle(&id, winning_choice)?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Market settled. Winning choice: {}", report.winning_choice),
        "data": report,
    })))
}

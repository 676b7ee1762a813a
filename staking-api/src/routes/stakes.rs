//! Stake endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use staking_core::{StakeError, StakeFilter, StakeRequest};

use crate::error::{ApiError, JsonBody};
use crate::AppState;

/// Query parameters carrying a wallet address
#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    pub address: Option<String>,
}

/// Create stake routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stakes", get(list_stakes).post(place_stake))
        .route("/stakes/{market_id}", get(stake_for_wallet))
}

/// Place a stake through the admission gate
async fn place_stake(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<StakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let stake = state.admission.place_stake(request)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Stake created successfully",
            "stake": stake,
        })),
    ))
}

async fn list_stakes(
    State(state): State<AppState>,
    Query(filter): Query<StakeFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let stakes = state.user_service.list_stakes(&filter)?;
    Ok(Json(json!({ "success": true, "stakes": stakes })))
}

/// Whether the wallet in `?address=` holds a stake on this market
async fn stake_for_wallet(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
    Query(query): Query<WalletQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let address = query
        .address
        .ok_or_else(|| StakeError::validation("Wallet address is required"))?;
    let status = state.user_service.stake_for_wallet(&market_id, &address)?;

    let message = if status.registered {
        "Stake status fetched"
    } else {
        "User not registered"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "hasStaked": status.has_staked,
        "stake": status.stake,
    })))
}

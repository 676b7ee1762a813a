//! User endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use staking_core::{NewUser, StakeError};

use crate::error::{ApiError, JsonBody};
use crate::routes::stakes::WalletQuery;
use crate::AppState;

/// Body of a wallet connection
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectRequest {
    pub wallet_address: Option<String>,
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(find_user).post(create_user))
        .route("/users/connect", post(connect_wallet))
        .route("/users/{id}/positions", get(positions))
}

async fn find_user(
    State(state): State<AppState>,
    Query(query): Query<WalletQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let address = query
        .address
        .ok_or_else(|| StakeError::validation("Wallet address is required"))?;
    let user = state.user_service.find_by_wallet(&address)?;
    Ok(Json(json!({
        "success": true,
        "message": "User found",
        "data": { "id": user.id },
    })))
}

async fn create_user(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.create_user(request)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "data": user,
        })),
    ))
}

/// Get-or-create the user behind a connected wallet
async fn connect_wallet(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ConnectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = request
        .wallet_address
        .ok_or_else(|| StakeError::validation("Wallet address is required"))?;
    let (user, created) = state.user_service.get_or_create_by_wallet(&address)?;

    let (status, message) = if created {
        (StatusCode::CREATED, "User created successfully")
    } else {
        (StatusCode::OK, "User found")
    };
    Ok((
        status,
        Json(json!({
            "success": true,
            "message": message,
            "data": user,
        })),
    ))
}

async fn positions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let portfolio = state.user_service.portfolio(&id)?;
    Ok(Json(json!({ "success": true, "data": portfolio })))
}

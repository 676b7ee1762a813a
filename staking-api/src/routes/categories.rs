//! Category endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use staking_core::NewCategory;

use crate::auth::Operator;
use crate::error::{ApiError, JsonBody};
use crate::AppState;

/// Create category routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories).post(create_category))
}

async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state.market_service.list_categories()?;
    Ok(Json(json!({
        "success": true,
        "message": "Categories fetched successfully",
        "data": categories,
    })))
}

async fn create_category(
    State(state): State<AppState>,
    _operator: Operator,
    JsonBody(request): JsonBody<NewCategory>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.market_service.create_category(request)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Category created successfully",
            "data": category,
        })),
    ))
}

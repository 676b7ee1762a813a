//! API route definitions

mod categories;
mod health;
mod markets;
mod stakes;
mod users;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(markets::routes())
        .merge(stakes::routes())
        .merge(users::routes())
        .merge(categories::routes())
        .merge(health::routes())
}

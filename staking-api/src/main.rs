//! Prediction Market Staking API Server
//!
//! HTTP API over the staking ledger: markets, users, stake placement and
//! operator settlement.

mod auth;
mod config;
mod error;
mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use staking_services::{
    AdmissionPolicy, MarketService, SettlementEngine, StakeAdmission, StakeAggregator,
    StakeStorage, UserService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::auth::OperatorAuth;
use crate::config::ApiConfig;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StakeStorage>,
    pub admission: Arc<StakeAdmission>,
    pub settlement: Arc<SettlementEngine>,
    pub market_service: Arc<MarketService>,
    pub user_service: Arc<UserService>,
    pub operator: Arc<OperatorAuth>,
}

impl AppState {
    pub fn new(
        storage: Arc<StakeStorage>,
        policy: AdmissionPolicy,
        operator_token: Option<String>,
    ) -> Self {
        let aggregator = Arc::new(StakeAggregator::new(storage.clone()));
        Self {
            admission: Arc::new(StakeAdmission::new(storage.clone(), policy)),
            settlement: Arc::new(SettlementEngine::new(storage.clone())),
            market_service: Arc::new(MarketService::new(storage.clone(), aggregator.clone())),
            user_service: Arc::new(UserService::new(storage.clone(), aggregator)),
            operator: Arc::new(OperatorAuth::new(operator_token)),
            storage,
        }
    }
}

/// Build the router with every route and layer attached
pub fn app(state: AppState) -> Router {
    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,staking_api=debug,staking_services=debug,tower_http=info")
        }))
        .init();

    info!("Starting Prediction Market Staking API");

    let config = ApiConfig::from_env()?;

    if !config.enforce_stake_bounds {
        info!("Stake bounds enforcement disabled");
    }

    info!("Initializing stake storage at: {}", config.db_path.display());
    let storage = Arc::new(StakeStorage::new(&config.db_path)?);

    let policy = AdmissionPolicy {
        enforce_stake_bounds: config.enforce_stake_bounds,
    };
    let state = AppState::new(storage, policy, config.operator_token.clone());
    if !state.operator.is_configured() {
        warn!("OPERATOR_TOKEN not set - operator routes will reject every request");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

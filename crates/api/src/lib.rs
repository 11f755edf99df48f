mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{Exchange, KalshiEnv};
use engine::{DecisionLog, StrategyRegistry};
use exchange::{ApiStats, MarketCache};
use strategy::StrategyCatalog;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub registry: StrategyRegistry,
    pub decisions: DecisionLog,
    pub exchange: Arc<dyn Exchange>,
    pub market_cache: Arc<MarketCache>,
    pub stats: Arc<ApiStats>,
    pub catalog: Arc<StrategyCatalog>,
    pub kalshi_env: KalshiEnv,
    pub dashboard_token: String,
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "Dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind API listener on {addr}: {e}"));
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("API server failed: {e}"));
}

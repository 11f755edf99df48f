use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, Exchange};
use engine::{DecisionLog, PortfolioSnapshotter, Scheduler, StrategyRegistry};
use exchange::{ApiStats, KalshiAuth, KalshiClient, MarketCache};
use strategy::{StrategyCatalog, StrategyContext};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(env = %cfg.kalshi_env, "KalBot starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to connect to database: {e}"));
    sqlx::migrate!("../../migrations")
        .run(&db)
        .await
        .unwrap_or_else(|e| panic!("Database migration failed: {e}"));
    info!("Database ready");

    // ── Exchange client ───────────────────────────────────────────────────────
    let auth = KalshiAuth::new(&cfg.kalshi_api_key_id, &cfg.kalshi_private_key)
        .unwrap_or_else(|e| panic!("Kalshi credentials invalid: {e}"));
    let stats = Arc::new(ApiStats::new());
    let client = KalshiClient::new(cfg.kalshi_env.base_url(), auth, stats.clone())
        .unwrap_or_else(|e| panic!("Failed to build Kalshi client: {e}"));
    let exchange_client: Arc<dyn Exchange> = Arc::new(client);

    // ── Shared state ──────────────────────────────────────────────────────────
    let market_cache = Arc::new(MarketCache::new());
    let catalog = Arc::new(StrategyCatalog::builtin());
    let registry = StrategyRegistry::new(db.clone());
    let decisions = DecisionLog::new(db.clone());

    registry
        .seed_builtin(&catalog)
        .await
        .unwrap_or_else(|e| panic!("Failed to seed strategy registry: {e}"));

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let cx = StrategyContext {
        exchange: exchange_client.clone(),
        market_cache: market_cache.clone(),
    };
    let scheduler = Scheduler::new(
        registry.clone(),
        decisions.clone(),
        catalog.clone(),
        cx,
        Duration::from_secs(cfg.reconcile_interval_secs),
    );
    tokio::spawn(scheduler.run());

    // ── Portfolio snapshotter ─────────────────────────────────────────────────
    let snapshotter = PortfolioSnapshotter::new(
        exchange_client.clone(),
        db.clone(),
        Duration::from_secs(cfg.snapshot_interval_secs),
    );
    tokio::spawn(snapshotter.run());

    // ── Dashboard API (blocks until shutdown) ─────────────────────────────────
    let state = api::AppState {
        db,
        registry,
        decisions,
        exchange: exchange_client,
        market_cache,
        stats,
        catalog,
        kalshi_env: cfg.kalshi_env,
        dashboard_token: cfg.dashboard_token.clone(),
    };
    api::serve(state, cfg.dashboard_port).await;
}

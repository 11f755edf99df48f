use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use common::{Error, NewStrategy, SignalAction, StrategyPatch};

use crate::{auth::require_auth, AppState};

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/strategies", get(list_strategies).post(create_strategy))
        .route("/api/strategies/:name", patch(update_strategy))
        .route("/api/decisions", get(list_decisions))
        .route("/api/decisions/stats", get(decision_stats))
        .route("/api/markets/:series", get(list_markets))
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/portfolio/history", get(portfolio_history))
        .route("/api/market-state", get(market_state))
        .route("/api/api-stats", get(api_stats))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn error_status(e: &Error) -> StatusCode {
    match e {
        Error::DuplicateName(_) => StatusCode::CONFLICT,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Exchange { .. } | Error::Http(_) | Error::Auth(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_json(e: Error) -> (StatusCode, Json<Value>) {
    let status = error_status(&e);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        warn!(error = %e, "API request failed");
    }
    (status, Json(json!({ "error": e.to_string() })))
}

// ─── Strategies ───────────────────────────────────────────────────────────────

async fn list_strategies(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let rows = state.registry.list().await.map_err(error_json)?;
    let out: Vec<Value> = rows
        .iter()
        .map(|r| {
            let spec = state.catalog.get(&r.name);
            json!({
                "id": r.id,
                "name": r.name,
                "description": r.description,
                "enabled": r.enabled,
                "config": r.config,
                "bound": spec.is_some(),
                "poll_interval_seconds": spec.map(|s| s.poll_interval_secs),
                "created_at": r.created_at,
                "updated_at": r.updated_at,
            })
        })
        .collect();
    Ok(Json(json!({ "strategies": out })))
}

async fn create_strategy(
    State(state): State<AppState>,
    Json(body): Json<NewStrategy>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let record = state.registry.create(body).await.map_err(error_json)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "id": record.id })),
    ))
}

async fn update_strategy(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<StrategyPatch>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let record = state
        .registry
        .update(&name, body)
        .await
        .map_err(error_json)?;
    Ok(Json(json!({
        "ok": true,
        "name": record.name,
        "enabled": record.enabled,
        "config": record.config,
    })))
}

// ─── Decisions ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct DecisionsQuery {
    limit: Option<i64>,
    action: Option<String>,
}

fn parse_action(raw: &str) -> Result<SignalAction, (StatusCode, Json<Value>)> {
    match raw {
        "buy" => Ok(SignalAction::Buy),
        "skip" => Ok(SignalAction::Skip),
        "error" => Ok(SignalAction::Error),
        other => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("unknown action '{other}'") })),
        )),
    }
}

async fn list_decisions(
    State(state): State<AppState>,
    Query(q): Query<DecisionsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let limit = q.limit.unwrap_or(100).clamp(1, 500);
    let action = q.action.as_deref().map(parse_action).transpose()?;

    let rows = state
        .decisions
        .recent(limit, action)
        .await
        .map_err(error_json)?;
    let out: Vec<Value> = rows
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "strategy_id": d.strategy_id,
                "market_ticker": d.market_ticker,
                "side": d.side,
                "action": d.action,
                "reason": d.reason,
                "contract_price": d.contract_price,
                "seconds_remaining": d.seconds_remaining,
                "portfolio_cash": d.portfolio_cash,
                "position_size": d.position_size,
                "contracts": d.contracts,
                "order_id": d.order_id,
                "params": serde_json::from_str::<Value>(&d.params).unwrap_or(Value::Null),
                "created_at": d.created_at,
            })
        })
        .collect();
    Ok(Json(json!({ "decisions": out, "limit": limit })))
}

#[derive(Deserialize)]
struct StatsQuery {
    window: Option<i64>,
}

async fn decision_stats(
    State(state): State<AppState>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let window = q.window.unwrap_or(1000).clamp(1, 10_000);
    let counts = state
        .decisions
        .counts_by_action(window)
        .await
        .map_err(error_json)?;
    Ok(Json(json!(counts)))
}

// ─── Markets ──────────────────────────────────────────────────────────────────

/// Open markets in a series, proxied live from the exchange.
async fn list_markets(
    State(state): State<AppState>,
    Path(series): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let markets = state
        .exchange
        .markets(&series, "open")
        .await
        .map_err(error_json)?;
    Ok(Json(json!({ "markets": markets })))
}

// ─── Portfolio ────────────────────────────────────────────────────────────────

async fn get_portfolio(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    // Live balance + positions straight from the exchange.
    let balance = state.exchange.balance().await.map_err(error_json)?;
    let positions = state.exchange.positions().await.map_err(error_json)?;
    Ok(Json(json!({ "balance": balance, "positions": positions })))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn portfolio_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let limit = q.limit.unwrap_or(120).clamp(1, 1000);
    let rows = engine::snapshot::history(&state.db, limit)
        .await
        .map_err(error_json)?;
    Ok(Json(json!({ "snapshots": rows })))
}

// ─── Observability ────────────────────────────────────────────────────────────

/// Last observed market snapshot from the active strategy poll.
async fn market_state(State(state): State<AppState>) -> Json<Value> {
    match state.market_cache.current().await {
        Some(snapshot) => Json(json!(snapshot)),
        None => Json(Value::Null),
    }
}

/// Exchange call counts, error rates and latency per endpoint.
async fn api_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "totals": state.stats.totals(),
        "endpoints": state.stats.summary(),
    }))
}

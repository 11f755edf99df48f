use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;

use common::{DecisionRow, NewDecision, Result, SignalAction};

/// Append-only log of every evaluation outcome.
///
/// Exactly one row is written per completed evaluation cycle, whatever the
/// action. Rows are never mutated or deleted by the core; a write failure is
/// surfaced to the caller, since an unlogged decision is worse than a skipped
/// trade.
#[derive(Clone)]
pub struct DecisionLog {
    db: SqlitePool,
}

impl DecisionLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append one decision and return its id.
    pub async fn append(&self, decision: &NewDecision) -> Result<i64> {
        let side = decision
            .side
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let params = serde_json::to_string(&decision.params)?;

        let result = sqlx::query(
            "INSERT INTO decisions
               (strategy_id, market_ticker, side, action, reason, contract_price,
                seconds_remaining, portfolio_cash, position_size, contracts,
                order_id, params, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(decision.strategy_id)
        .bind(&decision.market_ticker)
        .bind(&side)
        .bind(decision.action)
        .bind(&decision.reason)
        .bind(decision.contract_price)
        .bind(decision.seconds_remaining)
        .bind(decision.portfolio_cash)
        .bind(decision.position_size)
        .bind(decision.contracts)
        .bind(&decision.order_id)
        .bind(&params)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent decisions, newest first, optionally filtered by action.
    pub async fn recent(
        &self,
        limit: i64,
        action: Option<SignalAction>,
    ) -> Result<Vec<DecisionRow>> {
        let rows = if let Some(action) = action {
            sqlx::query_as::<_, DecisionRow>(
                "SELECT id, strategy_id, market_ticker, side, action, reason,
                        contract_price, seconds_remaining, portfolio_cash,
                        position_size, contracts, order_id, params, created_at
                 FROM decisions WHERE action = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )
            .bind(action)
            .bind(limit)
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query_as::<_, DecisionRow>(
                "SELECT id, strategy_id, market_ticker, side, action, reason,
                        contract_price, seconds_remaining, portfolio_cash,
                        position_size, contracts, order_id, params, created_at
                 FROM decisions ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .bind(limit)
            .fetch_all(&self.db)
            .await?
        };
        Ok(rows)
    }

    /// Count decisions by action over the most recent `window` rows.
    pub async fn counts_by_action(&self, window: i64) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT action, COUNT(*) FROM
               (SELECT action FROM decisions ORDER BY created_at DESC, id DESC LIMIT ?1)
             GROUP BY action",
        )
        .bind(window)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MarketSide;

    async fn test_db() -> SqlitePool {
        // One connection: a pooled in-memory database is per-connection.
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&db).await.unwrap();
        // Parent row for the fixture's strategy_id = 1 (decisions.strategy_id
        // references strategies.id).
        sqlx::query(
            "INSERT INTO strategies (id, name, created_at, updated_at)
             VALUES (1, 'test', ?1, ?1)",
        )
        .bind(Utc::now())
        .execute(&db)
        .await
        .unwrap();
        db
    }

    fn decision(action: SignalAction, side: Option<MarketSide>) -> NewDecision {
        NewDecision {
            strategy_id: 1,
            market_ticker: "KXBTC-TEST".into(),
            side,
            action,
            reason: "test".into(),
            contract_price: Some(0.92),
            seconds_remaining: Some(45),
            portfolio_cash: Some(1000.0),
            position_size: Some(49.68),
            contracts: Some(54),
            order_id: None,
            params: serde_json::json!({"price_cents": 92}),
        }
    }

    #[tokio::test]
    async fn append_returns_increasing_ids() {
        let log = DecisionLog::new(test_db().await);
        let a = log
            .append(&decision(SignalAction::Skip, None))
            .await
            .unwrap();
        let b = log
            .append(&decision(SignalAction::Buy, Some(MarketSide::Yes)))
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn recent_filters_by_action_and_orders_by_recency() {
        let log = DecisionLog::new(test_db().await);
        log.append(&decision(SignalAction::Skip, None)).await.unwrap();
        log.append(&decision(SignalAction::Buy, Some(MarketSide::Yes)))
            .await
            .unwrap();
        log.append(&decision(SignalAction::Error, None)).await.unwrap();

        let all = log.recent(10, None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].action, SignalAction::Error);

        let buys = log.recent(10, Some(SignalAction::Buy)).await.unwrap();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].side, "yes");

        let skips = log.recent(10, Some(SignalAction::Skip)).await.unwrap();
        assert_eq!(skips[0].side, "unknown");
    }

    #[tokio::test]
    async fn counts_group_by_action_over_recent_window() {
        let log = DecisionLog::new(test_db().await);
        for _ in 0..3 {
            log.append(&decision(SignalAction::Skip, None)).await.unwrap();
        }
        log.append(&decision(SignalAction::Error, None)).await.unwrap();

        let counts = log.counts_by_action(100).await.unwrap();
        assert_eq!(counts.get("skip"), Some(&3));
        assert_eq!(counts.get("error"), Some(&1));
        assert_eq!(counts.get("buy"), None);
    }
}

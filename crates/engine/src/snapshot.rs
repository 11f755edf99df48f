use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use common::{Exchange, PortfolioSnapshot, Result};

/// Records aggregate portfolio value on a fixed cadence, independent of
/// trading activity. A failed read or write is logged and that cycle is
/// skipped — this task never crashes the process and never blocks trading.
pub struct PortfolioSnapshotter {
    exchange: Arc<dyn Exchange>,
    db: SqlitePool,
    interval: Duration,
}

impl PortfolioSnapshotter {
    pub fn new(exchange: Arc<dyn Exchange>, db: SqlitePool, interval: Duration) -> Self {
        Self {
            exchange,
            db,
            interval,
        }
    }

    /// Run the snapshot loop. Call from `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "PortfolioSnapshotter running");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(e) = self.snapshot().await {
                error!(error = %e, "Portfolio snapshot failed");
            }
        }
    }

    async fn snapshot(&self) -> Result<()> {
        let cash = self.exchange.balance().await?.cash();
        let positions_value: f64 = self
            .exchange
            .positions()
            .await?
            .iter()
            .map(|p| p.market_exposure as f64 / 100.0)
            .sum();

        sqlx::query(
            "INSERT INTO portfolio_snapshots (cash, positions_value, total_value, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(cash)
        .bind(positions_value)
        .bind(cash + positions_value)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        debug!(cash, positions_value, "Portfolio snapshot recorded");
        Ok(())
    }
}

/// Snapshot history, oldest first, bounded to the most recent `limit` rows.
pub async fn history(db: &SqlitePool, limit: i64) -> Result<Vec<PortfolioSnapshot>> {
    let mut rows: Vec<PortfolioSnapshot> = sqlx::query_as(
        "SELECT id, cash, positions_value, total_value, created_at
         FROM portfolio_snapshots ORDER BY created_at DESC, id DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(db)
    .await?;
    rows.reverse();
    Ok(rows)
}

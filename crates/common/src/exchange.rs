use async_trait::async_trait;

use crate::{Balance, Market, MarketPosition, OrderConfirmation, OrderRequest, Result};

/// Abstraction over the exchange connection.
///
/// `KalshiClient` in `crates/exchange` implements this for live/demo trading;
/// tests substitute stub implementations. The client performs no retries —
/// callers decide whether a transient failure is a skip or an error.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Query the account cash balance.
    async fn balance(&self) -> Result<Balance>;

    /// Query currently open market positions.
    async fn positions(&self) -> Result<Vec<MarketPosition>>;

    /// List markets in a series, filtered by status (e.g. "open").
    async fn markets(&self, series_ticker: &str, status: &str) -> Result<Vec<Market>>;

    /// Fetch one market by ticker.
    async fn market(&self, ticker: &str) -> Result<Market>;

    /// Place a limit buy order and return the exchange order id.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation>;
}

//! End-to-end evaluation of the built-in expiry strategy against a stubbed
//! exchange.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use common::{
    Balance, Error, Exchange, Market, MarketPosition, MarketSide, OrderConfirmation, OrderRequest,
    Result, SignalAction,
};
use exchange::MarketCache;
use strategy::expiry::HighConfidenceExpiry;
use strategy::{Strategy, StrategyContext};

struct StubExchange {
    markets: Vec<Market>,
    detail: Option<Market>,
    balance_cents: i64,
    fail_markets: bool,
    orders: Mutex<Vec<OrderRequest>>,
}

impl StubExchange {
    fn new(markets: Vec<Market>, detail: Option<Market>, balance_cents: i64) -> Self {
        Self {
            markets,
            detail,
            balance_cents,
            fail_markets: false,
            orders: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Exchange for StubExchange {
    async fn balance(&self) -> Result<Balance> {
        Ok(Balance {
            balance: self.balance_cents,
        })
    }

    async fn positions(&self) -> Result<Vec<MarketPosition>> {
        Ok(Vec::new())
    }

    async fn markets(&self, _series: &str, _status: &str) -> Result<Vec<Market>> {
        if self.fail_markets {
            return Err(Error::Exchange {
                status: 503,
                body: "upstream unavailable".into(),
            });
        }
        Ok(self.markets.clone())
    }

    async fn market(&self, ticker: &str) -> Result<Market> {
        self.detail
            .clone()
            .filter(|m| m.ticker == ticker)
            .ok_or_else(|| Error::Other(format!("no detail for {ticker}")))
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        self.orders.lock().await.push(order.clone());
        Ok(OrderConfirmation {
            order_id: "ord-1".into(),
        })
    }
}

fn market(ticker: &str, closes_in_secs: i64, yes_ask: i64, no_ask: i64) -> Market {
    Market {
        ticker: ticker.to_string(),
        title: format!("{ticker} title"),
        subtitle: String::new(),
        yes_bid: None,
        yes_ask: Some(yes_ask),
        no_bid: None,
        no_ask: Some(no_ask),
        close_time: Some(Utc::now() + Duration::seconds(closes_in_secs)),
        expiration_time: None,
        status: Some("open".to_string()),
    }
}

fn context(stub: StubExchange) -> StrategyContext {
    StrategyContext {
        exchange: Arc::new(stub),
        market_cache: Arc::new(MarketCache::new()),
    }
}

fn default_strategy() -> Box<dyn strategy::Strategy> {
    HighConfidenceExpiry::from_config(&serde_json::json!({})).unwrap()
}

#[tokio::test]
async fn buys_yes_in_the_final_seconds() {
    let m = market("KXBTC-A", 45, 92, 8);
    let cx = context(StubExchange::new(vec![m.clone()], Some(m), 100_000));

    let signal = default_strategy().evaluate(&cx).await;

    assert_eq!(signal.action, SignalAction::Buy);
    assert_eq!(signal.side, Some(MarketSide::Yes));
    assert_eq!(signal.market_ticker.as_deref(), Some("KXBTC-A"));
    assert_eq!(signal.contracts, Some(54));
    assert_eq!(signal.portfolio_cash, Some(1000.0));
    // ~5% of $1000 at 92c
    let size = signal.position_size.unwrap();
    assert!((size - 49.68).abs() < 1e-9);
    assert_eq!(signal.price_cents(), Some(92));
    let secs = signal.seconds_remaining.unwrap();
    assert!((40..=45).contains(&secs), "unexpected seconds: {secs}");
}

#[tokio::test]
async fn skips_when_close_is_past_the_ceiling() {
    let m = market("KXBTC-A", 120, 95, 5);
    let cx = context(StubExchange::new(vec![m.clone()], Some(m), 100_000));

    let signal = default_strategy().evaluate(&cx).await;

    assert_eq!(signal.action, SignalAction::Skip);
    assert!(signal.reason.contains("outside window"), "{}", signal.reason);
}

#[tokio::test]
async fn skips_when_neither_side_is_confident() {
    let m = market("KXBTC-A", 30, 60, 40);
    let cx = context(StubExchange::new(vec![m.clone()], Some(m), 100_000));

    let signal = default_strategy().evaluate(&cx).await;

    assert_eq!(signal.action, SignalAction::Skip);
    assert!(signal.reason.contains("threshold"), "{}", signal.reason);
}

#[tokio::test]
async fn skips_when_no_markets_are_open() {
    let cx = context(StubExchange::new(Vec::new(), None, 100_000));
    let signal = default_strategy().evaluate(&cx).await;
    assert_eq!(signal.action, SignalAction::Skip);
    assert_eq!(signal.reason, "No open markets found");
}

#[tokio::test]
async fn lookup_failure_becomes_an_error_signal() {
    let mut stub = StubExchange::new(Vec::new(), None, 100_000);
    stub.fail_markets = true;
    let cx = context(stub);

    let signal = default_strategy().evaluate(&cx).await;

    assert_eq!(signal.action, SignalAction::Error);
    assert!(
        signal.reason.contains("Market lookup failed"),
        "{}",
        signal.reason
    );
}

#[tokio::test]
async fn every_poll_refreshes_the_market_cache() {
    let m = market("KXBTC-A", 120, 95, 5);
    let cx = context(StubExchange::new(vec![m.clone()], Some(m), 100_000));

    assert!(cx.market_cache.current().await.is_none());
    let _ = default_strategy().evaluate(&cx).await;

    let snap = cx.market_cache.current().await.expect("cache updated");
    assert_eq!(snap.ticker, "KXBTC-A");
    assert!((snap.yes_price - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn identical_inputs_yield_identical_decisions() {
    let m = market("KXBTC-A", 45, 92, 8);
    let cx = context(StubExchange::new(vec![m.clone()], Some(m), 100_000));

    let a = default_strategy().evaluate(&cx).await;
    let b = default_strategy().evaluate(&cx).await;

    assert_eq!(a.action, b.action);
    assert_eq!(a.side, b.side);
    assert_eq!(a.contracts, b.contracts);
    assert_eq!(a.position_size, b.position_size);
}

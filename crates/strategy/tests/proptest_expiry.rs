use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use proptest::prelude::*;

use common::{
    Balance, Exchange, Market, MarketPosition, OrderConfirmation, OrderRequest, Result,
    SignalAction,
};
use exchange::MarketCache;
use strategy::expiry::HighConfidenceExpiry;
use strategy::{Strategy, StrategyContext};

struct FixedExchange {
    market: Market,
    balance_cents: i64,
}

#[async_trait]
impl Exchange for FixedExchange {
    async fn balance(&self) -> Result<Balance> {
        Ok(Balance {
            balance: self.balance_cents,
        })
    }

    async fn positions(&self) -> Result<Vec<MarketPosition>> {
        Ok(Vec::new())
    }

    async fn markets(&self, _series: &str, _status: &str) -> Result<Vec<Market>> {
        Ok(vec![self.market.clone()])
    }

    async fn market(&self, _ticker: &str) -> Result<Market> {
        Ok(self.market.clone())
    }

    async fn place_order(&self, _order: &OrderRequest) -> Result<OrderConfirmation> {
        Ok(OrderConfirmation {
            order_id: "noop".into(),
        })
    }
}

proptest! {
    /// Evaluation on arbitrary prices, close offsets and balances must never
    /// panic, and a buy must satisfy every gate: inside the time window, at
    /// or above the threshold, sized to the cash fraction (minimum one
    /// contract).
    #[test]
    fn evaluation_never_panics_and_buys_respect_the_gates(
        yes_cents in 0i64..=100,
        no_cents in 0i64..=100,
        closes_in_secs in -300i64..600,
        balance_cents in 0i64..10_000_000,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let market = Market {
                ticker: "KXBTC-PROP".into(),
                title: String::new(),
                subtitle: String::new(),
                yes_bid: None,
                yes_ask: Some(yes_cents),
                no_bid: None,
                no_ask: Some(no_cents),
                close_time: Some(Utc::now() + Duration::seconds(closes_in_secs)),
                expiration_time: None,
                status: Some("open".into()),
            };
            let cx = StrategyContext {
                exchange: Arc::new(FixedExchange { market, balance_cents }),
                market_cache: Arc::new(MarketCache::new()),
            };

            let strategy = HighConfidenceExpiry::from_config(&serde_json::json!({})).unwrap();
            let signal = strategy.evaluate(&cx).await;

            if signal.action == SignalAction::Buy {
                let secs = signal.seconds_remaining.unwrap();
                prop_assert!((0..=60).contains(&secs), "buy outside window: {secs}s");

                let price = signal.contract_price.unwrap();
                prop_assert!(price >= 0.90, "buy below threshold: {price}");

                let contracts = signal.contracts.unwrap();
                prop_assert!(contracts >= 1);

                let cash = signal.portfolio_cash.unwrap();
                let size = signal.position_size.unwrap();
                // Either the 5% fraction, or the one-contract minimum.
                prop_assert!(
                    size <= (cash * 0.05).max(price) + 1e-9,
                    "size {size} exceeds budget for cash {cash}"
                );
            }
            Ok(())
        })?;
    }
}

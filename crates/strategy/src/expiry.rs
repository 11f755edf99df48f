//! High-confidence expiry strategy.
//!
//! Watches a short-interval market series and buys the near-certain side in
//! the final seconds before close: when one side trades at or above the
//! configured threshold and the market closes within the configured ceiling,
//! commit a fixed fraction of available cash.
//!
//! Config keys (registry `config` document):
//!   market_series         "KXBTC"
//!   interval_minutes      15
//!   min_price_threshold   0.90
//!   max_seconds_remaining 60
//!   position_pct          0.05

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use common::{Error, Market, MarketSide, MarketSnapshot, Result, SignalAction, TradeSignal};

use crate::{Strategy, StrategyContext};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExpiryConfig {
    pub market_series: String,
    pub interval_minutes: i64,
    pub min_price_threshold: f64,
    pub max_seconds_remaining: i64,
    pub position_pct: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            market_series: "KXBTC".to_string(),
            interval_minutes: 15,
            min_price_threshold: 0.90,
            max_seconds_remaining: 60,
            position_pct: 0.05,
        }
    }
}

pub struct HighConfidenceExpiry {
    cfg: ExpiryConfig,
}

impl HighConfidenceExpiry {
    pub const NAME: &'static str = "btc_15m_high_confidence";
    pub const POLL_INTERVAL_SECS: u64 = 10;

    /// Constructor registered in the catalog. A malformed document is a
    /// configuration error surfaced on the strategy's own tick.
    pub fn from_config(config: &Value) -> Result<Box<dyn Strategy>> {
        let cfg: ExpiryConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::Config(format!("invalid {} config: {e}", Self::NAME)))?;
        Ok(Box::new(Self { cfg }))
    }

    /// Reference configuration document, used to seed the registry.
    pub fn default_config() -> Value {
        serde_json::to_value(ExpiryConfig::default()).unwrap_or_default()
    }

    async fn poll(&self, cx: &StrategyContext) -> Result<TradeSignal> {
        let cfg = &self.cfg;
        let markets = cx
            .exchange
            .markets(&cfg.market_series, "open")
            .await
            .map_err(|e| Error::Other(format!("Market lookup failed: {e}")))?;
        if markets.is_empty() {
            return Ok(TradeSignal::skip("No open markets found"));
        }

        let now = Utc::now();
        let Some(target) = pick_target(&markets, now, cfg.interval_minutes) else {
            return Ok(TradeSignal::skip(format!(
                "No {}-min market found in open markets",
                cfg.interval_minutes
            )));
        };
        let Some(close_time) = target.closes_at() else {
            return Ok(TradeSignal::skip("Could not parse market close time"));
        };
        let seconds_remaining = (close_time - now).num_seconds();

        // Fetch current prices
        let detail = cx
            .exchange
            .market(&target.ticker)
            .await
            .map_err(|e| Error::Other(format!("Market detail fetch failed: {e}")))?;
        let yes_price = detail.yes_price();
        let no_price = detail.no_price();

        cx.market_cache
            .update(MarketSnapshot {
                ticker: target.ticker.clone(),
                title: target.display_title().to_string(),
                yes_price,
                no_price,
                close_time,
                seconds_remaining,
                checked_at: now,
            })
            .await;

        info!(
            ticker = %target.ticker,
            yes = yes_price,
            no = no_price,
            seconds_remaining,
            "Market polled"
        );

        let (side, price) = match gate(yes_price, no_price, seconds_remaining, cfg) {
            Verdict::Skip(reason) => {
                let mut signal = TradeSignal::skip(reason);
                signal.market_ticker = Some(target.ticker.clone());
                signal.contract_price = Some(yes_price.max(no_price));
                signal.seconds_remaining = Some(seconds_remaining);
                return Ok(signal);
            }
            Verdict::Candidate { side, price } => (side, price),
        };

        let balance = cx
            .exchange
            .balance()
            .await
            .map_err(|e| Error::Other(format!("Balance query failed: {e}")))?;
        let cash = balance.cash();
        let sized = size_position(price, cash, cfg.position_pct);

        Ok(TradeSignal {
            action: SignalAction::Buy,
            side: Some(side),
            market_ticker: Some(target.ticker.clone()),
            contract_price: Some(price),
            seconds_remaining: Some(seconds_remaining),
            portfolio_cash: Some(cash),
            position_size: Some(sized.position_size),
            contracts: Some(sized.contracts),
            reason: format!(
                "{} @ {price:.2} with {seconds_remaining}s remaining",
                side.to_string().to_uppercase()
            ),
            params: json!({
                "price_cents": sized.price_cents,
                "threshold": cfg.min_price_threshold,
                "position_pct": cfg.position_pct,
            }),
        })
    }
}

#[async_trait]
impl Strategy for HighConfidenceExpiry {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, cx: &StrategyContext) -> TradeSignal {
        match self.poll(cx).await {
            Ok(signal) => signal,
            Err(e) => TradeSignal::error(e.to_string()),
        }
    }
}

// ─── Pure decision helpers ────────────────────────────────────────────────────

enum Verdict {
    Skip(String),
    Candidate { side: MarketSide, price: f64 },
}

/// Threshold and ceiling gates. Deterministic given identical inputs.
fn gate(yes_price: f64, no_price: f64, seconds_remaining: i64, cfg: &ExpiryConfig) -> Verdict {
    if seconds_remaining > cfg.max_seconds_remaining || seconds_remaining < 0 {
        return Verdict::Skip(format!(
            "Time remaining {seconds_remaining}s outside window [0, {}]",
            cfg.max_seconds_remaining
        ));
    }

    if yes_price >= cfg.min_price_threshold {
        Verdict::Candidate {
            side: MarketSide::Yes,
            price: yes_price,
        }
    } else if no_price >= cfg.min_price_threshold {
        Verdict::Candidate {
            side: MarketSide::No,
            price: no_price,
        }
    } else {
        Verdict::Skip(format!(
            "Neither side meets threshold (yes={yes_price:.2}, no={no_price:.2} < {})",
            cfg.min_price_threshold
        ))
    }
}

struct SizedPosition {
    contracts: i64,
    price_cents: i64,
    position_size: f64,
}

/// Translate a cash fraction into whole contracts at the current price.
/// Always buys at least one contract.
fn size_position(price: f64, cash: f64, position_pct: f64) -> SizedPosition {
    let spend = cash * position_pct;
    let price_cents = (price * 100.0).round() as i64;
    let contracts = ((spend * 100.0) / price_cents as f64).floor() as i64;
    let contracts = contracts.max(1);
    SizedPosition {
        contracts,
        price_cents,
        position_size: (contracts * price_cents) as f64 / 100.0,
    }
}

/// Choose the soonest-closing market inside the series interval (plus a 30s
/// grace), falling back to the soonest-closing future market.
fn pick_target(markets: &[Market], now: DateTime<Utc>, interval_minutes: i64) -> Option<&Market> {
    let window = interval_minutes * 60 + 30;

    let in_window = markets
        .iter()
        .filter_map(|m| {
            let delta = (m.closes_at()? - now).num_seconds();
            (delta > 0 && delta <= window).then_some((delta, m))
        })
        .min_by_key(|(delta, _)| *delta);
    if let Some((_, m)) = in_window {
        return Some(m);
    }

    markets
        .iter()
        .filter_map(|m| {
            let delta = (m.closes_at()? - now).num_seconds();
            (delta > 0).then_some((delta, m))
        })
        .min_by_key(|(delta, _)| *delta)
        .map(|(_, m)| m)
}

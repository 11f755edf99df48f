use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Side of a binary market contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum MarketSide {
    Yes,
    No,
}

impl std::fmt::Display for MarketSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketSide::Yes => write!(f, "yes"),
            MarketSide::No => write!(f, "no"),
        }
    }
}

/// Outcome category of one strategy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Skip,
    Error,
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalAction::Buy => write!(f, "buy"),
            SignalAction::Skip => write!(f, "skip"),
            SignalAction::Error => write!(f, "error"),
        }
    }
}

/// What a strategy decided to do on one evaluation.
///
/// Exactly one of these is produced per tick; the scheduler turns it into a
/// decision row regardless of the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: SignalAction,
    pub side: Option<MarketSide>,
    pub market_ticker: Option<String>,
    /// Contract price in dollars (0.01–0.99).
    pub contract_price: Option<f64>,
    pub seconds_remaining: Option<i64>,
    pub portfolio_cash: Option<f64>,
    /// Dollar notional committed on a buy.
    pub position_size: Option<f64>,
    pub contracts: Option<i64>,
    pub reason: String,
    /// Configuration snapshot plus order parameters (e.g. `price_cents`).
    pub params: Value,
}

impl TradeSignal {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::bare(SignalAction::Skip, reason)
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self::bare(SignalAction::Error, reason)
    }

    fn bare(action: SignalAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            side: None,
            market_ticker: None,
            contract_price: None,
            seconds_remaining: None,
            portfolio_cash: None,
            position_size: None,
            contracts: None,
            reason: reason.into(),
            params: Value::Object(Default::default()),
        }
    }

    /// Price in whole cents for order placement, when the signal carries one.
    pub fn price_cents(&self) -> Option<i64> {
        self.params
            .get("price_cents")
            .and_then(|v| v.as_i64())
            .or_else(|| self.contract_price.map(|p| (p * 100.0).round() as i64))
    }
}

/// A strategy row in the registry. `name` is immutable and globally unique.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a registry row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStrategy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// Partial update for a registry row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyPatch {
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub config: Option<Value>,
}

/// One appended decision, before it has an id.
#[derive(Debug, Clone)]
pub struct NewDecision {
    pub strategy_id: i64,
    pub market_ticker: String,
    pub side: Option<MarketSide>,
    pub action: SignalAction,
    pub reason: String,
    pub contract_price: Option<f64>,
    pub seconds_remaining: Option<i64>,
    pub portfolio_cash: Option<f64>,
    pub position_size: Option<f64>,
    pub contracts: Option<i64>,
    pub order_id: Option<String>,
    pub params: Value,
}

impl NewDecision {
    /// Build from the signal the scheduler received, plus any order id
    /// captured during placement.
    pub fn from_signal(strategy_id: i64, signal: &TradeSignal, order_id: Option<String>) -> Self {
        Self {
            strategy_id,
            market_ticker: signal.market_ticker.clone().unwrap_or_default(),
            side: signal.side,
            action: signal.action,
            reason: signal.reason.clone(),
            contract_price: signal.contract_price,
            seconds_remaining: signal.seconds_remaining,
            portfolio_cash: signal.portfolio_cash,
            position_size: signal.position_size,
            contracts: signal.contracts,
            order_id,
            params: signal.params.clone(),
        }
    }
}

/// A persisted decision row. `side` is stored as text because decisions for
/// skip/error cycles carry `"unknown"`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DecisionRow {
    pub id: i64,
    pub strategy_id: i64,
    pub market_ticker: String,
    pub side: String,
    pub action: SignalAction,
    pub reason: String,
    pub contract_price: Option<f64>,
    pub seconds_remaining: Option<i64>,
    pub portfolio_cash: Option<f64>,
    pub position_size: Option<f64>,
    pub contracts: Option<i64>,
    pub order_id: Option<String>,
    pub params: String,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time portfolio valuation for the history chart.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PortfolioSnapshot {
    pub id: i64,
    pub cash: f64,
    pub positions_value: f64,
    pub total_value: f64,
    pub created_at: DateTime<Utc>,
}

/// Most recently observed market state, refreshed by strategy polls.
/// Non-durable and purely advisory for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    pub title: String,
    pub yes_price: f64,
    pub no_price: f64,
    pub close_time: DateTime<Utc>,
    pub seconds_remaining: i64,
    pub checked_at: DateTime<Utc>,
}

// ─── Exchange payloads ────────────────────────────────────────────────────────

/// A market as returned by the exchange. Prices are in whole cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub yes_bid: Option<i64>,
    #[serde(default)]
    pub yes_ask: Option<i64>,
    #[serde(default)]
    pub no_bid: Option<i64>,
    #[serde(default)]
    pub no_ask: Option<i64>,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Market {
    /// Close time, falling back to expiration when close is absent.
    pub fn closes_at(&self) -> Option<DateTime<Utc>> {
        self.close_time.or(self.expiration_time)
    }

    /// Best yes price in dollars (ask preferred over bid).
    pub fn yes_price(&self) -> f64 {
        cents_to_dollars(self.yes_ask.or(self.yes_bid))
    }

    /// Best no price in dollars (ask preferred over bid).
    pub fn no_price(&self) -> f64 {
        cents_to_dollars(self.no_ask.or(self.no_bid))
    }

    /// Display title, falling back to subtitle then ticker.
    pub fn display_title(&self) -> &str {
        if !self.title.is_empty() {
            &self.title
        } else if !self.subtitle.is_empty() {
            &self.subtitle
        } else {
            &self.ticker
        }
    }
}

fn cents_to_dollars(cents: Option<i64>) -> f64 {
    cents.unwrap_or(0) as f64 / 100.0
}

/// Account cash balance. The exchange reports cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub balance: i64,
}

impl Balance {
    pub fn cash(&self) -> f64 {
        self.balance as f64 / 100.0
    }
}

/// An open position in one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPosition {
    pub ticker: String,
    /// Current exposure in cents.
    #[serde(default)]
    pub market_exposure: i64,
    /// Net contract count (positive = yes, negative = no).
    #[serde(default)]
    pub position: i64,
}

/// A limit buy order to be placed on the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub ticker: String,
    pub side: MarketSide,
    pub count: i64,
    /// Limit price for the chosen side, in cents.
    pub price_cents: i64,
    pub client_order_id: String,
}

impl OrderRequest {
    pub fn limit_buy(
        ticker: impl Into<String>,
        side: MarketSide,
        count: i64,
        price_cents: i64,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            side,
            count,
            price_cents,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Confirmation returned by the exchange after order placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
}

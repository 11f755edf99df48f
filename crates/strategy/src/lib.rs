pub mod catalog;
pub mod expiry;

pub use catalog::{StrategyCatalog, StrategySpec};

use std::sync::Arc;

use async_trait::async_trait;

use common::{Exchange, TradeSignal};
use exchange::MarketCache;

/// Shared handles a strategy may use during one evaluation.
#[derive(Clone)]
pub struct StrategyContext {
    pub exchange: Arc<dyn Exchange>,
    pub market_cache: Arc<MarketCache>,
}

/// All strategy implementations must satisfy this trait.
///
/// The scheduler builds a fresh instance from the registry configuration at
/// every tick and calls `evaluate` exactly once. The call must not fail
/// across this boundary: any internal fault is captured and returned as an
/// `Error` signal, so one bad cycle never starves the scheduler of later
/// cycles for other strategies. Skip signals are still logged so passed
/// trades can be audited.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Unique name — must match the registry row's `name` column.
    fn name(&self) -> &str;

    /// Inspect the market and return exactly one signal.
    async fn evaluate(&self, cx: &StrategyContext) -> TradeSignal;
}

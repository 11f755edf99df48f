use tokio::sync::RwLock;

use common::MarketSnapshot;

/// Single-slot cache of the most recently observed market.
///
/// Written only by the strategy execution path, read by the dashboard API.
/// Overwritten on every observation; never persisted.
#[derive(Default)]
pub struct MarketCache {
    slot: RwLock<Option<MarketSnapshot>>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, snapshot: MarketSnapshot) {
        *self.slot.write().await = Some(snapshot);
    }

    pub async fn current(&self) -> Option<MarketSnapshot> {
        self.slot.read().await.clone()
    }
}

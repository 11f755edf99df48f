pub mod auth;
pub mod cache;
pub mod rest;
pub mod stats;

pub use auth::KalshiAuth;
pub use cache::MarketCache;
pub use rest::KalshiClient;
pub use stats::{ApiStats, EndpointStats, StatsTotals};

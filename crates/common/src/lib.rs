pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::{Config, KalshiEnv};
pub use error::{Error, Result};
pub use exchange::Exchange;
pub use types::*;

use serde_json::Value;

use common::Result;

use crate::expiry::HighConfidenceExpiry;
use crate::Strategy;

/// Constructor signature shared by all catalog entries.
pub type BuildFn = fn(&Value) -> Result<Box<dyn Strategy>>;

/// One implementation known to the process: its unique name, its poll
/// cadence, and a constructor that validates the registry configuration.
pub struct StrategySpec {
    pub name: &'static str,
    pub poll_interval_secs: u64,
    pub build: BuildFn,
    /// Reference configuration used when seeding a fresh registry row.
    pub default_config: fn() -> Value,
}

/// Startup-time mapping from strategy name to constructor.
///
/// Registration is explicit — no discovery. A registry row whose name has no
/// entry here is schedulable in name only: the scheduler surfaces it as
/// unbound and never evaluates it.
pub struct StrategyCatalog {
    specs: Vec<StrategySpec>,
}

impl StrategyCatalog {
    /// Catalog with all built-in strategies registered.
    pub fn builtin() -> Self {
        Self {
            specs: vec![StrategySpec {
                name: HighConfidenceExpiry::NAME,
                poll_interval_secs: HighConfidenceExpiry::POLL_INTERVAL_SECS,
                build: HighConfidenceExpiry::from_config,
                default_config: HighConfidenceExpiry::default_config,
            }],
        }
    }

    /// Catalog with an explicit spec list (used by tests).
    pub fn with_specs(specs: Vec<StrategySpec>) -> Self {
        Self { specs }
    }

    pub fn get(&self, name: &str) -> Option<&StrategySpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn specs(&self) -> &[StrategySpec] {
        &self.specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_binds_the_expiry_strategy() {
        let catalog = StrategyCatalog::builtin();
        assert!(catalog.contains("btc_15m_high_confidence"));
        assert!(!catalog.contains("no_such_strategy"));

        let spec = catalog.get("btc_15m_high_confidence").unwrap();
        assert_eq!(spec.poll_interval_secs, 10);
    }

    #[test]
    fn build_rejects_malformed_config() {
        let catalog = StrategyCatalog::builtin();
        let spec = catalog.get("btc_15m_high_confidence").unwrap();

        // Wrong type for a known field must fail at build time.
        let bad = serde_json::json!({ "position_pct": "a lot" });
        assert!((spec.build)(&bad).is_err());

        // Empty config falls back to defaults.
        let empty = serde_json::json!({});
        assert!((spec.build)(&empty).is_ok());
    }
}

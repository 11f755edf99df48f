pub mod decisions;
pub mod registry;
pub mod scheduler;
pub mod snapshot;

pub use decisions::DecisionLog;
pub use registry::StrategyRegistry;
pub use scheduler::Scheduler;
pub use snapshot::PortfolioSnapshotter;

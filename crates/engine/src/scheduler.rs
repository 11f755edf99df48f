use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use common::{Error, NewDecision, OrderRequest, Result, SignalAction, StrategyRecord, TradeSignal};
use strategy::catalog::BuildFn;
use strategy::{StrategyCatalog, StrategyContext};

use crate::decisions::DecisionLog;
use crate::registry::StrategyRegistry;

/// Drives every enabled, implementation-backed strategy on its own interval.
///
/// Each strategy runs in its own task with a sequential tick loop, so two
/// evaluations of the same strategy can never overlap and no strategy can
/// stall another. A reconcile pass joins the registry against the catalog and
/// spawns/reaps tasks as records are enabled and disabled.
pub struct Scheduler {
    registry: StrategyRegistry,
    decisions: DecisionLog,
    catalog: Arc<StrategyCatalog>,
    cx: StrategyContext,
    reconcile_interval: Duration,
    tasks: HashMap<String, JoinHandle<()>>,
    warned_unbound: HashSet<String>,
}

impl Scheduler {
    pub fn new(
        registry: StrategyRegistry,
        decisions: DecisionLog,
        catalog: Arc<StrategyCatalog>,
        cx: StrategyContext,
        reconcile_interval: Duration,
    ) -> Self {
        Self {
            registry,
            decisions,
            catalog,
            cx,
            reconcile_interval,
            tasks: HashMap::new(),
            warned_unbound: HashSet::new(),
        }
    }

    /// Run the reconcile loop. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Scheduler running");
        loop {
            if let Err(e) = self.reconcile().await {
                error!(error = %e, "Scheduling pass failed");
            }
            tokio::time::sleep(self.reconcile_interval).await;
        }
    }

    /// One scheduling pass: spawn loops for newly enabled+bound records,
    /// reap loops that exited after a disable.
    async fn reconcile(&mut self) -> Result<()> {
        self.tasks.retain(|_, handle| !handle.is_finished());

        for record in self.registry.list_enabled().await? {
            if self.tasks.contains_key(&record.name) {
                continue;
            }

            let Some(spec) = self.catalog.get(&record.name) else {
                // Schedulable in name only — visible to the API, never run.
                if self.warned_unbound.insert(record.name.clone()) {
                    warn!(
                        strategy = %record.name,
                        "Enabled strategy has no registered implementation — skipping"
                    );
                }
                continue;
            };

            info!(
                strategy = %record.name,
                interval_secs = spec.poll_interval_secs,
                "Scheduling strategy"
            );
            let handle = tokio::spawn(strategy_loop(
                record.name.clone(),
                spec.poll_interval_secs,
                spec.build,
                self.registry.clone(),
                self.decisions.clone(),
                self.cx.clone(),
            ));
            self.tasks.insert(record.name, handle);
        }
        Ok(())
    }
}

/// Per-strategy tick loop. Sequential by construction: the next tick is not
/// awaited until the previous evaluation completes, and missed ticks are
/// skipped rather than queued.
async fn strategy_loop(
    name: String,
    poll_interval_secs: u64,
    build: BuildFn,
    registry: StrategyRegistry,
    decisions: DecisionLog,
    cx: StrategyContext,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(poll_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        // Tick-start snapshot: re-read the row so config edits land on the
        // next tick and a disable stops the loop before evaluation.
        let record = match registry.get(&name).await {
            Ok(record) => record,
            Err(Error::NotFound(_)) => {
                warn!(strategy = %name, "Registry row gone — unscheduling");
                return;
            }
            Err(e) => {
                error!(strategy = %name, error = %e, "Registry read failed — skipping tick");
                continue;
            }
        };
        if !record.enabled {
            info!(strategy = %name, "Strategy disabled — unscheduling");
            return;
        }

        match run_cycle(&record, build, &cx, &decisions).await {
            Ok(_) => {}
            Err(e) => {
                // A persistence fault cannot be captured as a decision; it is
                // fatal to this cycle only.
                error!(strategy = %name, error = %e, "Decision write failed");
            }
        }
    }
}

/// One complete evaluation cycle: build the strategy from the tick-start
/// config, evaluate, place the order on a buy, and write exactly one
/// decision row. Returns the decision id.
pub async fn run_cycle(
    record: &StrategyRecord,
    build: BuildFn,
    cx: &StrategyContext,
    decisions: &DecisionLog,
) -> Result<i64> {
    let mut signal = match build(&record.config) {
        Ok(instance) => instance.evaluate(cx).await,
        // Malformed configuration is an error decision, not a dead strategy.
        Err(e) => TradeSignal::error(e.to_string()),
    };

    let mut order_id = None;
    if signal.action == SignalAction::Buy {
        match place_order(&signal, cx).await {
            Ok(id) => {
                info!(strategy = %record.name, order_id = %id, "Order placed");
                order_id = Some(id);
            }
            Err(e) => {
                error!(strategy = %record.name, error = %e, "Order failed");
                signal.action = SignalAction::Error;
                signal.reason = format!("Order placement failed: {e}");
            }
        }
    }

    // The decision row carries the configuration snapshot the cycle used.
    if signal.params.as_object().is_some_and(|o| o.is_empty()) {
        signal.params = record.config.clone();
    }

    decisions
        .append(&NewDecision::from_signal(record.id, &signal, order_id))
        .await
}

async fn place_order(signal: &TradeSignal, cx: &StrategyContext) -> Result<String> {
    let ticker = signal
        .market_ticker
        .as_deref()
        .ok_or_else(|| Error::Other("buy signal missing market ticker".into()))?;
    let side = signal
        .side
        .ok_or_else(|| Error::Other("buy signal missing side".into()))?;
    let count = signal
        .contracts
        .filter(|c| *c > 0)
        .ok_or_else(|| Error::Other("buy signal missing contract count".into()))?;
    let price_cents = signal
        .price_cents()
        .filter(|p| (1..=99).contains(p))
        .ok_or_else(|| Error::Other("buy signal missing a valid price".into()))?;

    let order = OrderRequest::limit_buy(ticker, side, count, price_cents);
    let confirmation = cx.exchange.place_order(&order).await?;
    Ok(confirmation.order_id)
}

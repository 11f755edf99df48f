use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;

/// Per-endpoint call accounting for the exchange client.
///
/// Created once at startup and shared (`Arc`) between the client, the
/// scheduler and the dashboard API. Counters only grow; they reset on process
/// restart. Recording holds the lock for a single map update, so it never
/// blocks an in-flight call for long.
pub struct ApiStats {
    inner: Mutex<HashMap<String, Counters>>,
    started: Instant,
}

#[derive(Default, Clone)]
struct Counters {
    calls: u64,
    errors: u64,
    total_ms: f64,
}

/// Snapshot of one endpoint's counters.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub calls: u64,
    pub errors: u64,
    pub avg_ms: f64,
    pub total_ms: f64,
}

/// Process-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct StatsTotals {
    pub total_calls: u64,
    pub total_errors: u64,
    pub calls_per_minute: f64,
    pub uptime_seconds: u64,
}

impl ApiStats {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    /// Record one call against an endpoint label (e.g. `"GET /markets"`).
    pub fn record(&self, label: &str, elapsed_ms: f64, error: bool) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = map.entry(label.to_string()).or_default();
        entry.calls += 1;
        entry.total_ms += elapsed_ms;
        if error {
            entry.errors += 1;
        }
    }

    /// Per-endpoint rows, sorted by label.
    pub fn summary(&self) -> Vec<EndpointStats> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut rows: Vec<EndpointStats> = map
            .iter()
            .map(|(label, c)| EndpointStats {
                endpoint: label.clone(),
                calls: c.calls,
                errors: c.errors,
                avg_ms: if c.calls > 0 {
                    (c.total_ms / c.calls as f64 * 10.0).round() / 10.0
                } else {
                    0.0
                },
                total_ms: (c.total_ms * 10.0).round() / 10.0,
            })
            .collect();
        rows.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        rows
    }

    pub fn totals(&self) -> StatsTotals {
        let (total_calls, total_errors) = {
            let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.values()
                .fold((0u64, 0u64), |(c, e), v| (c + v.calls, e + v.errors))
        };
        let uptime = self.started.elapsed().as_secs_f64();
        StatsTotals {
            total_calls,
            total_errors,
            calls_per_minute: if uptime > 0.0 {
                (total_calls as f64 / (uptime / 60.0) * 100.0).round() / 100.0
            } else {
                0.0
            },
            uptime_seconds: uptime as u64,
        }
    }
}

impl Default for ApiStats {
    fn default() -> Self {
        Self::new()
    }
}

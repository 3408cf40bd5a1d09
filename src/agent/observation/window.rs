//! Sliding observation window over the transaction stream.
//!
//! The window is rebuilt from the ring buffer once per agent cycle: entries
//! older than the configured duration are evicted, then aggregate statistics
//! are computed per dimension group (global, issuer, method, geography).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Dimension, Transaction};

/// Aggregate statistics for one dimension group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStats {
    pub total: usize,
    pub success_count: usize,
    pub soft_fail_count: usize,
    pub hard_fail_count: usize,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub avg_retry_count: f64,
}

impl DimensionStats {
    fn from_transactions(txns: &[&Transaction]) -> Self {
        let total = txns.len();
        if total == 0 {
            return Self::empty();
        }
        let success_count = txns.iter().filter(|t| t.outcome.is_success()).count();
        let soft_fail_count = txns
            .iter()
            .filter(|t| t.outcome == crate::types::Outcome::SoftFail)
            .count();
        let hard_fail_count = total - success_count - soft_fail_count;

        let mut latencies: Vec<f64> = txns.iter().map(|t| t.latency_ms as f64).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));
        let avg_latency_ms = latencies.iter().sum::<f64>() / total as f64;

        let avg_retry_count =
            txns.iter().map(|t| t.retry_count as f64).sum::<f64>() / total as f64;

        Self {
            total,
            success_count,
            soft_fail_count,
            hard_fail_count,
            success_rate: success_count as f64 / total as f64,
            avg_latency_ms,
            p50_latency_ms: percentile(&latencies, 0.50),
            p95_latency_ms: percentile(&latencies, 0.95),
            p99_latency_ms: percentile(&latencies, 0.99),
            avg_retry_count,
        }
    }

    pub fn empty() -> Self {
        Self {
            total: 0,
            success_count: 0,
            soft_fail_count: 0,
            hard_fail_count: 0,
            success_rate: 0.0,
            avg_latency_ms: 0.0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            avg_retry_count: 0.0,
        }
    }
}

/// Per-dimension aggregates for one cycle's window contents.
#[derive(Debug, Clone, Default)]
pub struct WindowStats {
    pub by_dimension: HashMap<Dimension, DimensionStats>,
}

impl WindowStats {
    pub fn global(&self) -> DimensionStats {
        self.by_dimension
            .get(&Dimension::Global)
            .cloned()
            .unwrap_or_else(DimensionStats::empty)
    }

    pub fn get(&self, dimension: &Dimension) -> Option<&DimensionStats> {
        self.by_dimension.get(dimension)
    }
}

/// Time-bounded view of recent transactions.
pub struct ObservationWindow {
    duration_ms: u64,
    transactions: Vec<Transaction>,
}

impl ObservationWindow {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            transactions: Vec::new(),
        }
    }

    /// Replace the window contents with the in-range slice of `source`.
    ///
    /// Retains only entries with `timestamp ∈ [now − W, now]`.
    pub fn refresh(&mut self, source: &[Transaction], now_ms: u64) {
        let window_start = now_ms.saturating_sub(self.duration_ms);
        self.transactions = source
            .iter()
            .filter(|t| t.timestamp_ms >= window_start && t.timestamp_ms <= now_ms)
            .cloned()
            .collect();
        debug!(
            target: crate::log_targets::OBSERVE,
            retained = self.transactions.len(),
            window_start,
            now_ms,
            "Window refreshed"
        );
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Compute aggregates for every dimension group present in the window,
    /// plus the global group.
    pub fn aggregate(&self) -> WindowStats {
        let mut groups: HashMap<Dimension, Vec<&Transaction>> = HashMap::new();
        for txn in &self.transactions {
            groups.entry(Dimension::Global).or_default().push(txn);
            groups
                .entry(Dimension::Issuer(txn.issuer))
                .or_default()
                .push(txn);
            groups
                .entry(Dimension::Method(txn.method))
                .or_default()
                .push(txn);
            groups
                .entry(Dimension::Geo(txn.geography))
                .or_default()
                .push(txn);
        }

        let by_dimension = groups
            .into_iter()
            .map(|(dim, txns)| (dim, DimensionStats::from_transactions(&txns)))
            .collect();
        WindowStats { by_dimension }
    }
}

/// Nearest-rank percentile over a pre-sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((q * sorted.len() as f64) as usize).min(sorted.len() - 1);
    sorted[idx]
}

//! Rolling EWMA baselines per dimension.
//!
//! Each baseline tracks an exponentially weighted mean and an EWMA of
//! squared deviation (variance) for success rate, latency, and retry rate.
//! Baselines are created lazily on first sighting of a dimension key and are
//! never reset within a run: they roll forward cycle over cycle, which is
//! what makes the Z-scores in reasoning meaningful.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::observation::window::WindowStats;
use crate::types::Dimension;

/// Metric tracked by a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SuccessRate,
    LatencyMs,
    RetryRate,
}

/// Std-dev floors guarding the Z-score against degenerate variance.
const MIN_STD_SUCCESS: f64 = 0.01;
const MIN_STD_LATENCY: f64 = 10.0;
const MIN_STD_RETRY: f64 = 0.1;

/// EWMA baseline of one dimension's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingBaseline {
    pub success_rate_ewma: f64,
    pub latency_ewma: f64,
    pub retry_rate_ewma: f64,
    pub success_rate_var: f64,
    pub latency_var: f64,
    pub retry_rate_var: f64,
    pub sample_count: u64,
    pub last_updated_ms: u64,
    pub alpha: f64,
}

impl RollingBaseline {
    pub fn new(alpha: f64) -> Self {
        Self {
            success_rate_ewma: 0.0,
            latency_ewma: 0.0,
            retry_rate_ewma: 0.0,
            success_rate_var: 0.0,
            latency_var: 0.0,
            retry_rate_var: 0.0,
            sample_count: 0,
            last_updated_ms: 0,
            alpha,
        }
    }

    /// Fold one cycle's observation into the baseline.
    ///
    /// `μ ← (1−α)μ + αx`, then `v ← (1−α)v + α(x−μ)²`.
    pub fn update(&mut self, success_rate: f64, latency_ms: f64, retry_rate: f64, now_ms: u64) {
        if self.sample_count == 0 {
            self.success_rate_ewma = success_rate;
            self.latency_ewma = latency_ms;
            self.retry_rate_ewma = retry_rate;
        } else {
            let a = self.alpha;
            self.success_rate_ewma = (1.0 - a) * self.success_rate_ewma + a * success_rate;
            self.latency_ewma = (1.0 - a) * self.latency_ewma + a * latency_ms;
            self.retry_rate_ewma = (1.0 - a) * self.retry_rate_ewma + a * retry_rate;

            self.success_rate_var = (1.0 - a) * self.success_rate_var
                + a * (success_rate - self.success_rate_ewma).powi(2);
            self.latency_var =
                (1.0 - a) * self.latency_var + a * (latency_ms - self.latency_ewma).powi(2);
            self.retry_rate_var =
                (1.0 - a) * self.retry_rate_var + a * (retry_rate - self.retry_rate_ewma).powi(2);
        }
        self.sample_count += 1;
        self.last_updated_ms = now_ms;
    }

    pub fn mean(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SuccessRate => self.success_rate_ewma,
            Metric::LatencyMs => self.latency_ewma,
            Metric::RetryRate => self.retry_rate_ewma,
        }
    }

    /// Standard deviation with a per-metric floor.
    pub fn std(&self, metric: Metric) -> f64 {
        match metric {
            Metric::SuccessRate => self.success_rate_var.sqrt().max(MIN_STD_SUCCESS),
            Metric::LatencyMs => self.latency_var.sqrt().max(MIN_STD_LATENCY),
            Metric::RetryRate => self.retry_rate_var.sqrt().max(MIN_STD_RETRY),
        }
    }

    /// Signed Z-score of `value` against this baseline.
    pub fn z_score(&self, value: f64, metric: Metric) -> f64 {
        (value - self.mean(metric)) / self.std(metric)
    }
}

/// Owns all rolling baselines, keyed by dimension.
pub struct BaselineManager {
    baselines: HashMap<Dimension, RollingBaseline>,
    alpha: f64,
}

impl BaselineManager {
    pub fn new(alpha: f64) -> Self {
        Self {
            baselines: HashMap::new(),
            alpha,
        }
    }

    /// Fold one cycle's window aggregates into the baselines. Creates a
    /// baseline lazily for any dimension seen for the first time.
    pub fn update(&mut self, stats: &WindowStats, now_ms: u64) {
        for (dimension, dim_stats) in &stats.by_dimension {
            if dim_stats.total == 0 {
                continue;
            }
            let baseline = self
                .baselines
                .entry(*dimension)
                .or_insert_with(|| RollingBaseline::new(self.alpha));
            baseline.update(
                dim_stats.success_rate,
                dim_stats.avg_latency_ms,
                dim_stats.avg_retry_count,
                now_ms,
            );
            debug!(
                target: crate::log_targets::OBSERVE,
                dimension = %dimension,
                success_ewma = baseline.success_rate_ewma,
                samples = baseline.sample_count,
                "Baseline updated"
            );
        }
    }

    pub fn get(&self, dimension: &Dimension) -> Option<&RollingBaseline> {
        self.baselines.get(dimension)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    /// Serializable copy of all baselines, for the snapshot.
    pub fn export(&self) -> Vec<(Dimension, RollingBaseline)> {
        let mut entries: Vec<_> = self
            .baselines
            .iter()
            .map(|(d, b)| (*d, b.clone()))
            .collect();
        entries.sort_by_key(|(d, _)| *d);
        entries
    }

    /// Restore baselines from a snapshot, replacing current contents.
    pub fn restore(&mut self, entries: Vec<(Dimension, RollingBaseline)>) {
        self.baselines = entries.into_iter().collect();
    }
}

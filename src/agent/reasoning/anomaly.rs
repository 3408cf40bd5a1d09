//! Z-score anomaly scan of window aggregates against rolling baselines.

use tracing::{debug, warn};

use crate::agent::observation::{BaselineManager, Metric, WindowStats};
use crate::types::Dimension;

/// One metric on one dimension exceeding the anomaly threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalySignal {
    pub dimension: Dimension,
    pub metric: Metric,
    /// Signed Z-score.
    pub z: f64,
    pub observed: f64,
    pub baseline_mean: f64,
    pub sample_size: usize,
}

/// Scans every dimension's success rate, latency, and retry rate.
///
/// Two gates suppress emission: the window must hold at least `min_samples`
/// transactions for the dimension, and the baseline must have folded in at
/// least `min_baseline_cycles` observations. Under-sampled dimensions never
/// raise a signal.
pub struct AnomalyDetector {
    threshold: f64,
    min_samples: usize,
    min_baseline_cycles: u64,
}

impl AnomalyDetector {
    pub fn new(threshold: f64, min_samples: usize, min_baseline_cycles: u64) -> Self {
        Self {
            threshold,
            min_samples,
            min_baseline_cycles,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Flag every (dimension, metric) with `|z| > threshold`.
    pub fn scan(&self, stats: &WindowStats, baselines: &BaselineManager) -> Vec<AnomalySignal> {
        let mut signals = Vec::new();

        for (dimension, dim_stats) in &stats.by_dimension {
            if dim_stats.total < self.min_samples {
                debug!(
                    target: crate::log_targets::REASON,
                    dimension = %dimension,
                    samples = dim_stats.total,
                    "Under-sampled, anomaly scan skipped"
                );
                continue;
            }
            let Some(baseline) = baselines.get(dimension) else {
                continue;
            };
            if baseline.sample_count < self.min_baseline_cycles {
                continue;
            }

            let candidates = [
                (Metric::SuccessRate, dim_stats.success_rate),
                (Metric::LatencyMs, dim_stats.avg_latency_ms),
                (Metric::RetryRate, dim_stats.avg_retry_count),
            ];
            for (metric, observed) in candidates {
                let z = baseline.z_score(observed, metric);
                if z.abs() > self.threshold {
                    warn!(
                        target: crate::log_targets::REASON,
                        dimension = %dimension,
                        metric = ?metric,
                        z = format!("{z:.2}"),
                        observed,
                        baseline = baseline.mean(metric),
                        "Anomaly flagged"
                    );
                    signals.push(AnomalySignal {
                        dimension: *dimension,
                        metric,
                        z,
                        observed,
                        baseline_mean: baseline.mean(metric),
                        sample_size: dim_stats.total,
                    });
                }
            }
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::observation::window::DimensionStats;
    use crate::types::Issuer;

    fn stats_for(dim: Dimension, success: f64, total: usize) -> WindowStats {
        let mut stats = WindowStats::default();
        stats.by_dimension.insert(
            dim,
            DimensionStats {
                total,
                success_count: (success * total as f64) as usize,
                soft_fail_count: 0,
                hard_fail_count: 0,
                success_rate: success,
                avg_latency_ms: 200.0,
                p50_latency_ms: 180.0,
                p95_latency_ms: 350.0,
                p99_latency_ms: 500.0,
                avg_retry_count: 0.05,
            },
        );
        stats
    }

    fn warmed_baselines(dim: Dimension) -> BaselineManager {
        let mut mgr = BaselineManager::new(0.1);
        for i in 0..10u64 {
            mgr.update(&stats_for(dim, 0.95, 200), i * 1_000);
        }
        mgr
    }

    #[test]
    fn test_large_drop_is_flagged_negative() {
        let dim = Dimension::Issuer(Issuer::Icici);
        let baselines = warmed_baselines(dim);
        let detector = AnomalyDetector::new(2.0, 50, 3);

        let signals = detector.scan(&stats_for(dim, 0.5, 200), &baselines);
        let success = signals
            .iter()
            .find(|s| s.metric == Metric::SuccessRate)
            .expect("success-rate anomaly");
        assert!(success.z < -2.0);
    }

    #[test]
    fn test_min_sample_gate_suppresses() {
        let dim = Dimension::Issuer(Issuer::Icici);
        let baselines = warmed_baselines(dim);
        let detector = AnomalyDetector::new(2.0, 50, 3);

        // Massive deviation, but only 20 samples in the window.
        let signals = detector.scan(&stats_for(dim, 0.1, 20), &baselines);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_cold_baseline_suppresses() {
        let dim = Dimension::Issuer(Issuer::Icici);
        let mut baselines = BaselineManager::new(0.1);
        baselines.update(&stats_for(dim, 0.95, 200), 0);
        let detector = AnomalyDetector::new(2.0, 50, 3);

        let signals = detector.scan(&stats_for(dim, 0.2, 200), &baselines);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_nominal_traffic_not_flagged() {
        let dim = Dimension::Issuer(Issuer::Icici);
        let baselines = warmed_baselines(dim);
        let detector = AnomalyDetector::new(2.0, 50, 3);

        let signals = detector.scan(&stats_for(dim, 0.945, 200), &baselines);
        assert!(signals.is_empty());
    }
}

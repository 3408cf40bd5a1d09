//! Pattern classification: flagged dimensions map into a closed set of
//! failure families that the planner knows how to act on.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::observation::{BaselineManager, Metric, WindowStats};
use crate::agent::reasoning::anomaly::AnomalySignal;
use crate::types::Dimension;

/// Closed set of failure families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    IssuerDegradation,
    IssuerOutage,
    RetryStorm,
    MethodFatigue,
    LatencySpike,
    SystemicFailure,
    LocalizedFailure,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::IssuerDegradation => "issuer_degradation",
            PatternType::IssuerOutage => "issuer_outage",
            PatternType::RetryStorm => "retry_storm",
            PatternType::MethodFatigue => "method_fatigue",
            PatternType::LatencySpike => "latency_spike",
            PatternType::SystemicFailure => "systemic_failure",
            PatternType::LocalizedFailure => "localized_failure",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed fact supporting a pattern or hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub description: String,
    pub value: f64,
}

impl Evidence {
    pub fn new(description: impl Into<String>, value: f64) -> Self {
        Self {
            description: description.into(),
            value,
        }
    }
}

/// A classified failure pattern with its supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern: PatternType,
    pub dimension: Dimension,
    /// Severity in [0,1].
    pub severity: f64,
    pub evidence: Vec<Evidence>,
    pub detected_at_ms: u64,
}

/// Maps anomaly signals (plus a few absolute thresholds) to pattern families.
pub struct PatternClassifier {
    threshold: f64,
    /// Absolute success rate below which an issuer counts as an outage.
    outage_success_floor: f64,
    /// Absolute average retry count above which a retry storm is declared.
    retry_rate_ceiling: f64,
    /// P95 latency SLA in milliseconds.
    sla_p95_ms: f64,
    min_samples: usize,
}

impl PatternClassifier {
    pub fn new(threshold: f64, sla_p95_ms: f64, min_samples: usize) -> Self {
        Self {
            threshold,
            outage_success_floor: 0.4,
            retry_rate_ceiling: 0.3,
            sla_p95_ms,
            min_samples,
        }
    }

    /// Classify this cycle's signals into patterns.
    ///
    /// Absolute-threshold families (outage, retry storm, latency SLA) do not
    /// require a Z-flag: a freshly degraded baseline must not mask a hard
    /// outage.
    pub fn classify(
        &self,
        signals: &[AnomalySignal],
        stats: &WindowStats,
        baselines: &BaselineManager,
        now_ms: u64,
    ) -> Vec<DetectedPattern> {
        let mut patterns = Vec::new();

        let global_success_z = self.z_for(stats, baselines, Dimension::Global, Metric::SuccessRate);

        let mut flagged_issuers = 0usize;

        for (dimension, dim_stats) in &stats.by_dimension {
            if dim_stats.total < self.min_samples {
                continue;
            }

            match dimension {
                Dimension::Issuer(_) => {
                    let success_z = signals
                        .iter()
                        .find(|s| s.dimension == *dimension && s.metric == Metric::SuccessRate)
                        .map(|s| s.z);

                    if dim_stats.success_rate < self.outage_success_floor {
                        flagged_issuers += 1;
                        patterns.push(DetectedPattern {
                            pattern: PatternType::IssuerOutage,
                            dimension: *dimension,
                            severity: (1.0 - dim_stats.success_rate).clamp(0.0, 1.0),
                            evidence: vec![Evidence::new(
                                format!(
                                    "success rate {:.1}% below outage floor {:.0}%",
                                    dim_stats.success_rate * 100.0,
                                    self.outage_success_floor * 100.0
                                ),
                                dim_stats.success_rate,
                            )],
                            detected_at_ms: now_ms,
                        });
                    } else if let Some(z) = success_z {
                        if z < -self.threshold && global_success_z.unwrap_or(0.0) <= 0.0 {
                            flagged_issuers += 1;
                            patterns.push(DetectedPattern {
                                pattern: PatternType::IssuerDegradation,
                                dimension: *dimension,
                                severity: self.severity_from_z(z),
                                evidence: vec![
                                    Evidence::new(format!("success-rate Z {z:.2}"), z),
                                    Evidence::new(
                                        format!(
                                            "observed success rate {:.1}%",
                                            dim_stats.success_rate * 100.0
                                        ),
                                        dim_stats.success_rate,
                                    ),
                                ],
                                detected_at_ms: now_ms,
                            });
                        }
                    }
                }
                Dimension::Method(_) => {
                    if let Some(signal) = signals
                        .iter()
                        .find(|s| s.dimension == *dimension && s.metric == Metric::SuccessRate)
                    {
                        if signal.z < -self.threshold {
                            patterns.push(DetectedPattern {
                                pattern: PatternType::MethodFatigue,
                                dimension: *dimension,
                                severity: self.severity_from_z(signal.z),
                                evidence: vec![Evidence::new(
                                    format!("method success-rate Z {:.2}", signal.z),
                                    signal.z,
                                )],
                                detected_at_ms: now_ms,
                            });
                        }
                    }
                }
                _ => {}
            }

            // Retry storm: Z-flag or absolute ceiling, issuer or global scope.
            if matches!(dimension, Dimension::Issuer(_) | Dimension::Global) {
                let retry_z = signals
                    .iter()
                    .find(|s| s.dimension == *dimension && s.metric == Metric::RetryRate)
                    .map(|s| s.z)
                    .unwrap_or(0.0);
                if retry_z > self.threshold || dim_stats.avg_retry_count > self.retry_rate_ceiling
                {
                    patterns.push(DetectedPattern {
                        pattern: PatternType::RetryStorm,
                        dimension: *dimension,
                        severity: (dim_stats.avg_retry_count / (2.0 * self.retry_rate_ceiling))
                            .max(self.severity_from_z(retry_z))
                            .clamp(0.0, 1.0),
                        evidence: vec![
                            Evidence::new(
                                format!("avg retry count {:.2}", dim_stats.avg_retry_count),
                                dim_stats.avg_retry_count,
                            ),
                            Evidence::new(
                                format!(
                                    "retry ceiling {:.2}, retry Z {:.2}",
                                    self.retry_rate_ceiling, retry_z
                                ),
                                retry_z,
                            ),
                        ],
                        detected_at_ms: now_ms,
                    });
                }
            }

            // Latency spike: Z-flag or p95 SLA breach.
            let latency_z = signals
                .iter()
                .find(|s| s.dimension == *dimension && s.metric == Metric::LatencyMs)
                .map(|s| s.z)
                .unwrap_or(0.0);
            if latency_z > self.threshold || dim_stats.p95_latency_ms > self.sla_p95_ms {
                patterns.push(DetectedPattern {
                    pattern: PatternType::LatencySpike,
                    dimension: *dimension,
                    severity: self
                        .severity_from_z(latency_z)
                        .max(
                            ((dim_stats.p95_latency_ms / self.sla_p95_ms) - 1.0).clamp(0.0, 1.0),
                        ),
                    evidence: vec![Evidence::new(
                        format!(
                            "p95 latency {:.0}ms (Z {:.2}, SLA {:.0}ms)",
                            dim_stats.p95_latency_ms, latency_z, self.sla_p95_ms
                        ),
                        dim_stats.p95_latency_ms,
                    )],
                    detected_at_ms: now_ms,
                });
            }
        }

        // Global scope classification: systemic when at least three issuers
        // are individually failing, localized otherwise.
        if let Some(gz) = global_success_z {
            if gz < -self.threshold {
                let (pattern, severity) = if flagged_issuers >= 3 {
                    (PatternType::SystemicFailure, self.severity_from_z(gz).max(0.8))
                } else {
                    (PatternType::LocalizedFailure, self.severity_from_z(gz))
                };
                patterns.push(DetectedPattern {
                    pattern,
                    dimension: Dimension::Global,
                    severity,
                    evidence: vec![
                        Evidence::new(format!("global success-rate Z {gz:.2}"), gz),
                        Evidence::new(
                            format!("{flagged_issuers} issuer(s) individually flagged"),
                            flagged_issuers as f64,
                        ),
                    ],
                    detected_at_ms: now_ms,
                });
            }
        }

        for p in &patterns {
            info!(
                target: crate::log_targets::REASON,
                pattern = %p.pattern,
                dimension = %p.dimension,
                severity = format!("{:.2}", p.severity),
                "Pattern classified"
            );
        }
        patterns
    }

    fn severity_from_z(&self, z: f64) -> f64 {
        (z.abs() / (2.0 * self.threshold)).clamp(0.0, 1.0)
    }

    fn z_for(
        &self,
        stats: &WindowStats,
        baselines: &BaselineManager,
        dimension: Dimension,
        metric: Metric,
    ) -> Option<f64> {
        let dim_stats = stats.get(&dimension)?;
        if dim_stats.total < self.min_samples {
            return None;
        }
        let baseline = baselines.get(&dimension)?;
        let value = match metric {
            Metric::SuccessRate => dim_stats.success_rate,
            Metric::LatencyMs => dim_stats.avg_latency_ms,
            Metric::RetryRate => dim_stats.avg_retry_count,
        };
        Some(baseline.z_score(value, metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::observation::window::DimensionStats;
    use crate::types::Issuer;

    fn dim_stats(success: f64, retry: f64, p95: f64, total: usize) -> DimensionStats {
        DimensionStats {
            total,
            success_count: (success * total as f64) as usize,
            soft_fail_count: 0,
            hard_fail_count: 0,
            success_rate: success,
            avg_latency_ms: p95 * 0.6,
            p50_latency_ms: p95 * 0.5,
            p95_latency_ms: p95,
            p99_latency_ms: p95 * 1.2,
            avg_retry_count: retry,
        }
    }

    fn healthy_baselines(stats: &WindowStats) -> BaselineManager {
        let mut mgr = BaselineManager::new(0.1);
        let mut healthy = WindowStats::default();
        for dim in stats.by_dimension.keys() {
            healthy
                .by_dimension
                .insert(*dim, dim_stats(0.95, 0.05, 350.0, 200));
        }
        for i in 0..10u64 {
            mgr.update(&healthy, i * 1_000);
        }
        mgr
    }

    #[test]
    fn test_outage_classified_on_absolute_floor() {
        let mut stats = WindowStats::default();
        stats
            .by_dimension
            .insert(Dimension::Issuer(Issuer::Icici), dim_stats(0.3, 0.05, 350.0, 200));
        let baselines = healthy_baselines(&stats);

        let classifier = PatternClassifier::new(2.0, 1_000.0, 50);
        let patterns = classifier.classify(&[], &stats, &baselines, 1_000);
        assert!(patterns
            .iter()
            .any(|p| p.pattern == PatternType::IssuerOutage
                && p.dimension == Dimension::Issuer(Issuer::Icici)));
    }

    #[test]
    fn test_retry_storm_on_absolute_ceiling() {
        let mut stats = WindowStats::default();
        stats
            .by_dimension
            .insert(Dimension::Global, dim_stats(0.95, 0.45, 350.0, 400));
        let baselines = healthy_baselines(&stats);

        let classifier = PatternClassifier::new(2.0, 1_000.0, 50);
        let patterns = classifier.classify(&[], &stats, &baselines, 1_000);
        assert!(patterns
            .iter()
            .any(|p| p.pattern == PatternType::RetryStorm && p.dimension == Dimension::Global));
    }

    #[test]
    fn test_latency_spike_on_sla_breach() {
        let mut stats = WindowStats::default();
        stats
            .by_dimension
            .insert(Dimension::Issuer(Issuer::Axis), dim_stats(0.95, 0.05, 1_500.0, 200));
        let baselines = healthy_baselines(&stats);

        let classifier = PatternClassifier::new(2.0, 1_000.0, 50);
        let patterns = classifier.classify(&[], &stats, &baselines, 1_000);
        assert!(patterns.iter().any(|p| p.pattern == PatternType::LatencySpike));
    }

    #[test]
    fn test_systemic_requires_three_flagged_issuers() {
        let mut stats = WindowStats::default();
        for issuer in [Issuer::Hdfc, Issuer::Icici, Issuer::Axis] {
            stats
                .by_dimension
                .insert(Dimension::Issuer(issuer), dim_stats(0.2, 0.05, 350.0, 200));
        }
        stats
            .by_dimension
            .insert(Dimension::Global, dim_stats(0.3, 0.05, 350.0, 600));
        let baselines = healthy_baselines(&stats);

        let classifier = PatternClassifier::new(2.0, 1_000.0, 50);
        let patterns = classifier.classify(&[], &stats, &baselines, 1_000);
        assert!(patterns
            .iter()
            .any(|p| p.pattern == PatternType::SystemicFailure));
    }

    #[test]
    fn test_single_issuer_failure_is_localized_globally() {
        let mut stats = WindowStats::default();
        stats
            .by_dimension
            .insert(Dimension::Issuer(Issuer::Icici), dim_stats(0.1, 0.05, 350.0, 200));
        for issuer in [Issuer::Hdfc, Issuer::Axis, Issuer::Sbi] {
            stats
                .by_dimension
                .insert(Dimension::Issuer(issuer), dim_stats(0.95, 0.05, 350.0, 200));
        }
        stats
            .by_dimension
            .insert(Dimension::Global, dim_stats(0.74, 0.05, 350.0, 800));
        let baselines = healthy_baselines(&stats);

        let classifier = PatternClassifier::new(2.0, 1_000.0, 50);
        let patterns = classifier.classify(&[], &stats, &baselines, 1_000);
        assert!(patterns
            .iter()
            .any(|p| p.pattern == PatternType::LocalizedFailure));
        assert!(!patterns
            .iter()
            .any(|p| p.pattern == PatternType::SystemicFailure));
    }
}

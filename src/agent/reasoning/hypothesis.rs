//! Competing root-cause hypotheses for detected patterns.
//!
//! Where a pattern admits more than one explanation, at least two hypotheses
//! are emitted so the belief layer can express genuine uncertainty instead
//! of overcommitting to the first story.

use serde::{Deserialize, Serialize};

use crate::agent::reasoning::pattern::{DetectedPattern, Evidence, PatternType};
use crate::types::Dimension;

/// Expected system impact if a hypothesis is true.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub success_rate_impact: f64,
    pub latency_impact_ms: f64,
    pub cost_impact: f64,
    pub risk_impact: f64,
}

/// One candidate explanation for a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: u64,
    pub root_cause: String,
    pub description: String,
    pub dimension: Dimension,
    pub confidence: f64,
    pub supporting_evidence: Vec<Evidence>,
    pub contradicting_evidence: Vec<Evidence>,
    pub expected_impact: ImpactEstimate,
}

/// Fraction of the remaining headroom gained per supporting item. Keeps the
/// update strictly increasing while bounded below 1.0.
const SUPPORT_GAIN: f64 = 0.15;
/// Multiplicative haircut per contradicting item.
const CONTRADICT_LOSS: f64 = 0.20;

impl Hypothesis {
    /// Attach supporting evidence; confidence rises strictly.
    pub fn add_supporting(&mut self, evidence: Evidence) {
        self.confidence += (1.0 - self.confidence) * SUPPORT_GAIN;
        self.confidence = self.confidence.min(1.0);
        self.supporting_evidence.push(evidence);
    }

    /// Attach contradicting evidence; confidence falls.
    pub fn add_contradicting(&mut self, evidence: Evidence) {
        self.confidence *= 1.0 - CONTRADICT_LOSS;
        self.contradicting_evidence.push(evidence);
    }
}

/// Builds hypotheses from patterns. Stateless apart from the id counter.
pub struct HypothesisGenerator {
    next_id: u64,
}

impl HypothesisGenerator {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    pub fn generate(&mut self, patterns: &[DetectedPattern]) -> Vec<Hypothesis> {
        let mut hypotheses = Vec::new();
        for pattern in patterns {
            let candidates: Vec<(&str, &str, f64, ImpactEstimate)> = match pattern.pattern {
                PatternType::IssuerDegradation => vec![
                    (
                        "issuer_side_degradation",
                        "Issuer-side service degradation",
                        0.35,
                        ImpactEstimate {
                            success_rate_impact: -0.2,
                            latency_impact_ms: 100.0,
                            cost_impact: 0.0,
                            risk_impact: 0.1,
                        },
                    ),
                    (
                        "gateway_throttling",
                        "Gateway-side throttling toward the issuer",
                        0.25,
                        ImpactEstimate {
                            success_rate_impact: -0.15,
                            latency_impact_ms: 200.0,
                            cost_impact: 0.0,
                            risk_impact: 0.05,
                        },
                    ),
                ],
                PatternType::IssuerOutage => vec![
                    (
                        "issuer_outage",
                        "Issuer hard outage",
                        0.5,
                        ImpactEstimate {
                            success_rate_impact: -0.5,
                            latency_impact_ms: 300.0,
                            cost_impact: 0.1,
                            risk_impact: 0.2,
                        },
                    ),
                    (
                        "issuer_maintenance",
                        "Unannounced issuer maintenance window",
                        0.25,
                        ImpactEstimate {
                            success_rate_impact: -0.4,
                            latency_impact_ms: 100.0,
                            cost_impact: 0.0,
                            risk_impact: 0.1,
                        },
                    ),
                ],
                PatternType::RetryStorm => vec![
                    (
                        "retry_amplification",
                        "Retries amplifying load on a degraded path",
                        0.5,
                        ImpactEstimate {
                            success_rate_impact: -0.1,
                            latency_impact_ms: 150.0,
                            cost_impact: 0.2,
                            risk_impact: 0.15,
                        },
                    ),
                    (
                        "client_retry_misconfig",
                        "Client-side retry policy misconfiguration",
                        0.2,
                        ImpactEstimate {
                            success_rate_impact: -0.05,
                            latency_impact_ms: 50.0,
                            cost_impact: 0.15,
                            risk_impact: 0.05,
                        },
                    ),
                ],
                PatternType::MethodFatigue => vec![
                    (
                        "rail_degradation",
                        "Payment-rail-wide degradation",
                        0.3,
                        ImpactEstimate {
                            success_rate_impact: -0.25,
                            latency_impact_ms: 50.0,
                            cost_impact: 0.0,
                            risk_impact: 0.1,
                        },
                    ),
                    (
                        "provider_throttling",
                        "Method provider throttling traffic",
                        0.25,
                        ImpactEstimate {
                            success_rate_impact: -0.15,
                            latency_impact_ms: 100.0,
                            cost_impact: 0.05,
                            risk_impact: 0.05,
                        },
                    ),
                ],
                PatternType::LatencySpike => vec![
                    (
                        "system_overload",
                        "Processing overload raising tail latency",
                        0.3,
                        ImpactEstimate {
                            success_rate_impact: -0.05,
                            latency_impact_ms: 300.0,
                            cost_impact: 0.1,
                            risk_impact: 0.2,
                        },
                    ),
                    (
                        "network_congestion",
                        "Network congestion on the issuer link",
                        0.25,
                        ImpactEstimate {
                            success_rate_impact: -0.02,
                            latency_impact_ms: 250.0,
                            cost_impact: 0.0,
                            risk_impact: 0.1,
                        },
                    ),
                ],
                PatternType::SystemicFailure => vec![
                    (
                        "gateway_failure",
                        "Gateway-level failure affecting all issuers",
                        0.45,
                        ImpactEstimate {
                            success_rate_impact: -0.4,
                            latency_impact_ms: 400.0,
                            cost_impact: 0.3,
                            risk_impact: 0.4,
                        },
                    ),
                    (
                        "upstream_network_failure",
                        "Upstream network partition",
                        0.3,
                        ImpactEstimate {
                            success_rate_impact: -0.35,
                            latency_impact_ms: 500.0,
                            cost_impact: 0.2,
                            risk_impact: 0.3,
                        },
                    ),
                ],
                PatternType::LocalizedFailure => vec![(
                    "localized_failure",
                    "Failure localized to flagged dimensions",
                    0.3,
                    ImpactEstimate {
                        success_rate_impact: -0.1,
                        latency_impact_ms: 100.0,
                        cost_impact: 0.05,
                        risk_impact: 0.1,
                    },
                )],
            };

            for (root_cause, description, base_confidence, impact) in candidates {
                let mut hypothesis = Hypothesis {
                    id: self.next_id,
                    root_cause: root_cause.to_string(),
                    description: description.to_string(),
                    dimension: pattern.dimension,
                    // Seed from the pattern's severity, then let evidence move it.
                    confidence: (base_confidence + 0.2 * pattern.severity).clamp(0.0, 1.0),
                    supporting_evidence: Vec::new(),
                    contradicting_evidence: Vec::new(),
                    expected_impact: impact,
                };
                self.next_id += 1;
                for evidence in &pattern.evidence {
                    hypothesis.add_supporting(evidence.clone());
                }
                hypotheses.push(hypothesis);
            }
        }
        hypotheses
    }
}

impl Default for HypothesisGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Issuer;

    fn degradation_pattern() -> DetectedPattern {
        DetectedPattern {
            pattern: PatternType::IssuerDegradation,
            dimension: Dimension::Issuer(Issuer::Icici),
            severity: 0.6,
            evidence: vec![Evidence::new("success-rate Z -2.8", -2.8)],
            detected_at_ms: 1_000,
        }
    }

    #[test]
    fn test_ambiguous_patterns_get_competing_hypotheses() {
        let mut gen = HypothesisGenerator::new();
        let hyps = gen.generate(&[degradation_pattern()]);
        assert!(hyps.len() >= 2);
        let causes: Vec<&str> = hyps.iter().map(|h| h.root_cause.as_str()).collect();
        assert!(causes.contains(&"issuer_side_degradation"));
        assert!(causes.contains(&"gateway_throttling"));
    }

    #[test]
    fn test_confidence_strictly_rises_with_support() {
        let mut gen = HypothesisGenerator::new();
        let mut hyp = gen.generate(&[degradation_pattern()]).remove(0);

        let mut last = hyp.confidence;
        for i in 0..20 {
            hyp.add_supporting(Evidence::new(format!("obs {i}"), 1.0));
            assert!(hyp.confidence > last, "confidence must rise strictly");
            assert!(hyp.confidence <= 1.0);
            last = hyp.confidence;
        }
    }

    #[test]
    fn test_confidence_falls_with_contradiction() {
        let mut gen = HypothesisGenerator::new();
        let mut hyp = gen.generate(&[degradation_pattern()]).remove(0);
        let before = hyp.confidence;
        hyp.add_contradicting(Evidence::new("other issuers also degraded", 1.0));
        assert!(hyp.confidence < before);
        assert!(hyp.confidence >= 0.0);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut gen = HypothesisGenerator::new();
        let hyps = gen.generate(&[degradation_pattern(), degradation_pattern()]);
        let mut ids: Vec<u64> = hyps.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), hyps.len());
    }
}

//! Pre-mortem guardrails: declarative bounds every option must clear before
//! it can be executed autonomously.

use std::collections::HashSet;

use tracing::warn;

use crate::intervention::{InterventionOption, InterventionType};

/// Result of evaluating one option against the guardrails.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardrailOutcome {
    /// Safe to execute autonomously.
    Pass,
    /// Within hard bounds but above the autonomy envelope; a human must
    /// approve before execution.
    RequiresApproval(String),
    /// Violates a hard bound; never executed.
    Rejected(String),
}

impl GuardrailOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardrailOutcome::Pass => "pass",
            GuardrailOutcome::RequiresApproval(_) => "requires_approval",
            GuardrailOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Safety bounds from config.
#[derive(Debug, Clone)]
pub struct Guardrails {
    /// Largest allowed retry-probability multiplier for retry-shaping
    /// interventions.
    pub max_retry_adjustment: f64,
    /// Longest allowed suppression/reroute duration.
    pub max_suppression_duration_ms: u64,
    /// Targets that must never be acted on autonomously (rendered form,
    /// e.g. "issuer:SBI").
    pub protected_targets: HashSet<String>,
    /// Above this blast radius, low-confidence actions escalate.
    pub max_blast_radius_for_autonomy: f64,
    /// Below this hypothesis confidence, wide-blast actions escalate.
    pub min_confidence_for_action: f64,
}

impl Default for Guardrails {
    fn default() -> Self {
        Self {
            max_retry_adjustment: 2.0,
            max_suppression_duration_ms: 600_000,
            protected_targets: HashSet::new(),
            max_blast_radius_for_autonomy: 0.3,
            min_confidence_for_action: 0.7,
        }
    }
}

impl Guardrails {
    /// Evaluate an option given the current best hypothesis confidence.
    pub fn evaluate(&self, option: &InterventionOption, confidence: f64) -> GuardrailOutcome {
        let target = option.target.to_string();
        if self.protected_targets.contains(&target) {
            warn!(
                target: crate::log_targets::DECIDE,
                kind = %option.kind,
                intervention_target = %target,
                "Guardrail: protected target"
            );
            return GuardrailOutcome::Rejected(format!("target {target} is protected"));
        }

        match option.kind {
            InterventionType::SuppressPath | InterventionType::RerouteTraffic => {
                if option.parameters.duration_ms > self.max_suppression_duration_ms {
                    return GuardrailOutcome::Rejected(format!(
                        "duration {}ms exceeds max {}ms",
                        option.parameters.duration_ms, self.max_suppression_duration_ms
                    ));
                }
            }
            InterventionType::AdjustRetry | InterventionType::ReduceRetryAttempts => {
                if let Some(multiplier) = option.parameters.retry_multiplier {
                    if multiplier > self.max_retry_adjustment {
                        return GuardrailOutcome::Rejected(format!(
                            "retry multiplier {multiplier:.2} exceeds max {:.2}",
                            self.max_retry_adjustment
                        ));
                    }
                }
            }
            InterventionType::AlertOps | InterventionType::NoAction => {}
        }

        if option.blast_radius > self.max_blast_radius_for_autonomy
            && confidence < self.min_confidence_for_action
        {
            return GuardrailOutcome::RequiresApproval(format!(
                "blast radius {:.2} > {:.2} with confidence {:.2} < {:.2}",
                option.blast_radius,
                self.max_blast_radius_for_autonomy,
                confidence,
                self.min_confidence_for_action
            ));
        }

        GuardrailOutcome::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::{
        InterventionParameters, InterventionTarget, OutcomeEstimate, Tradeoffs,
    };
    use crate::types::Issuer;

    fn option(kind: InterventionType, duration_ms: u64, blast: f64) -> InterventionOption {
        InterventionOption {
            kind,
            target: InterventionTarget::Issuer(Issuer::Sbi),
            parameters: InterventionParameters::with_duration(duration_ms, "test"),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.1,
                latency_change_ms: 0.0,
                cost_change: 0.0,
                confidence: 0.7,
            },
            tradeoffs: Tradeoffs::NEUTRAL,
            reversible: true,
            blast_radius: blast,
        }
    }

    #[test]
    fn test_overlong_suppression_rejected() {
        let rails = Guardrails::default();
        let outcome = rails.evaluate(
            &option(InterventionType::SuppressPath, 900_000, 0.2),
            0.9,
        );
        assert!(matches!(outcome, GuardrailOutcome::Rejected(_)));
    }

    #[test]
    fn test_protected_target_rejected() {
        let mut rails = Guardrails::default();
        rails.protected_targets.insert("issuer:SBI".to_string());
        let outcome = rails.evaluate(&option(InterventionType::SuppressPath, 300_000, 0.2), 0.9);
        assert!(matches!(outcome, GuardrailOutcome::Rejected(_)));
    }

    #[test]
    fn test_wide_blast_low_confidence_escalates() {
        let rails = Guardrails::default();
        let outcome = rails.evaluate(
            &option(InterventionType::ReduceRetryAttempts, 300_000, 0.5),
            0.4,
        );
        assert!(matches!(outcome, GuardrailOutcome::RequiresApproval(_)));
    }

    #[test]
    fn test_wide_blast_high_confidence_passes() {
        let rails = Guardrails::default();
        let outcome = rails.evaluate(
            &option(InterventionType::ReduceRetryAttempts, 300_000, 0.5),
            0.9,
        );
        assert_eq!(outcome, GuardrailOutcome::Pass);
    }

    #[test]
    fn test_excessive_retry_adjustment_rejected() {
        let rails = Guardrails::default();
        let mut opt = option(InterventionType::AdjustRetry, 300_000, 0.1);
        opt.parameters.retry_multiplier = Some(3.0);
        assert!(matches!(
            rails.evaluate(&opt, 0.9),
            GuardrailOutcome::Rejected(_)
        ));
    }
}

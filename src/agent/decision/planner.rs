//! Option generation: for each active pattern, enumerate the intervention
//! types whose target domain matches.

use tracing::debug;

use crate::agent::reasoning::pattern::{DetectedPattern, PatternType};
use crate::intervention::{
    AlertSeverity, InterventionOption, InterventionParameters, InterventionTarget,
    InterventionType, OutcomeEstimate, Tradeoffs, DEFAULT_DURATION_MS,
};
use crate::types::Dimension;

pub struct InterventionPlanner {
    suppression_duration_ms: u64,
    retry_reduction_duration_ms: u64,
}

impl InterventionPlanner {
    pub fn new() -> Self {
        Self {
            suppression_duration_ms: DEFAULT_DURATION_MS,
            retry_reduction_duration_ms: 600_000,
        }
    }

    /// Enumerate candidate options for this cycle's patterns.
    ///
    /// `alert_ops` is always available (blast radius 0); `no_action` is
    /// always included so the policy compares acting against not acting.
    pub fn generate_options(&self, patterns: &[DetectedPattern]) -> Vec<InterventionOption> {
        let mut options = vec![Self::no_action_option()];

        for pattern in patterns {
            match pattern.pattern {
                PatternType::IssuerOutage | PatternType::IssuerDegradation => {
                    if let Dimension::Issuer(issuer) = pattern.dimension {
                        options.push(self.suppress_option(issuer, pattern));
                    }
                }
                PatternType::RetryStorm => {
                    options.push(self.reduce_retry_option(pattern));
                }
                PatternType::MethodFatigue => {
                    if let Dimension::Method(method) = pattern.dimension {
                        options.push(self.reroute_method_option(method, pattern));
                    }
                }
                PatternType::LatencySpike => {
                    if let Dimension::Issuer(issuer) = pattern.dimension {
                        options.push(self.reroute_issuer_option(issuer, pattern));
                    }
                }
                PatternType::SystemicFailure | PatternType::LocalizedFailure => {
                    // Fleet-wide failures go to a human; the standing alert
                    // option below covers it, escalated.
                }
            }
        }

        let severity = if patterns
            .iter()
            .any(|p| p.pattern == PatternType::SystemicFailure)
        {
            AlertSeverity::High
        } else {
            AlertSeverity::Low
        };
        options.push(Self::alert_option(severity, "pattern_review"));

        debug!(
            target: crate::log_targets::DECIDE,
            options = options.len(),
            patterns = patterns.len(),
            "Options generated"
        );
        options
    }

    fn suppress_option(
        &self,
        issuer: crate::types::Issuer,
        pattern: &DetectedPattern,
    ) -> InterventionOption {
        InterventionOption {
            kind: InterventionType::SuppressPath,
            target: InterventionTarget::Issuer(issuer),
            parameters: InterventionParameters::with_duration(
                self.suppression_duration_ms,
                pattern.pattern.as_str(),
            ),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.10,
                latency_change_ms: -50.0,
                cost_change: 0.05,
                confidence: 0.7,
            },
            tradeoffs: Tradeoffs {
                success_rate_impact: 0.10,
                latency_impact_ms: -50.0,
                cost_impact: 0.05,
                risk_impact: 0.10,
                user_friction_impact: 0.2,
            },
            reversible: true,
            blast_radius: 0.2,
        }
    }

    fn reduce_retry_option(&self, pattern: &DetectedPattern) -> InterventionOption {
        let mut parameters = InterventionParameters::with_duration(
            self.retry_reduction_duration_ms,
            pattern.pattern.as_str(),
        );
        parameters.max_retries = Some(2);
        parameters.retry_multiplier = Some(0.5);
        InterventionOption {
            kind: InterventionType::ReduceRetryAttempts,
            target: InterventionTarget::System,
            parameters,
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.05,
                latency_change_ms: -100.0,
                cost_change: -0.10,
                confidence: 0.8,
            },
            tradeoffs: Tradeoffs {
                // A retry storm is itself depressing success; shedding retry
                // load recovers more than the lost retry conversions.
                success_rate_impact: 0.05,
                latency_impact_ms: -100.0,
                cost_impact: -0.10,
                risk_impact: 0.05,
                user_friction_impact: 0.1,
            },
            reversible: true,
            blast_radius: 0.5,
        }
    }

    fn reroute_method_option(
        &self,
        method: crate::types::PaymentMethod,
        pattern: &DetectedPattern,
    ) -> InterventionOption {
        InterventionOption {
            kind: InterventionType::RerouteTraffic,
            target: InterventionTarget::Method(method),
            parameters: InterventionParameters::with_duration(
                self.suppression_duration_ms,
                pattern.pattern.as_str(),
            ),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.15,
                latency_change_ms: 20.0,
                cost_change: 0.02,
                confidence: 0.6,
            },
            tradeoffs: Tradeoffs {
                success_rate_impact: 0.15,
                latency_impact_ms: 20.0,
                cost_impact: 0.02,
                risk_impact: 0.15,
                user_friction_impact: 0.3,
            },
            reversible: true,
            blast_radius: 0.3,
        }
    }

    fn reroute_issuer_option(
        &self,
        issuer: crate::types::Issuer,
        pattern: &DetectedPattern,
    ) -> InterventionOption {
        InterventionOption {
            kind: InterventionType::RerouteTraffic,
            target: InterventionTarget::Issuer(issuer),
            parameters: InterventionParameters::with_duration(
                self.suppression_duration_ms,
                pattern.pattern.as_str(),
            ),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.05,
                latency_change_ms: -150.0,
                cost_change: 0.02,
                confidence: 0.6,
            },
            tradeoffs: Tradeoffs {
                success_rate_impact: 0.05,
                latency_impact_ms: -150.0,
                cost_impact: 0.02,
                risk_impact: 0.15,
                user_friction_impact: 0.2,
            },
            reversible: true,
            blast_radius: 0.3,
        }
    }

    fn no_action_option() -> InterventionOption {
        InterventionOption {
            kind: InterventionType::NoAction,
            target: InterventionTarget::System,
            parameters: InterventionParameters::with_duration(0, "no_action"),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.0,
                latency_change_ms: 0.0,
                cost_change: 0.0,
                confidence: 1.0,
            },
            tradeoffs: Tradeoffs::NEUTRAL,
            reversible: true,
            blast_radius: 0.0,
        }
    }

    /// Baseline ops alert: zero blast radius, reversible, small cost.
    pub fn alert_option(severity: AlertSeverity, reason: &str) -> InterventionOption {
        let mut parameters = InterventionParameters::with_duration(60_000, reason);
        parameters.severity = Some(severity);
        InterventionOption {
            kind: InterventionType::AlertOps,
            target: InterventionTarget::OpsTeam,
            parameters,
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.0,
                latency_change_ms: 0.0,
                cost_change: 0.0,
                confidence: 1.0,
            },
            tradeoffs: Tradeoffs::NEUTRAL,
            reversible: true,
            blast_radius: 0.0,
        }
    }
}

impl Default for InterventionPlanner {
    fn default() -> Self {
        Self::new()
    }
}

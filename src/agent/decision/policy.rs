//! Decision policy: NRV-ranked option selection with the
//! minimum-action-frequency rule.
//!
//! The policy's only cross-cycle state is the consecutive NO-ACTION counter;
//! it lives here and nowhere else. It is persisted in the snapshot so the
//! action cadence survives restarts.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::decision::guardrails::{GuardrailOutcome, Guardrails};
use crate::agent::decision::nrv::{NrvBreakdown, NrvCalculator};
use crate::agent::decision::planner::InterventionPlanner;
use crate::agent::reasoning::belief::BeliefState;
use crate::intervention::{AlertSeverity, InterventionOption, InterventionType};

/// Where a decision sits in its lifecycle. The first four states are
/// traversed within a cycle; the terminal two belong to the applied
/// intervention and are reached asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Observe,
    PatternDetected,
    OptionSelected,
    Acting,
    Expired,
    RolledBack,
}

/// The policy's verdict for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub should_act: bool,
    pub selected_option: Option<InterventionOption>,
    pub rationale: String,
    /// Kinds of the options considered but not selected.
    pub alternatives: Vec<InterventionType>,
    pub requires_human_approval: bool,
    pub nrv: f64,
    pub min_freq_triggered: bool,
    pub guardrail_outcome: String,
    pub state: DecisionState,
}

impl Decision {
    fn no_action(rationale: String, state: DecisionState) -> Self {
        Self {
            should_act: false,
            selected_option: None,
            rationale,
            alternatives: Vec::new(),
            requires_human_approval: false,
            nrv: 0.0,
            min_freq_triggered: false,
            guardrail_outcome: "none".to_string(),
            state,
        }
    }
}

pub struct DecisionPolicy {
    nrv: NrvCalculator,
    guardrails: Guardrails,
    min_action_frequency_cycles: u32,
    /// Consecutive NO-ACTION decisions since the last action.
    no_action_streak: u32,
}

impl DecisionPolicy {
    pub fn new(
        nrv: NrvCalculator,
        guardrails: Guardrails,
        min_action_frequency_cycles: u32,
    ) -> Self {
        Self {
            nrv,
            guardrails,
            min_action_frequency_cycles,
            no_action_streak: 0,
        }
    }

    pub fn no_action_streak(&self) -> u32 {
        self.no_action_streak
    }

    /// Restore the streak counter from a snapshot.
    pub fn restore_streak(&mut self, streak: u32) {
        self.no_action_streak = streak;
    }

    /// Select this cycle's action.
    ///
    /// Normal path: act iff the best admissible option has NRV > 0.
    /// Forced path: once `min_action_frequency_cycles − 1` consecutive
    /// NO-ACTION decisions have accumulated, this cycle must act — with the
    /// top-ranked admissible option even at NRV ≤ 0, or with a synthesised
    /// baseline `alert_ops` when nothing else is admissible.
    pub fn decide(
        &mut self,
        options: Vec<InterventionOption>,
        beliefs: &BeliefState,
        window_volume: usize,
        patterns_active: bool,
    ) -> Decision {
        let entry_state = if patterns_active {
            DecisionState::PatternDetected
        } else {
            DecisionState::Observe
        };
        let forced = self.no_action_streak >= self.min_action_frequency_cycles.saturating_sub(1);

        // Guardrail pass: NoAction is a sentinel, not a candidate.
        let mut admissible: Vec<(InterventionOption, GuardrailOutcome)> = Vec::new();
        let mut rejected_reasons: Vec<String> = Vec::new();
        let mut had_candidates = false;
        for option in options {
            if option.kind == InterventionType::NoAction {
                continue;
            }
            had_candidates = true;
            match self.guardrails.evaluate(&option, beliefs.max_confidence) {
                GuardrailOutcome::Rejected(reason) => {
                    rejected_reasons.push(format!("{}: {reason}", option.kind));
                }
                outcome => admissible.push((option, outcome)),
            }
        }
        for reason in &rejected_reasons {
            warn!(target: crate::log_targets::DECIDE, %reason, "Option rejected by guardrail");
        }

        let ranked = self.nrv.rank(
            admissible.iter().map(|(o, _)| o.clone()).collect(),
            window_volume,
        );

        if !forced {
            match ranked.first() {
                Some((best, breakdown)) if breakdown.nrv > 0.0 => {
                    return self.act(best.clone(), *breakdown, &ranked, &admissible, beliefs, false);
                }
                Some((_, breakdown)) => {
                    self.no_action_streak += 1;
                    return Decision::no_action(
                        format!(
                            "best option NRV {:.2} <= 0, no economic value \
                             (cycle {} since last action)",
                            breakdown.nrv, self.no_action_streak
                        ),
                        entry_state,
                    );
                }
                None => {
                    self.no_action_streak += 1;
                    let rationale = if had_candidates {
                        format!(
                            "guardrail-blocked: all {} candidate option(s) rejected \
                             (cycle {} since last action)",
                            rejected_reasons.len(),
                            self.no_action_streak
                        )
                    } else {
                        format!(
                            "no candidate options (cycle {} since last action)",
                            self.no_action_streak
                        )
                    };
                    return Decision::no_action(rationale, entry_state);
                }
            }
        }

        // Forced path.
        match ranked.first() {
            Some((best, breakdown)) => {
                info!(
                    target: crate::log_targets::DECIDE,
                    streak = self.no_action_streak,
                    kind = %best.kind,
                    nrv = format!("{:.2}", breakdown.nrv),
                    "Minimum-frequency rule forcing action"
                );
                self.act(best.clone(), *breakdown, &ranked, &admissible, beliefs, true)
            }
            None => {
                // Nothing admissible: synthesise the baseline alert.
                let alert =
                    InterventionPlanner::alert_option(AlertSeverity::Low, "minimum_action_frequency");
                let breakdown = self.nrv.calculate(&alert, window_volume);
                info!(
                    target: crate::log_targets::DECIDE,
                    streak = self.no_action_streak,
                    "Minimum-frequency rule synthesising alert_ops"
                );
                self.no_action_streak = 0;
                Decision {
                    should_act: true,
                    selected_option: Some(alert),
                    rationale: format!(
                        "[minimum-frequency rule] no admissible option after {} idle cycles; \
                         synthesised baseline alert_ops (NRV {:.2})",
                        self.min_action_frequency_cycles, breakdown.nrv
                    ),
                    alternatives: Vec::new(),
                    requires_human_approval: false,
                    nrv: breakdown.nrv,
                    min_freq_triggered: true,
                    guardrail_outcome: "pass".to_string(),
                    state: DecisionState::OptionSelected,
                }
            }
        }
    }

    fn act(
        &mut self,
        option: InterventionOption,
        breakdown: NrvBreakdown,
        ranked: &[(InterventionOption, NrvBreakdown)],
        admissible: &[(InterventionOption, GuardrailOutcome)],
        beliefs: &BeliefState,
        min_freq_triggered: bool,
    ) -> Decision {
        let guardrail_outcome = admissible
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or(GuardrailOutcome::Pass);

        let requires_human_approval =
            matches!(guardrail_outcome, GuardrailOutcome::RequiresApproval(_))
                || beliefs.uncertainty > 0.5;

        let alternatives = ranked
            .iter()
            .skip(1)
            .map(|(o, _)| o.kind)
            .collect::<Vec<_>>();

        let mut rationale = format!(
            "selected {} on {} with NRV {:.2} (recovery {:.2}, cost {:.2}, \
             latency penalty {:.2}, risk penalty {:.2})",
            option.kind,
            option.target,
            breakdown.nrv,
            breakdown.revenue_recovery,
            breakdown.intervention_cost,
            breakdown.latency_penalty,
            breakdown.risk_penalty,
        );
        if min_freq_triggered {
            rationale = format!(
                "[minimum-frequency rule] forced action after {} idle cycles; {rationale}",
                self.no_action_streak
            );
        }
        if let GuardrailOutcome::RequiresApproval(reason) = &guardrail_outcome {
            rationale.push_str(&format!("; escalated: {reason}"));
        }

        self.no_action_streak = 0;

        Decision {
            should_act: true,
            selected_option: Some(option),
            rationale,
            alternatives,
            requires_human_approval,
            nrv: breakdown.nrv,
            min_freq_triggered,
            guardrail_outcome: guardrail_outcome.as_str().to_string(),
            state: DecisionState::OptionSelected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::decision::nrv::NrvParams;
    use crate::intervention::{
        InterventionParameters, InterventionTarget, OutcomeEstimate, Tradeoffs,
    };
    use crate::types::Issuer;

    fn policy(n: u32) -> DecisionPolicy {
        DecisionPolicy::new(
            NrvCalculator::new(NrvParams::default()),
            Guardrails::default(),
            n,
        )
    }

    fn beliefs(confidence: f64) -> BeliefState {
        BeliefState {
            hypotheses: Vec::new(),
            system_health: 1.0,
            uncertainty: if confidence > 0.0 { 1.0 - confidence } else { 0.0 },
            max_confidence: confidence,
            uncertain: confidence > 0.0 && confidence < 0.5,
            last_updated_ms: 0,
        }
    }

    fn suppress(lift: f64) -> InterventionOption {
        InterventionOption {
            kind: InterventionType::SuppressPath,
            target: InterventionTarget::Issuer(Issuer::Icici),
            parameters: InterventionParameters::with_duration(300_000, "test"),
            expected_outcome: OutcomeEstimate {
                success_rate_change: lift,
                latency_change_ms: -50.0,
                cost_change: 0.05,
                confidence: 0.7,
            },
            tradeoffs: Tradeoffs {
                success_rate_impact: lift,
                latency_impact_ms: -50.0,
                cost_impact: 0.05,
                risk_impact: 0.1,
                user_friction_impact: 0.2,
            },
            reversible: true,
            blast_radius: 0.2,
        }
    }

    #[test]
    fn test_acts_on_positive_nrv() {
        let mut policy = policy(6);
        let decision = policy.decide(vec![suppress(0.1)], &beliefs(0.8), 500, true);
        assert!(decision.should_act);
        assert!(decision.nrv > 0.0);
        assert!(!decision.min_freq_triggered);
        assert_eq!(policy.no_action_streak(), 0);
    }

    #[test]
    fn test_no_action_on_negative_nrv_increments_streak() {
        let mut policy = policy(6);
        let decision = policy.decide(vec![suppress(0.0)], &beliefs(0.8), 0, true);
        assert!(!decision.should_act);
        assert_eq!(policy.no_action_streak(), 1);
    }

    #[test]
    fn test_min_frequency_forces_alert_when_idle() {
        let mut policy = policy(6);
        // Five idle cycles (no options at all).
        for _ in 0..5 {
            let d = policy.decide(Vec::new(), &beliefs(0.0), 0, false);
            assert!(!d.should_act);
        }
        // Sixth cycle must act, synthesising alert_ops.
        let d = policy.decide(Vec::new(), &beliefs(0.0), 0, false);
        assert!(d.should_act);
        assert!(d.min_freq_triggered);
        let option = d.selected_option.unwrap();
        assert_eq!(option.kind, InterventionType::AlertOps);
        assert!(option.blast_radius.abs() < f64::EPSILON);
        assert!(d.nrv <= 0.0);
        assert!(d.rationale.contains("minimum-frequency"));
        assert_eq!(policy.no_action_streak(), 0);
    }

    #[test]
    fn test_min_frequency_picks_best_option_even_at_negative_nrv() {
        let mut policy = policy(3);
        for _ in 0..2 {
            policy.decide(Vec::new(), &beliefs(0.0), 0, false);
        }
        // Zero-lift option has negative NRV but is still forced.
        let d = policy.decide(vec![suppress(0.0)], &beliefs(0.8), 0, true);
        assert!(d.should_act);
        assert!(d.min_freq_triggered);
        assert_eq!(
            d.selected_option.unwrap().kind,
            InterventionType::SuppressPath
        );
    }

    #[test]
    fn test_guardrail_blocked_rationale() {
        let mut rails = Guardrails::default();
        rails.protected_targets.insert("issuer:ICICI".to_string());
        let mut policy = DecisionPolicy::new(
            NrvCalculator::new(NrvParams::default()),
            rails,
            6,
        );
        let d = policy.decide(vec![suppress(0.1)], &beliefs(0.8), 500, true);
        assert!(!d.should_act);
        assert!(d.rationale.contains("guardrail-blocked"));
    }

    #[test]
    fn test_window_of_n_plus_one_cycles_contains_an_action() {
        let mut policy = policy(6);
        let mut actions = 0;
        for _ in 0..7 {
            if policy.decide(Vec::new(), &beliefs(0.0), 0, false).should_act {
                actions += 1;
            }
        }
        assert!(actions >= 1);
    }

    #[test]
    fn test_nrv_ordering_when_not_forced() {
        let mut policy = policy(6);
        let weak = suppress(0.02);
        let strong = suppress(0.2);
        let d = policy.decide(vec![weak, strong.clone()], &beliefs(0.8), 500, true);
        assert!(d.should_act);
        assert!(!d.min_freq_triggered);
        assert_eq!(d.selected_option.unwrap(), strong);
    }

    #[test]
    fn test_uncertain_beliefs_escalate_to_human() {
        let mut policy = policy(6);
        let d = policy.decide(vec![suppress(0.1)], &beliefs(0.3), 500, true);
        assert!(d.should_act);
        assert!(d.requires_human_approval);
    }
}

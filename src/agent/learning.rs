//! Outcome evaluation: did an applied intervention actually help?
//!
//! Each applied intervention is re-examined after a settling period against
//! the global success rate recorded at apply time. The verdicts accumulate
//! into the safety metrics surfaced over telemetry.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::info;

use crate::intervention::{InterventionOption, InterventionType};
use crate::stream::feedback::ActiveIntervention;

/// Outcome classification margins on global success-rate delta.
const IMPROVED_MARGIN: f64 = 0.02;
const REGRESSED_MARGIN: f64 = -0.02;

/// Telemetry row for one applied intervention.
#[derive(Debug, Clone, Serialize)]
pub struct InterventionRecord {
    pub action: String,
    pub target: String,
    pub reason: String,
    pub ts: String,
    pub result: String,
    pub rate: String,
    #[serde(skip)]
    pub intervention_id: u64,
}

/// Aggregate safety metrics over the run.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SafetyMetrics {
    pub false_positive_rate: f64,
    pub avg_response_time_s: f64,
    pub rollback_rate: f64,
    pub human_escalations: u64,
}

struct PendingOutcome {
    intervention_id: u64,
    applied_at_ms: u64,
    reference_success_rate: f64,
}

/// Tracks applied interventions and scores their consequences.
pub struct OutcomeEvaluator {
    /// Settle time before an outcome is judged.
    eval_delay_ms: u64,
    pending: Vec<PendingOutcome>,
    history: VecDeque<InterventionRecord>,
    history_cap: usize,
    applied: u64,
    evaluated: u64,
    regressed: u64,
    rollbacks: u64,
    escalations: u64,
    response_time_sum_ms: u64,
    response_time_count: u64,
}

impl OutcomeEvaluator {
    pub fn new(eval_delay_ms: u64) -> Self {
        Self {
            eval_delay_ms,
            pending: Vec::new(),
            history: VecDeque::new(),
            history_cap: 20,
            applied: 0,
            evaluated: 0,
            regressed: 0,
            rollbacks: 0,
            escalations: 0,
            response_time_sum_ms: 0,
            response_time_count: 0,
        }
    }

    /// Register an applied intervention.
    ///
    /// `detected_at_ms` is when the triggering pattern was first seen, for
    /// response-time accounting; pass `now_ms` for synthesised actions.
    pub fn record_applied(
        &mut self,
        intervention_id: u64,
        option: &InterventionOption,
        rationale: &str,
        reference_success_rate: f64,
        detected_at_ms: u64,
        now_ms: u64,
    ) {
        self.applied += 1;
        self.response_time_sum_ms += now_ms.saturating_sub(detected_at_ms);
        self.response_time_count += 1;

        // Pure notifications have no stream effect to score.
        if option.kind != InterventionType::AlertOps {
            self.pending.push(PendingOutcome {
                intervention_id,
                applied_at_ms: now_ms,
                reference_success_rate,
            });
        }

        self.push_history(InterventionRecord {
            action: option.kind.to_string(),
            target: option.target.to_string(),
            reason: rationale.to_string(),
            ts: format_ts(now_ms),
            result: "active".to_string(),
            rate: "--".to_string(),
            intervention_id,
        });
    }

    pub fn record_escalation(&mut self) {
        self.escalations += 1;
    }

    /// Register a rollback of a previously applied intervention.
    pub fn record_rollback(&mut self, intervention: &ActiveIntervention) {
        self.rollbacks += 1;
        self.pending
            .retain(|p| p.intervention_id != intervention.id);
        if let Some(record) = self
            .history
            .iter_mut()
            .find(|r| r.intervention_id == intervention.id)
        {
            record.result = "rolled_back".to_string();
        }
    }

    /// Score any pending interventions whose settle time has elapsed.
    pub fn evaluate(&mut self, global_success_rate: f64, now_ms: u64) {
        let eval_delay_ms = self.eval_delay_ms;
        let mut verdicts = Vec::new();
        self.pending.retain(|pending| {
            if now_ms.saturating_sub(pending.applied_at_ms) < eval_delay_ms {
                return true;
            }
            let delta = global_success_rate - pending.reference_success_rate;
            verdicts.push((pending.intervention_id, delta));
            false
        });

        for (id, delta) in verdicts {
            self.evaluated += 1;
            let result = if delta >= IMPROVED_MARGIN {
                "improved"
            } else if delta <= REGRESSED_MARGIN {
                self.regressed += 1;
                "regressed"
            } else {
                "neutral"
            };
            info!(
                target: crate::log_targets::DECIDE,
                intervention_id = id,
                delta = format!("{:+.3}", delta),
                result,
                "Intervention outcome evaluated"
            );
            if let Some(record) = self
                .history
                .iter_mut()
                .find(|r| r.intervention_id == id)
            {
                record.result = result.to_string();
                record.rate = format!("{:+.1}%", delta * 100.0);
            }
        }
    }

    pub fn safety_metrics(&self) -> SafetyMetrics {
        SafetyMetrics {
            false_positive_rate: if self.evaluated > 0 {
                self.regressed as f64 / self.evaluated as f64
            } else {
                0.0
            },
            avg_response_time_s: if self.response_time_count > 0 {
                self.response_time_sum_ms as f64 / self.response_time_count as f64 / 1000.0
            } else {
                0.0
            },
            rollback_rate: if self.applied > 0 {
                self.rollbacks as f64 / self.applied as f64
            } else {
                0.0
            },
            human_escalations: self.escalations,
        }
    }

    /// Most recent intervention records, newest last.
    pub fn history(&self) -> Vec<InterventionRecord> {
        self.history.iter().cloned().collect()
    }

    fn push_history(&mut self, record: InterventionRecord) {
        if self.history.len() == self.history_cap {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }
}

fn format_ts(ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::{
        InterventionParameters, InterventionTarget, OutcomeEstimate, Tradeoffs,
    };
    use crate::types::Issuer;

    fn option(kind: InterventionType) -> InterventionOption {
        InterventionOption {
            kind,
            target: InterventionTarget::Issuer(Issuer::Icici),
            parameters: InterventionParameters::with_duration(300_000, "test"),
            expected_outcome: OutcomeEstimate {
                success_rate_change: 0.1,
                latency_change_ms: 0.0,
                cost_change: 0.0,
                confidence: 0.7,
            },
            tradeoffs: Tradeoffs::NEUTRAL,
            reversible: true,
            blast_radius: 0.2,
        }
    }

    #[test]
    fn test_improvement_is_scored_after_delay() {
        let mut eval = OutcomeEvaluator::new(10_000);
        eval.record_applied(1, &option(InterventionType::SuppressPath), "r", 0.80, 0, 1_000);

        // Too early: nothing scored.
        eval.evaluate(0.90, 5_000);
        assert!(eval.history()[0].result == "active");

        eval.evaluate(0.90, 12_000);
        let record = &eval.history()[0];
        assert_eq!(record.result, "improved");
        assert!(record.rate.starts_with('+'));
    }

    #[test]
    fn test_regression_counts_toward_false_positive_rate() {
        let mut eval = OutcomeEvaluator::new(1_000);
        eval.record_applied(1, &option(InterventionType::SuppressPath), "r", 0.95, 0, 0);
        eval.evaluate(0.85, 2_000);

        let metrics = eval.safety_metrics();
        assert!((metrics.false_positive_rate - 1.0).abs() < 1e-9);
        assert_eq!(eval.history()[0].result, "regressed");
    }

    #[test]
    fn test_rollback_rate_and_history_update() {
        let mut eval = OutcomeEvaluator::new(1_000);
        let opt = option(InterventionType::SuppressPath);
        eval.record_applied(7, &opt, "r", 0.95, 0, 0);

        let active = ActiveIntervention {
            id: 7,
            option: opt,
            start_ms: 0,
            end_ms: 300_000,
            phase: crate::intervention::InterventionPhase::RolledBack,
            reference_success_rate: 0.95,
            rollback_conditions: Vec::new(),
            degraded_cycles: 0,
        };
        eval.record_rollback(&active);

        assert_eq!(eval.history()[0].result, "rolled_back");
        assert!((eval.safety_metrics().rollback_rate - 1.0).abs() < 1e-9);
        // A rolled-back intervention is not scored again.
        eval.evaluate(0.5, 10_000);
        assert_eq!(eval.history()[0].result, "rolled_back");
    }

    #[test]
    fn test_alert_ops_not_outcome_scored() {
        let mut eval = OutcomeEvaluator::new(1_000);
        eval.record_applied(1, &option(InterventionType::AlertOps), "r", 0.95, 0, 0);
        eval.evaluate(0.5, 10_000);
        assert_eq!(eval.history()[0].result, "active");
        assert!((eval.safety_metrics().false_positive_rate - 0.0).abs() < 1e-9);
    }
}

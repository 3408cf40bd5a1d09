//! Feedback controller: applies decided interventions to future generation.
//!
//! This is where the loop closes. The policy's selected option lands here,
//! and the generator reads the resulting multipliers on every batch, so
//! decisions visibly change the stream they were made from.
//!
//! Multipliers compose multiplicatively across overlapping interventions and
//! are order-independent. After an intervention's deadline passes, its effect
//! is not removed abruptly: the multiplier ramps linearly back to 1.0 over a
//! configurable window so traffic restores gradually.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::intervention::{
    InterventionOption, InterventionPhase, InterventionTarget, InterventionType,
    RollbackCondition,
};
use crate::types::{Issuer, PaymentMethod};

/// Multiplier constants per intervention type.
const SUPPRESS_SUCCESS_FACTOR: f64 = 0.1;
const SUPPRESS_VOLUME_FACTOR: f64 = 0.1;
const REROUTE_VOLUME_FACTOR: f64 = 0.3;
const REDUCE_RETRY_FACTOR: f64 = 0.5;
const ADJUST_RETRY_FACTOR: f64 = 1.5;

/// Outcome of an operator-initiated rollback request.
#[derive(Debug, Clone, PartialEq)]
pub enum ManualRollback {
    /// The intervention was acting; its effects were removed immediately.
    Completed(ActiveIntervention),
    /// The intervention is past its deadline; it stays in the list marked
    /// `rolled_back_failed` until its ramp window passes.
    Failed(ActiveIntervention),
    /// No active intervention carries that id.
    NotFound,
}

/// An applied intervention with its lifecycle bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveIntervention {
    pub id: u64,
    pub option: InterventionOption,
    pub start_ms: u64,
    pub end_ms: u64,
    pub phase: InterventionPhase,
    /// Global success rate observed when the intervention was applied;
    /// rollback conditions compare against this.
    pub reference_success_rate: f64,
    pub rollback_conditions: Vec<RollbackCondition>,
    /// Consecutive cycles the global success rate stayed below reference.
    #[serde(default)]
    pub degraded_cycles: u32,
}

impl ActiveIntervention {
    /// Remaining effect strength in [0,1]: 1.0 while acting, linearly
    /// decaying to 0.0 across the ramp window after `end_ms`.
    fn strength(&self, now_ms: u64, ramp_ms: u64) -> f64 {
        match self.phase {
            InterventionPhase::Acting => 1.0,
            InterventionPhase::RampingBack => {
                if ramp_ms == 0 {
                    return 0.0;
                }
                let elapsed = now_ms.saturating_sub(self.end_ms) as f64;
                (1.0 - elapsed / ramp_ms as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}

/// Owns the active-intervention list and exposes the multipliers the
/// generator consults.
pub struct FeedbackController {
    active: Vec<ActiveIntervention>,
    ramp_ms: u64,
    next_id: u64,
    total_applied: u64,
    total_rolled_back: u64,
    total_expired: u64,
}

impl FeedbackController {
    pub fn new(ramp_ms: u64) -> Self {
        Self {
            active: Vec::new(),
            ramp_ms,
            next_id: 1,
            total_applied: 0,
            total_rolled_back: 0,
            total_expired: 0,
        }
    }

    /// Apply an option. Returns the intervention id.
    ///
    /// `reference_success_rate` is the current global success rate, recorded
    /// for rollback comparisons.
    pub fn apply(
        &mut self,
        option: InterventionOption,
        now_ms: u64,
        reference_success_rate: f64,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        let duration_ms = option.parameters.duration_ms.max(1);
        let end_ms = now_ms + duration_ms;

        // Notifications have no stream effect, so nothing to roll back.
        let rollback_conditions = match option.kind {
            InterventionType::AlertOps | InterventionType::NoAction => Vec::new(),
            _ => vec![
                RollbackCondition::GlobalSuccessRegression { threshold: 0.10 },
                RollbackCondition::SustainedDegradation { cycles: 3 },
            ],
        };

        info!(
            target: crate::log_targets::STREAM,
            id,
            kind = %option.kind,
            intervention_target = %option.target,
            duration_s = duration_ms / 1000,
            "Applied intervention"
        );

        self.active.push(ActiveIntervention {
            id,
            option,
            start_ms: now_ms,
            end_ms,
            phase: InterventionPhase::Acting,
            reference_success_rate,
            rollback_conditions,
            degraded_cycles: 0,
        });
        self.total_applied += 1;
        id
    }

    /// Success-rate multiplier for transactions routed to `issuer`.
    pub fn success_multiplier(&self, issuer: Issuer, now_ms: u64) -> f64 {
        self.active
            .iter()
            .filter(|a| {
                a.option.kind == InterventionType::SuppressPath
                    && a.option.target == InterventionTarget::Issuer(issuer)
            })
            .map(|a| effective(SUPPRESS_SUCCESS_FACTOR, a.strength(now_ms, self.ramp_ms)))
            .product()
    }

    /// Traffic-weight multiplier for `issuer` in issuer sampling.
    pub fn volume_multiplier(&self, issuer: Issuer, now_ms: u64) -> f64 {
        self.active
            .iter()
            .filter_map(|a| {
                if a.option.target != InterventionTarget::Issuer(issuer) {
                    return None;
                }
                let base = match a.option.kind {
                    InterventionType::SuppressPath => SUPPRESS_VOLUME_FACTOR,
                    InterventionType::RerouteTraffic => REROUTE_VOLUME_FACTOR,
                    _ => return None,
                };
                Some(effective(base, a.strength(now_ms, self.ramp_ms)))
            })
            .product()
    }

    /// Traffic-weight multiplier for a payment method (method-targeted
    /// reroutes).
    pub fn method_volume_multiplier(&self, method: PaymentMethod, now_ms: u64) -> f64 {
        self.active
            .iter()
            .filter(|a| {
                a.option.kind == InterventionType::RerouteTraffic
                    && a.option.target == InterventionTarget::Method(method)
            })
            .map(|a| effective(REROUTE_VOLUME_FACTOR, a.strength(now_ms, self.ramp_ms)))
            .product()
    }

    /// Global retry-probability multiplier.
    pub fn retry_multiplier(&self, now_ms: u64) -> f64 {
        self.active
            .iter()
            .filter_map(|a| {
                let base = match a.option.kind {
                    InterventionType::ReduceRetryAttempts => a
                        .option
                        .parameters
                        .retry_multiplier
                        .unwrap_or(REDUCE_RETRY_FACTOR),
                    InterventionType::AdjustRetry => a
                        .option
                        .parameters
                        .retry_multiplier
                        .unwrap_or(ADJUST_RETRY_FACTOR),
                    _ => return None,
                };
                Some(effective(base, a.strength(now_ms, self.ramp_ms)))
            })
            .product()
    }

    /// Advance lifecycles: move past-deadline interventions into the ramp
    /// phase and drop entries whose ramp has completed.
    ///
    /// Must run before each generation batch so expired multipliers do not
    /// leak into new transactions at full strength. Returns the entries that
    /// fully expired this tick.
    pub fn tick(&mut self, now_ms: u64) -> Vec<ActiveIntervention> {
        for entry in self.active.iter_mut() {
            if entry.phase == InterventionPhase::Acting && now_ms >= entry.end_ms {
                entry.phase = InterventionPhase::RampingBack;
                info!(
                    target: crate::log_targets::STREAM,
                    id = entry.id,
                    kind = %entry.option.kind,
                    ramp_s = self.ramp_ms / 1000,
                    "Intervention deadline reached, ramping back"
                );
            }
        }
        let ramp_ms = self.ramp_ms;
        let mut expired = Vec::new();
        self.active.retain_mut(|entry| {
            let past_ramp = now_ms >= entry.end_ms.saturating_add(ramp_ms);
            match entry.phase {
                InterventionPhase::RampingBack if past_ramp => {
                    entry.phase = InterventionPhase::Expired;
                    expired.push(entry.clone());
                    false
                }
                // Failed rollbacks linger for operator visibility until the
                // ramp window has passed, then age out.
                InterventionPhase::RolledBackFailed if past_ramp => false,
                _ => true,
            }
        });
        self.total_expired += expired.len() as u64;
        expired
    }

    /// Evaluate rollback conditions against the current global success rate.
    ///
    /// Returns each rolled-back entry with the condition that fired, for
    /// auditing. Rolled-back interventions are removed immediately, without
    /// a ramp: an intervention that made things worse should stop at once.
    pub fn check_rollbacks(
        &mut self,
        now_ms: u64,
        global_success_rate: f64,
    ) -> Vec<(ActiveIntervention, RollbackCondition)> {
        let mut rolled_back = Vec::new();

        for entry in self.active.iter_mut() {
            if entry.phase != InterventionPhase::Acting {
                continue;
            }
            if global_success_rate < entry.reference_success_rate {
                entry.degraded_cycles += 1;
            } else {
                entry.degraded_cycles = 0;
            }

            let fired = entry.rollback_conditions.iter().find(|cond| match cond {
                RollbackCondition::GlobalSuccessRegression { threshold } => {
                    global_success_rate <= entry.reference_success_rate - threshold
                }
                RollbackCondition::SustainedDegradation { cycles } => {
                    entry.degraded_cycles >= *cycles
                }
                RollbackCondition::Manual => false,
            });

            if let Some(condition) = fired.cloned() {
                entry.phase = InterventionPhase::RolledBack;
                warn!(
                    target: crate::log_targets::STREAM,
                    id = entry.id,
                    kind = %entry.option.kind,
                    reference = entry.reference_success_rate,
                    observed = global_success_rate,
                    age_s = now_ms.saturating_sub(entry.start_ms) / 1000,
                    "Rollback condition fired"
                );
                rolled_back.push((entry.clone(), condition));
            }
        }

        self.total_rolled_back += rolled_back.len() as u64;
        self.active
            .retain(|e| e.phase != InterventionPhase::RolledBack);
        rolled_back
    }

    /// Operator-initiated rollback of a specific intervention.
    ///
    /// Acting interventions roll back immediately. An intervention past its
    /// deadline cannot be reverted ahead of its ramp: it is left in place
    /// marked `rolled_back_failed` so the failure stays visible. An unknown
    /// id is a failure the caller must escalate.
    pub fn rollback_manual(&mut self, id: u64) -> ManualRollback {
        let Some(idx) = self.active.iter().position(|e| e.id == id) else {
            warn!(
                target: crate::log_targets::STREAM,
                id,
                "Manual rollback requested for unknown intervention"
            );
            return ManualRollback::NotFound;
        };
        if self.active[idx].phase == InterventionPhase::Acting {
            let mut entry = self.active.remove(idx);
            entry.phase = InterventionPhase::RolledBack;
            self.total_rolled_back += 1;
            info!(
                target: crate::log_targets::STREAM,
                id,
                kind = %entry.option.kind,
                "Manual rollback completed"
            );
            ManualRollback::Completed(entry)
        } else {
            self.active[idx].phase = InterventionPhase::RolledBackFailed;
            warn!(
                target: crate::log_targets::STREAM,
                id,
                "Manual rollback failed: intervention already past deadline"
            );
            ManualRollback::Failed(self.active[idx].clone())
        }
    }

    pub fn active(&self) -> &[ActiveIntervention] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active
            .iter()
            .filter(|a| a.phase == InterventionPhase::Acting)
            .count()
    }

    pub fn total_applied(&self) -> u64 {
        self.total_applied
    }

    pub fn total_rolled_back(&self) -> u64 {
        self.total_rolled_back
    }

    /// Restore state from a snapshot. Interventions resume with their
    /// original deadlines; the id counter advances past the restored ids.
    pub fn restore(&mut self, entries: Vec<ActiveIntervention>) {
        self.next_id = entries.iter().map(|e| e.id + 1).max().unwrap_or(1);
        self.active = entries;
    }
}

/// Interpolate a multiplier toward 1.0 as the intervention's strength fades.
#[inline]
fn effective(base: f64, strength: f64) -> f64 {
    1.0 + (base - 1.0) * strength
}

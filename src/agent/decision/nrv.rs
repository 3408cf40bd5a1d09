//! Net Revenue Value: the scalar that ranks candidate interventions.
//!
//! ```text
//! NRV = expected_success_lift · avg_ticket_value · affected_volume
//!       − intervention_cost − latency_penalty − risk_penalty
//! ```
//!
//! All four terms derive from the option's declared outcome and tradeoffs;
//! the weights are chosen so no single term dominates by construction.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intervention::InterventionOption;

/// Weighting parameters for the NRV terms.
#[derive(Debug, Clone, Copy)]
pub struct NrvParams {
    /// Average transaction value in currency units.
    pub avg_ticket_value: f64,
    /// Penalty per millisecond of added (or saved) latency.
    pub latency_penalty_per_ms: f64,
    /// Fixed cost of executing any intervention.
    pub base_intervention_cost: f64,
    /// Currency scale applied to the option's declared risk impact.
    pub risk_penalty_scale: f64,
}

impl Default for NrvParams {
    fn default() -> Self {
        Self {
            avg_ticket_value: 100.0,
            latency_penalty_per_ms: 0.01,
            base_intervention_cost: 5.0,
            risk_penalty_scale: 100.0,
        }
    }
}

/// Itemised NRV result, kept for rationale and audit output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NrvBreakdown {
    pub nrv: f64,
    pub revenue_recovery: f64,
    pub intervention_cost: f64,
    pub latency_penalty: f64,
    pub risk_penalty: f64,
    pub affected_volume: f64,
    pub success_lift: f64,
}

pub struct NrvCalculator {
    params: NrvParams,
}

impl NrvCalculator {
    pub fn new(params: NrvParams) -> Self {
        Self { params }
    }

    /// Compute the NRV of one option against the current window volume.
    pub fn calculate(&self, option: &InterventionOption, window_volume: usize) -> NrvBreakdown {
        let lift = option.tradeoffs.success_rate_impact;
        let affected_volume = window_volume as f64 * option.blast_radius;
        let revenue_recovery = lift * affected_volume * self.params.avg_ticket_value;
        let intervention_cost = self.params.base_intervention_cost
            + option.tradeoffs.cost_impact.abs() * self.params.avg_ticket_value;
        let latency_penalty =
            option.tradeoffs.latency_impact_ms.abs() * self.params.latency_penalty_per_ms;
        let risk_penalty = option.tradeoffs.risk_impact.max(0.0) * self.params.risk_penalty_scale;

        let breakdown = NrvBreakdown {
            nrv: revenue_recovery - intervention_cost - latency_penalty - risk_penalty,
            revenue_recovery,
            intervention_cost,
            latency_penalty,
            risk_penalty,
            affected_volume,
            success_lift: lift,
        };
        debug!(
            target: crate::log_targets::DECIDE,
            kind = %option.kind,
            nrv = format!("{:.2}", breakdown.nrv),
            recovery = format!("{:.2}", revenue_recovery),
            cost = format!("{:.2}", intervention_cost),
            "NRV computed"
        );
        breakdown
    }

    /// Rank options by NRV descending. Ties prefer reversible options, then
    /// smaller blast radius.
    pub fn rank(
        &self,
        options: Vec<InterventionOption>,
        window_volume: usize,
    ) -> Vec<(InterventionOption, NrvBreakdown)> {
        let mut ranked: Vec<(InterventionOption, NrvBreakdown)> = options
            .into_iter()
            .map(|opt| {
                let breakdown = self.calculate(&opt, window_volume);
                (opt, breakdown)
            })
            .collect();
        ranked.sort_by(|(a, ba), (b, bb)| {
            bb.nrv
                .total_cmp(&ba.nrv)
                .then_with(|| b.reversible.cmp(&a.reversible))
                .then_with(|| a.blast_radius.total_cmp(&b.blast_radius))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::{
        InterventionParameters, InterventionTarget, InterventionType, OutcomeEstimate, Tradeoffs,
    };
    use crate::types::Issuer;

    fn option(
        kind: InterventionType,
        lift: f64,
        risk: f64,
        blast: f64,
        reversible: bool,
    ) -> InterventionOption {
        InterventionOption {
            kind,
            target: InterventionTarget::Issuer(Issuer::Icici),
            parameters: InterventionParameters::with_duration(300_000, "test"),
            expected_outcome: OutcomeEstimate {
                success_rate_change: lift,
                latency_change_ms: 0.0,
                cost_change: 0.0,
                confidence: 0.7,
            },
            tradeoffs: Tradeoffs {
                success_rate_impact: lift,
                latency_impact_ms: -50.0,
                cost_impact: 0.05,
                risk_impact: risk,
                user_friction_impact: 0.1,
            },
            reversible,
            blast_radius: blast,
        }
    }

    #[test]
    fn test_positive_lift_on_real_volume_beats_costs() {
        let calc = NrvCalculator::new(NrvParams::default());
        let breakdown = calc.calculate(
            &option(InterventionType::SuppressPath, 0.1, 0.1, 0.2, true),
            500,
        );
        // 0.1 * 100 * 100 = 1000 recovery vs ~25 in penalties.
        assert!(breakdown.nrv > 900.0);
    }

    #[test]
    fn test_zero_lift_option_is_negative() {
        let calc = NrvCalculator::new(NrvParams::default());
        let breakdown = calc.calculate(
            &option(InterventionType::AlertOps, 0.0, 0.0, 0.0, true),
            500,
        );
        assert!(breakdown.nrv < 0.0);
    }

    #[test]
    fn test_ranking_is_descending() {
        let calc = NrvCalculator::new(NrvParams::default());
        let ranked = calc.rank(
            vec![
                option(InterventionType::AlertOps, 0.0, 0.0, 0.0, true),
                option(InterventionType::SuppressPath, 0.1, 0.1, 0.2, true),
                option(InterventionType::RerouteTraffic, 0.05, 0.15, 0.3, true),
            ],
            500,
        );
        assert_eq!(ranked[0].0.kind, InterventionType::SuppressPath);
        for pair in ranked.windows(2) {
            assert!(pair[0].1.nrv >= pair[1].1.nrv);
        }
    }

    #[test]
    fn test_tie_break_prefers_reversible_then_smaller_blast() {
        let calc = NrvCalculator::new(NrvParams::default());
        // Identical NRV inputs except reversibility and blast radius.
        let a = option(InterventionType::SuppressPath, 0.1, 0.1, 0.2, false);
        let b = option(InterventionType::RerouteTraffic, 0.1, 0.1, 0.2, true);
        let ranked = calc.rank(vec![a, b], 500);
        assert!(ranked[0].0.reversible);

        let c = option(InterventionType::SuppressPath, 0.0, 0.0, 0.1, true);
        let d = option(InterventionType::RerouteTraffic, 0.0, 0.0, 0.4, true);
        // Equalize NRV by zeroing volume.
        let ranked = calc.rank(vec![d, c], 0);
        assert!(ranked[0].0.blast_radius < ranked[1].0.blast_radius);
    }
}

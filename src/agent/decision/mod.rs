//! Decision layer: option planning, NRV ranking, guardrails, and the policy
//! with its minimum-action-frequency guarantee.

pub mod guardrails;
pub mod nrv;
pub mod planner;
pub mod policy;

pub use guardrails::{GuardrailOutcome, Guardrails};
pub use nrv::{NrvBreakdown, NrvCalculator, NrvParams};
pub use planner::InterventionPlanner;
pub use policy::{Decision, DecisionPolicy, DecisionState};

#![deny(unreachable_pub)]

//! Autonomous operations agent for a simulated payment-authorization fleet.
//!
//! A stochastic drift engine evolves per-issuer health; a continuous
//! generator emits authorization outcomes; the agent observes the stream
//! against rolling EWMA baselines, classifies anomalies into failure
//! patterns, weighs candidate interventions by Net Revenue Value under
//! safety guardrails, and feeds the chosen intervention back into the
//! generator — closing the loop between decision and consequence.

mod errors;
mod prelude;

pub mod agent;
pub mod control_loop;
pub mod infra;
pub mod intervention;
pub mod stream;
pub mod types;

// Re-exports
pub use agent::config::AppConfig;
pub use agent::decision::{
    Decision, DecisionPolicy, DecisionState, GuardrailOutcome, Guardrails, InterventionPlanner,
    NrvBreakdown, NrvCalculator, NrvParams,
};
pub use agent::learning::{InterventionRecord, SafetyMetrics};
pub use agent::memory::{AgentSnapshot, AuditEvent, AuditLog, SnapshotManager};
pub use agent::observation::{
    BaselineManager, DimensionStats, IngestValidator, Metric, ObservationWindow, RollingBaseline,
    WindowStats,
};
pub use agent::reasoning::{
    AnomalyDetector, AnomalySignal, BeliefState, BeliefTracker, DetectedPattern, Evidence,
    Hypothesis, HypothesisGenerator, PatternClassifier, PatternType,
};
pub use agent::telemetry::{CycleStatus, TelemetryCommand, TelemetryConfig, TelemetryState};
pub use agent::{AgentOrchestrator, CycleReport};
pub use control_loop::ControlLoop;
pub use errors::{ConfigError, Error, IngestError, SnapshotError};
pub use infra::logging::{init_logging, targets as log_targets, LogConfig, LogFormat};
pub use intervention::{
    AlertSeverity, InterventionOption, InterventionParameters, InterventionPhase,
    InterventionTarget, InterventionType, OutcomeEstimate, RollbackCondition, Tradeoffs,
};
pub use prelude::Result;
pub use stream::{
    ActiveIntervention, DriftEngine, DriftParams, FeedbackController, GeneratorParams,
    IssuerState, ManualRollback, OuParams, RateSchedule, TransactionBuffer,
    TransactionGenerator,
};
pub use types::{Dimension, Geography, Issuer, Outcome, PaymentMethod, Transaction};

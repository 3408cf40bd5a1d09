//! Intervention model shared between the decision policy (which creates
//! options) and the feedback controller (which executes them).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Issuer, PaymentMethod};

/// Closed set of actions the agent can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    AdjustRetry,
    SuppressPath,
    RerouteTraffic,
    ReduceRetryAttempts,
    AlertOps,
    NoAction,
}

impl InterventionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::AdjustRetry => "adjust_retry",
            InterventionType::SuppressPath => "suppress_path",
            InterventionType::RerouteTraffic => "reroute_traffic",
            InterventionType::ReduceRetryAttempts => "reduce_retry_attempts",
            InterventionType::AlertOps => "alert_ops",
            InterventionType::NoAction => "no_action",
        }
    }
}

impl fmt::Display for InterventionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an intervention acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionTarget {
    Issuer(Issuer),
    Method(PaymentMethod),
    System,
    OpsTeam,
}

impl fmt::Display for InterventionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterventionTarget::Issuer(i) => write!(f, "issuer:{i}"),
            InterventionTarget::Method(m) => write!(f, "method:{m}"),
            InterventionTarget::System => f.write_str("system"),
            InterventionTarget::OpsTeam => f.write_str("ops_team"),
        }
    }
}

/// Alert severity for `alert_ops` interventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    High,
}

/// Tunable parameters carried by an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionParameters {
    /// How long the intervention stays active once applied.
    pub duration_ms: u64,
    /// Retry cap for retry-shaping interventions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u8>,
    /// Retry probability multiplier for retry-shaping interventions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<AlertSeverity>,
    /// Short machine-readable reason, echoed into the audit trail.
    pub reason: String,
}

impl InterventionParameters {
    pub fn with_duration(duration_ms: u64, reason: impl Into<String>) -> Self {
        Self {
            duration_ms,
            max_retries: None,
            retry_multiplier: None,
            severity: None,
            reason: reason.into(),
        }
    }
}

/// Default intervention lifetime: 5 minutes.
pub const DEFAULT_DURATION_MS: u64 = 300_000;

/// Forecast the planner attaches to an option.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEstimate {
    pub success_rate_change: f64,
    pub latency_change_ms: f64,
    pub cost_change: f64,
    pub confidence: f64,
}

/// Declared costs of an option across the objectives the policy weighs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tradeoffs {
    pub success_rate_impact: f64,
    pub latency_impact_ms: f64,
    pub cost_impact: f64,
    pub risk_impact: f64,
    pub user_friction_impact: f64,
}

impl Tradeoffs {
    pub const NEUTRAL: Tradeoffs = Tradeoffs {
        success_rate_impact: 0.0,
        latency_impact_ms: 0.0,
        cost_impact: 0.0,
        risk_impact: 0.0,
        user_friction_impact: 0.0,
    };
}

/// Candidate intervention produced by the planner and ranked by NRV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionOption {
    pub kind: InterventionType,
    pub target: InterventionTarget,
    pub parameters: InterventionParameters,
    pub expected_outcome: OutcomeEstimate,
    pub tradeoffs: Tradeoffs,
    pub reversible: bool,
    /// Fraction of traffic affected, in [0,1].
    pub blast_radius: f64,
}

/// Conditions under which an applied intervention is rolled back early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RollbackCondition {
    /// Global success rate fell by at least `threshold` below the value
    /// recorded when the intervention was applied.
    GlobalSuccessRegression { threshold: f64 },
    /// The targeted metric kept degrading for `cycles` consecutive cycles
    /// after the intervention was applied.
    SustainedDegradation { cycles: u32 },
    /// Operator-initiated rollback.
    Manual,
}

/// Lifecycle of an applied intervention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPhase {
    /// Multipliers fully applied.
    Acting,
    /// Past `end_ms`; multipliers ramping linearly back to 1.0.
    RampingBack,
    /// Ramp complete; entry about to be dropped.
    Expired,
    /// A rollback condition fired before `end_ms`.
    RolledBack,
    /// Rollback was requested but could not be completed.
    RolledBackFailed,
}

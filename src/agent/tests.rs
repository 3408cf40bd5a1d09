//! Closed-loop scenario tests for the full agent stack.
//!
//! Each test drives the same component wiring the control loop uses, but
//! synchronously with a simulated clock, so cadence, intervention effect,
//! rollback, and restart behavior can be asserted deterministically.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::agent::config::AppConfig;
use crate::agent::orchestrator::{AgentOrchestrator, CycleReport};
use crate::intervention::InterventionType;
use crate::stream::drift::{DriftEngine, IssuerState};
use crate::stream::feedback::FeedbackController;
use crate::stream::generator::TransactionGenerator;
use crate::types::{Geography, Issuer, Outcome, PaymentMethod, Transaction};

const TICK_MS: u64 = 100;
const CYCLE_MS: u64 = 10_000;

/// Full closed-loop harness: drift → generator → orchestrator → feedback.
struct Harness {
    drift: DriftEngine,
    generator: TransactionGenerator,
    feedback: FeedbackController,
    orchestrator: AgentOrchestrator,
    sim_now_ms: u64,
    workdir: PathBuf,
}

impl Harness {
    fn config(workdir: &PathBuf) -> AppConfig {
        let mut config = AppConfig::default();
        config.agent.cycle_interval_s = 10.0;
        config.telemetry.enabled = false;
        config.memory.snapshot_path = workdir.join("state.json").display().to_string();
        config.memory.audit_path = workdir.join("audit.ndjson").display().to_string();
        config
    }

    fn new(name: &str, fresh: bool) -> Self {
        let workdir = std::env::temp_dir().join(format!("payops_scenario_{name}"));
        if fresh {
            let _ = fs::remove_dir_all(&workdir);
        }
        fs::create_dir_all(&workdir).unwrap();
        let config = Self::config(&workdir);
        Self::with_config(config, workdir)
    }

    fn with_config(config: AppConfig, workdir: PathBuf) -> Self {
        let (orchestrator, restored) = AgentOrchestrator::new(&config, 424_242, None);
        let mut feedback = FeedbackController::new(config.safety.ramp_back_ms);
        feedback.restore(restored);
        Self {
            drift: DriftEngine::new(config.drift_params(), config.issuer_states(), 7),
            generator: TransactionGenerator::new(config.generator_params(), 13),
            feedback,
            orchestrator,
            sim_now_ms: 1_700_000_000_000,
            workdir,
        }
    }

    /// One 100 ms tick in control-loop order; returns the generated batch.
    fn tick(&mut self) -> Vec<Transaction> {
        self.sim_now_ms += TICK_MS;
        self.feedback.tick(self.sim_now_ms);
        self.drift.update(TICK_MS as f64 / 1000.0, self.sim_now_ms);
        self.generator
            .generate(TICK_MS as f64 / 1000.0, self.sim_now_ms, &self.drift, &self.feedback)
    }

    /// Advance one full cycle interval, then run the agent cycle.
    fn run_cycle(&mut self) -> CycleReport {
        for _ in 0..(CYCLE_MS / TICK_MS) {
            self.tick();
        }
        let buffer = self.generator.buffer().snapshot();
        self.orchestrator.execute_cycle(
            self.sim_now_ms,
            buffer,
            self.generator.total_generated(),
            &mut self.feedback,
        )
    }

    fn pin_all(&mut self, state: IssuerState) {
        for issuer in Issuer::ALL {
            self.drift.pin(issuer, state);
        }
    }

    fn audit_contents(&self) -> String {
        fs::read_to_string(self.workdir.join("audit.ndjson")).unwrap_or_default()
    }
}

/// Hand-built perfectly stable stream: exactly 95% success, constant
/// latency, zero retries. Z-scores are identically zero after warm-up, so
/// only the minimum-frequency rule can produce an action.
fn steady_buffer(start_ms: u64, count: usize) -> Vec<Transaction> {
    (0..count)
        .map(|i| Transaction {
            id: i as u64 + 1,
            timestamp_ms: start_ms + i as u64 * 10,
            issuer: Issuer::ALL[i % 4],
            method: PaymentMethod::ALL[i % 4],
            geography: Geography::ALL[i % 3],
            outcome: if i % 20 == 0 {
                Outcome::SoftFail
            } else {
                Outcome::Success
            },
            latency_ms: 200,
            retry_count: 0,
            error_code: None,
            amount: 100.0,
        })
        .collect()
}

// =========================================================================
// Scenario 1: healthy idle cadence
// =========================================================================

#[test]
fn test_healthy_idle_acts_exactly_on_minimum_frequency() {
    let workdir = std::env::temp_dir().join("payops_scenario_idle");
    let _ = fs::remove_dir_all(&workdir);
    fs::create_dir_all(&workdir).unwrap();
    let config = Harness::config(&workdir);
    let (mut orchestrator, _) = AgentOrchestrator::new(&config, 1, None);
    let mut feedback = FeedbackController::new(config.safety.ramp_back_ms);

    let mut actions = HashMap::new();
    for cycle in 1..=12u64 {
        let now = 1_700_000_000_000 + cycle * CYCLE_MS;
        let buffer = steady_buffer(now - CYCLE_MS, 400);
        let report = orchestrator.execute_cycle(now, buffer, cycle * 400, &mut feedback);
        actions.insert(cycle, report);
    }

    for cycle in [1u64, 2, 3, 4, 5, 7, 8, 9, 10, 11] {
        assert!(
            !actions[&cycle].decision.should_act,
            "cycle {cycle} should be NO-ACTION"
        );
    }
    for cycle in [6u64, 12] {
        let decision = &actions[&cycle].decision;
        assert!(decision.should_act, "cycle {cycle} must act");
        assert!(decision.min_freq_triggered);
        assert!(decision.nrv <= 0.0);
        let option = decision.selected_option.as_ref().unwrap();
        assert_eq!(option.kind, InterventionType::AlertOps);
        assert!(option.blast_radius.abs() < f64::EPSILON);
        assert!(decision.rationale.contains("minimum-frequency"));
    }
}

// =========================================================================
// Scenario 2: single-issuer outage → suppress_path
// =========================================================================

#[test]
fn test_issuer_outage_is_suppressed_and_share_collapses() {
    let mut harness = Harness::new("outage", true);
    harness
        .drift
        .pin(Issuer::Icici, IssuerState::new(0.3, 400.0, 0.05));

    let mut suppress_cycle = None;
    for cycle in 1..=3 {
        let report = harness.run_cycle();
        if let Some(option) = &report.decision.selected_option {
            if option.kind == InterventionType::SuppressPath && report.decision.should_act {
                assert_eq!(
                    option.target,
                    crate::intervention::InterventionTarget::Issuer(Issuer::Icici)
                );
                assert!(report.decision.nrv > 0.0, "suppress must carry positive NRV");
                suppress_cycle = Some(cycle);
                break;
            }
        }
    }
    let detected = suppress_cycle.expect("outage must be suppressed by cycle 3");
    assert!(detected <= 3);

    // Post-intervention share of newly generated traffic.
    let mut icici = 0usize;
    let mut total = 0usize;
    for _ in 0..(CYCLE_MS / TICK_MS) {
        for txn in harness.tick() {
            total += 1;
            if txn.issuer == Issuer::Icici {
                icici += 1;
            }
        }
    }
    let share = icici as f64 / total.max(1) as f64;
    assert!(
        share <= 0.10,
        "suppressed issuer share {share:.3} exceeds 10%"
    );
}

// =========================================================================
// Scenario 3: retry storm → reduce_retry_attempts
// =========================================================================

#[test]
fn test_retry_storm_reduces_observed_retry_rate() {
    let mut harness = Harness::new("retry_storm", true);
    harness.pin_all(IssuerState::new(0.95, 200.0, 0.35));

    // Pre-intervention retry level over one cycle of generation.
    let report = harness.run_cycle();
    let option = report
        .decision
        .selected_option
        .as_ref()
        .expect("retry storm must produce an action");
    assert_eq!(option.kind, InterventionType::ReduceRetryAttempts);
    assert!(report.decision.should_act);

    let pre: Vec<Transaction> = harness.generator.buffer().snapshot();
    let pre_avg = avg_retry(&pre);
    assert!(pre_avg > 0.3, "storm should push retries above 0.3");

    // One cycle later the multiplier has applied to all new traffic.
    let mut post = Vec::new();
    for _ in 0..(CYCLE_MS / TICK_MS) {
        post.extend(harness.tick());
    }
    let post_avg = avg_retry(&post);
    assert!(
        post_avg <= 0.6 * pre_avg,
        "retry rate must drop by >= 40% (pre {pre_avg:.3}, post {post_avg:.3})"
    );
}

fn avg_retry(txns: &[Transaction]) -> f64 {
    txns.iter().map(|t| t.retry_count as f64).sum::<f64>() / txns.len().max(1) as f64
}

// =========================================================================
// Scenario 4: latency spike → reroute or escalate
// =========================================================================

#[test]
fn test_latency_spike_reroutes_or_escalates() {
    let mut harness = Harness::new("latency", true);
    harness
        .drift
        .pin(Issuer::Axis, IssuerState::new(0.95, 1_500.0, 0.05));

    let mut handled = false;
    for _ in 1..=3 {
        let report = harness.run_cycle();
        if let Some(option) = &report.decision.selected_option {
            if option.kind == InterventionType::RerouteTraffic {
                assert_eq!(
                    option.target,
                    crate::intervention::InterventionTarget::Issuer(Issuer::Axis)
                );
                handled = true;
                break;
            }
        }
        if report.decision.requires_human_approval {
            handled = true;
            break;
        }
    }
    assert!(handled, "latency spike must reroute or escalate within 3 cycles");
}

// =========================================================================
// Scenario 5: rollback on global regression
// =========================================================================

#[test]
fn test_regression_rolls_back_before_deadline() {
    let mut harness = Harness::new("rollback", true);
    harness
        .drift
        .pin(Issuer::Icici, IssuerState::new(0.3, 400.0, 0.05));

    // Let the agent apply the suppression.
    let mut applied = None;
    for _ in 1..=3 {
        let report = harness.run_cycle();
        if report.applied_intervention_id.is_some() {
            applied = report.applied_intervention_id;
            break;
        }
    }
    applied.expect("suppression must be applied");
    let end_ms = harness.feedback.active()[0].end_ms;
    let cycles_before = harness.orchestrator.cycle_counter();

    // Inject a fleet-wide regression well beyond 10 points.
    harness.pin_all(IssuerState::new(0.4, 400.0, 0.05));
    let mut rolled_back = false;
    for _ in 0..3 {
        harness.run_cycle();
        if harness.feedback.total_rolled_back() > 0 {
            rolled_back = true;
            break;
        }
    }
    assert!(rolled_back, "intervention must roll back on regression");
    assert!(
        harness.sim_now_ms < end_ms,
        "rollback must land before the intervention deadline"
    );
    assert!(harness.orchestrator.cycle_counter() > cycles_before);

    let audit = harness.audit_contents();
    assert!(
        audit.contains("\"event\":\"rollback\""),
        "rollback audit record must be written"
    );
}

#[test]
fn test_manual_rollback_command_paths_are_audited() {
    let mut harness = Harness::new("manual_rollback", true);
    harness
        .drift
        .pin(Issuer::Icici, IssuerState::new(0.3, 400.0, 0.05));

    let mut applied = None;
    for _ in 1..=3 {
        let report = harness.run_cycle();
        if report.applied_intervention_id.is_some() {
            applied = report.applied_intervention_id;
            break;
        }
    }
    let id = applied.expect("suppression must be applied");

    // Operator rolls the intervention back mid-flight.
    harness
        .orchestrator
        .handle_manual_rollback(id, harness.sim_now_ms, &mut harness.feedback);
    assert!(harness.feedback.active().is_empty());
    assert_eq!(harness.feedback.total_rolled_back(), 1);

    // A second request for the same id cannot complete and must escalate.
    harness
        .orchestrator
        .handle_manual_rollback(id, harness.sim_now_ms, &mut harness.feedback);

    let audit = harness.audit_contents();
    assert!(audit.contains("\"event\":\"rollback\""));
    assert!(audit.contains("\"kind\":\"manual\""));
    assert!(
        audit.contains("\"event\":\"rollback_failed\""),
        "unsatisfiable rollback must escalate with a high-severity record"
    );
}

// =========================================================================
// Scenario 6: restart mid-intervention
// =========================================================================

#[test]
fn test_restart_resumes_intervention_and_baselines() {
    let name = "restart";
    let (end_ms, cycles, baselines) = {
        let mut harness = Harness::new(name, true);
        harness
            .drift
            .pin(Issuer::Icici, IssuerState::new(0.3, 400.0, 0.05));
        for _ in 1..=3 {
            let report = harness.run_cycle();
            if report.applied_intervention_id.is_some() {
                break;
            }
        }
        assert!(!harness.feedback.active().is_empty());
        (
            harness.feedback.active()[0].end_ms,
            harness.orchestrator.cycle_counter(),
            harness.orchestrator.baselines().export(),
        )
        // Harness dropped here: simulated process kill. The snapshot was
        // persisted by the last cycle.
    };

    let restarted = Harness::new(name, false);
    assert_eq!(restarted.orchestrator.cycle_counter(), cycles);
    let active = restarted.feedback.active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].end_ms, end_ms, "original deadline must survive");
    assert_eq!(restarted.orchestrator.baselines().export(), baselines);
}

// =========================================================================
// Expiration ramp (P7) through the full stack
// =========================================================================

#[test]
fn test_expired_intervention_parameters_return_to_drift_only() {
    let mut harness = Harness::new("expiry", true);
    harness
        .drift
        .pin(Issuer::Icici, IssuerState::new(0.3, 400.0, 0.05));

    for _ in 1..=3 {
        let report = harness.run_cycle();
        if report.applied_intervention_id.is_some() {
            break;
        }
    }
    assert_eq!(harness.feedback.active_count(), 1);
    let end_ms = harness.feedback.active()[0].end_ms;

    // Jump past the deadline plus the full ramp.
    harness.sim_now_ms = end_ms + 60_000;
    harness.feedback.tick(harness.sim_now_ms);
    assert!(harness.feedback.active().is_empty());
    for issuer in Issuer::ALL {
        assert!(
            (harness.feedback.volume_multiplier(issuer, harness.sim_now_ms) - 1.0).abs() < 1e-12
        );
        assert!(
            (harness.feedback.success_multiplier(issuer, harness.sim_now_ms) - 1.0).abs() < 1e-12
        );
    }
    assert!((harness.feedback.retry_multiplier(harness.sim_now_ms) - 1.0).abs() < 1e-12);
}

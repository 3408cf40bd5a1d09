//! Agent cycle pipeline: observe → reason → decide → act → learn.
//!
//! One `execute_cycle` call runs the full pipeline against the current ring
//! buffer contents and applies the resulting decision to the feedback
//! controller, then persists a snapshot. The orchestrator owns the cycle
//! counter and everything that must survive a restart routes through it.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{info, warn};

use crate::agent::config::AppConfig;
use crate::agent::decision::{
    Decision, DecisionPolicy, DecisionState, InterventionPlanner, NrvCalculator,
};
use crate::agent::explain::{Explanation, ExplanationGenerator};
use crate::agent::learning::OutcomeEvaluator;
use crate::agent::memory::{AgentSnapshot, AuditEvent, AuditLog, SnapshotManager, SNAPSHOT_VERSION};
use crate::agent::observation::{
    BaselineManager, IngestValidator, ObservationWindow,
};
use crate::agent::reasoning::{
    AnomalyDetector, BeliefTracker, HypothesisGenerator, PatternClassifier,
};
use crate::agent::telemetry::CycleStatus;
use crate::intervention::RollbackCondition;
use crate::stream::feedback::{ActiveIntervention, FeedbackController, ManualRollback};
use crate::types::Transaction;

/// How many points the telemetry series keep.
const SERIES_CAP: usize = 40;

/// Everything a cycle produces.
pub struct CycleReport {
    pub decision: Decision,
    pub explanation: Explanation,
    pub status: CycleStatus,
    pub applied_intervention_id: Option<u64>,
}

pub struct AgentOrchestrator {
    window: ObservationWindow,
    baselines: BaselineManager,
    validator: IngestValidator,
    anomaly: AnomalyDetector,
    classifier: PatternClassifier,
    hypotheses: HypothesisGenerator,
    beliefs: BeliefTracker,
    planner: InterventionPlanner,
    policy: DecisionPolicy,
    evaluator: OutcomeEvaluator,
    audit: AuditLog,
    snapshots: SnapshotManager,
    cycle_counter: u64,
    rng_seed: u64,
    /// Soft wall-clock budget for one cycle.
    cycle_budget_ms: u64,
    /// Global success rate from the most recent cycle with traffic; used by
    /// out-of-cycle paths such as manual rollbacks.
    last_global_success_rate: f64,
    success_series: VecDeque<f64>,
    latency_series: VecDeque<f64>,
}

impl AgentOrchestrator {
    /// Build from config, restoring the last snapshot when present.
    ///
    /// Returns the restored active interventions so the caller can hand them
    /// to the feedback controller.
    pub fn new(
        config: &AppConfig,
        rng_seed: u64,
        snapshot_path: Option<String>,
    ) -> (Self, Vec<ActiveIntervention>) {
        let agent = &config.agent;
        let snapshots = SnapshotManager::new(
            snapshot_path.unwrap_or_else(|| config.memory.snapshot_path.clone()),
        );

        let mut orchestrator = Self {
            window: ObservationWindow::new(agent.window_duration_ms),
            baselines: BaselineManager::new(agent.baseline_alpha),
            validator: IngestValidator::new(),
            anomaly: AnomalyDetector::new(
                agent.anomaly_threshold,
                agent.min_samples,
                agent.min_baseline_cycles,
            ),
            classifier: PatternClassifier::new(
                agent.anomaly_threshold,
                agent.sla_p95_ms,
                agent.min_samples,
            ),
            hypotheses: HypothesisGenerator::new(),
            beliefs: BeliefTracker::new(agent.uncertainty_threshold),
            planner: InterventionPlanner::new(),
            policy: DecisionPolicy::new(
                NrvCalculator::new(config.nrv_params()),
                config.guardrails(),
                agent.min_action_frequency_cycles,
            ),
            evaluator: OutcomeEvaluator::new((agent.cycle_interval_s * 1000.0) as u64),
            audit: AuditLog::new(&config.memory.audit_path),
            snapshots,
            cycle_counter: 0,
            rng_seed,
            cycle_budget_ms: (agent.cycle_interval_s * 500.0) as u64,
            last_global_success_rate: 1.0,
            success_series: VecDeque::new(),
            latency_series: VecDeque::new(),
        };

        let restored = orchestrator.restore();
        (orchestrator, restored)
    }

    fn restore(&mut self) -> Vec<ActiveIntervention> {
        match self.snapshots.load() {
            Ok(Some(snapshot)) => {
                self.cycle_counter = snapshot.cycle_counter;
                self.rng_seed = snapshot.rng_seed;
                self.policy.restore_streak(snapshot.no_action_streak);
                self.baselines.restore(snapshot.baselines);
                info!(
                    target: crate::log_targets::MEMORY,
                    cycle = self.cycle_counter,
                    interventions = snapshot.active_interventions.len(),
                    "Resuming from snapshot"
                );
                snapshot.active_interventions
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                // Unreadable snapshot: start from defaults.
                warn!(
                    target: crate::log_targets::MEMORY,
                    error = %e,
                    "Snapshot load failed, starting fresh"
                );
                Vec::new()
            }
        }
    }

    pub fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }

    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    /// Run one full agent cycle.
    pub fn execute_cycle(
        &mut self,
        now_ms: u64,
        mut buffer: Vec<Transaction>,
        total_generated: u64,
        feedback: &mut FeedbackController,
    ) -> CycleReport {
        let started = Instant::now();
        self.cycle_counter += 1;
        info!(
            target: crate::log_targets::LOOP,
            cycle = self.cycle_counter,
            buffered = buffer.len(),
            "Cycle start"
        );

        // --- Observe ---
        self.validator.filter_batch(&mut buffer);
        self.window.refresh(&buffer, now_ms);
        let stats = self.window.aggregate();
        let global = stats.global();

        // --- Reason (baselines fold in before the anomaly check) ---
        self.baselines.update(&stats, now_ms);
        let signals = self.anomaly.scan(&stats, &self.baselines);
        let max_z = signals
            .iter()
            .map(|s| s.z.abs())
            .fold(0.0_f64, f64::max);
        let patterns = self
            .classifier
            .classify(&signals, &stats, &self.baselines, now_ms);
        let hypotheses = self.hypotheses.generate(&patterns);
        let beliefs = self.beliefs.update(hypotheses.clone(), now_ms);

        // --- Rollback watch on interventions applied in earlier cycles ---
        if global.total > 0 {
            self.last_global_success_rate = global.success_rate;
            for (rolled_back, condition) in
                feedback.check_rollbacks(now_ms, global.success_rate)
            {
                self.evaluator.record_rollback(&rolled_back);
                self.audit.append(&AuditEvent::rollback(
                    self.cycle_counter,
                    &rolled_back,
                    global.success_rate,
                    condition,
                    now_ms,
                ));
            }
        }

        // --- Decide ---
        let options = self.planner.generate_options(&patterns);
        let mut decision = self.policy.decide(
            options,
            &beliefs,
            global.total,
            !patterns.is_empty(),
        );

        // --- Act ---
        let mut applied_intervention_id = None;
        if decision.should_act {
            if let Some(option) = &decision.selected_option {
                if decision.requires_human_approval {
                    self.evaluator.record_escalation();
                    info!(
                        target: crate::log_targets::DECIDE,
                        kind = %option.kind,
                        "Escalated to human approval, not executing"
                    );
                } else {
                    let detected_at = patterns
                        .iter()
                        .map(|p| p.detected_at_ms)
                        .min()
                        .unwrap_or(now_ms);
                    let id = feedback.apply(option.clone(), now_ms, global.success_rate);
                    self.evaluator.record_applied(
                        id,
                        option,
                        &option.parameters.reason,
                        global.success_rate,
                        detected_at,
                        now_ms,
                    );
                    applied_intervention_id = Some(id);
                    decision.state = DecisionState::Acting;
                }
            }
        }

        // --- Learn ---
        if global.total > 0 {
            self.evaluator.evaluate(global.success_rate, now_ms);
        }

        // --- Record ---
        self.audit
            .append(&AuditEvent::from_decision(self.cycle_counter, &decision, now_ms));

        let explanation =
            ExplanationGenerator::explain(&patterns, &hypotheses, &beliefs, &decision, max_z);

        push_capped(&mut self.success_series, global.success_rate * 100.0);
        push_capped(&mut self.latency_series, global.avg_latency_ms);

        let mut thinking_log = vec![explanation.summary.clone()];
        thinking_log.extend(explanation.detail.iter().take(8).cloned());

        let status = CycleStatus {
            timestamp: now_ms / 1000,
            thinking_log,
            total_volume: total_generated,
            fail_rate: ((1.0 - global.success_rate) * 100.0 * 100.0).round() / 100.0,
            active_gateway: "gateway-primary".to_string(),
            success_series: self.success_series.iter().copied().collect(),
            latency_series: self.latency_series.iter().copied().collect(),
            nrv: decision.nrv,
            confidence: (beliefs.max_confidence * 1000.0).round() / 10.0,
            intervention_history: self.evaluator.history(),
            safety_metrics: self.evaluator.safety_metrics(),
        };

        // --- Persist ---
        self.persist(now_ms, feedback);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > self.cycle_budget_ms {
            warn!(
                target: crate::log_targets::LOOP,
                cycle = self.cycle_counter,
                elapsed_ms,
                budget_ms = self.cycle_budget_ms,
                "Cycle overran soft budget"
            );
        }
        info!(
            target: crate::log_targets::LOOP,
            cycle = self.cycle_counter,
            acted = decision.should_act,
            nrv = format!("{:.2}", decision.nrv),
            patterns = patterns.len(),
            "Cycle complete"
        );

        CycleReport {
            decision,
            explanation,
            status,
            applied_intervention_id,
        }
    }

    /// Operator-initiated rollback, routed in from the telemetry socket.
    ///
    /// A rollback that cannot complete escalates with a high-severity audit
    /// record; the intervention, when still present, stays marked
    /// `rolled_back_failed`.
    pub fn handle_manual_rollback(
        &mut self,
        id: u64,
        now_ms: u64,
        feedback: &mut FeedbackController,
    ) {
        match feedback.rollback_manual(id) {
            ManualRollback::Completed(entry) => {
                self.evaluator.record_rollback(&entry);
                self.audit.append(&AuditEvent::rollback(
                    self.cycle_counter,
                    &entry,
                    self.last_global_success_rate,
                    RollbackCondition::Manual,
                    now_ms,
                ));
            }
            ManualRollback::Failed(entry) => {
                self.audit.append(&AuditEvent::rollback_failed(
                    self.cycle_counter,
                    entry.id,
                    format!(
                        "intervention {} is past its deadline and cannot be rolled back; \
                         marked rolled_back_failed",
                        entry.id
                    ),
                    now_ms,
                ));
            }
            ManualRollback::NotFound => {
                self.audit.append(&AuditEvent::rollback_failed(
                    self.cycle_counter,
                    id,
                    format!("no active intervention with id {id}"),
                    now_ms,
                ));
            }
        }
    }

    /// Save the snapshot. Failures keep in-memory state and retry next cycle.
    pub fn persist(&mut self, now_ms: u64, feedback: &FeedbackController) {
        let snapshot = AgentSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: now_ms,
            cycle_counter: self.cycle_counter,
            rng_seed: self.rng_seed,
            no_action_streak: self.policy.no_action_streak(),
            baselines: self.baselines.export(),
            active_interventions: feedback.active().to_vec(),
        };
        if let Err(e) = self.snapshots.save(&snapshot) {
            warn!(
                target: crate::log_targets::MEMORY,
                error = %e,
                "Snapshot save failed, keeping in-memory state"
            );
        }
    }

    pub fn baselines(&self) -> &BaselineManager {
        &self.baselines
    }

    pub fn ingest_quality(&self) -> (u64, u64) {
        (self.validator.accepted(), self.validator.rejected())
    }
}

fn push_capped(series: &mut VecDeque<f64>, value: f64) {
    if series.len() == SERIES_CAP {
        series.pop_front();
    }
    series.push_back(value);
}

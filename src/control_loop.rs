//! Continuous control loop: the cooperative tick driver.
//!
//! Every tick, in order: intervention expiry, drift update, generation.
//! Every `cycle_interval` of simulated time, the agent cycle runs and its
//! decision lands in the feedback controller before the next batch is
//! generated — the same thread runs both, so the ordering guarantees are
//! structural, not timing-dependent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::info;

use tokio::sync::mpsc;

use crate::agent::config::AppConfig;
use crate::agent::telemetry::{self, TelemetryCommand, TelemetryState};
use crate::agent::AgentOrchestrator;
use crate::stream::{DriftEngine, FeedbackController, TransactionGenerator};

/// RNG sub-stream salts so drift and generation consume independent
/// sequences from the one master seed.
const DRIFT_STREAM_SALT: u64 = 0x9E37_79B9_7F4A_7C15;
const GENERATOR_STREAM_SALT: u64 = 0xD1B5_4A32_D192_ED03;

pub struct ControlLoop {
    drift: DriftEngine,
    generator: TransactionGenerator,
    feedback: FeedbackController,
    orchestrator: AgentOrchestrator,
    telemetry: Arc<TelemetryState>,
    commands: mpsc::UnboundedReceiver<TelemetryCommand>,
    shutdown: Arc<AtomicBool>,
    tick_interval_ms: u64,
    cycle_interval_ms: u64,
    time_scale: f64,
    duration_ms: Option<u64>,
    status_log_interval_ms: u64,
}

impl ControlLoop {
    /// Assemble the full system from config.
    ///
    /// The master seed comes from config when set, otherwise from the clock;
    /// a restored snapshot's seed wins over both so a resumed run keeps its
    /// stochastic identity.
    pub fn new(config: &AppConfig, snapshot_path: Option<String>) -> Self {
        let configured_seed = config.simulation.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64
        });

        let (orchestrator, restored_interventions) =
            AgentOrchestrator::new(config, configured_seed, snapshot_path);
        let seed = orchestrator.rng_seed();

        let drift = DriftEngine::new(
            config.drift_params(),
            config.issuer_states(),
            seed ^ DRIFT_STREAM_SALT,
        );
        let generator =
            TransactionGenerator::new(config.generator_params(), seed ^ GENERATOR_STREAM_SALT);

        let mut feedback = FeedbackController::new(config.safety.ramp_back_ms);
        if !restored_interventions.is_empty() {
            info!(
                target: crate::log_targets::LOOP,
                count = restored_interventions.len(),
                "Resuming active interventions from snapshot"
            );
            feedback.restore(restored_interventions);
        }

        let (telemetry, commands) = TelemetryState::new(64);
        let telemetry = Arc::new(telemetry);
        telemetry::spawn_server(telemetry.clone(), &config.telemetry_config());

        Self {
            drift,
            generator,
            feedback,
            orchestrator,
            telemetry,
            commands,
            shutdown: Arc::new(AtomicBool::new(false)),
            tick_interval_ms: config.simulation.tick_interval_ms,
            cycle_interval_ms: (config.agent.cycle_interval_s * 1000.0) as u64,
            time_scale: config.simulation.time_scale,
            duration_ms: config
                .simulation
                .duration_seconds
                .map(|s| (s * 1000.0) as u64),
            status_log_interval_ms: 60_000,
        }
    }

    /// Flag checked once per tick; flipping it ends the run after the
    /// current cycle is persisted.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Drive the loop until shutdown or the configured duration elapses.
    pub async fn run(&mut self) {
        let start_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let mut sim_now_ms = start_ms;
        let mut last_cycle_ms = start_ms;
        let mut last_status_ms = start_ms;
        let dt_s = self.tick_interval_ms as f64 / 1000.0 * self.time_scale;
        let sim_tick_ms = (self.tick_interval_ms as f64 * self.time_scale) as u64;

        info!(
            target: crate::log_targets::LOOP,
            tick_ms = self.tick_interval_ms,
            cycle_interval_ms = self.cycle_interval_ms,
            time_scale = self.time_scale,
            "Control loop starting"
        );

        let mut interval = tokio::time::interval(Duration::from_millis(self.tick_interval_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            sim_now_ms += sim_tick_ms.max(1);

            // Expire interventions before generating so stale multipliers
            // never touch new transactions.
            for expired in self.feedback.tick(sim_now_ms) {
                info!(
                    target: crate::log_targets::LOOP,
                    id = expired.id,
                    kind = %expired.option.kind,
                    "Intervention fully expired, parameters back to nominal"
                );
            }
            self.drift.update(dt_s, sim_now_ms);
            let _ = self
                .generator
                .generate(dt_s, sim_now_ms, &self.drift, &self.feedback);

            // Operator commands from the telemetry socket.
            while let Ok(command) = self.commands.try_recv() {
                match command {
                    TelemetryCommand::RollbackIntervention { id } => {
                        self.orchestrator
                            .handle_manual_rollback(id, sim_now_ms, &mut self.feedback);
                    }
                    TelemetryCommand::Ping { .. } => {}
                }
            }

            let shutting_down = self.shutdown.load(Ordering::Relaxed);
            let duration_reached = self
                .duration_ms
                .map(|d| sim_now_ms.saturating_sub(start_ms) >= d)
                .unwrap_or(false);

            if sim_now_ms.saturating_sub(last_cycle_ms) >= self.cycle_interval_ms
                || shutting_down
                || duration_reached
            {
                self.run_cycle(sim_now_ms);
                last_cycle_ms = sim_now_ms;
            }

            if sim_now_ms.saturating_sub(last_status_ms) >= self.status_log_interval_ms {
                self.log_status(sim_now_ms.saturating_sub(start_ms));
                last_status_ms = sim_now_ms;
            }

            if shutting_down || duration_reached {
                if duration_reached && !shutting_down {
                    info!(
                        target: crate::log_targets::LOOP,
                        "Configured duration reached"
                    );
                }
                break;
            }
        }

        // Final persist so a restart resumes exactly here.
        self.orchestrator.persist(sim_now_ms, &self.feedback);
        info!(
            target: crate::log_targets::LOOP,
            cycles = self.orchestrator.cycle_counter(),
            transactions = self.generator.total_generated(),
            active_interventions = self.feedback.active_count(),
            "Control loop stopped"
        );
    }

    fn run_cycle(&mut self, sim_now_ms: u64) {
        let buffer = self.generator.buffer().snapshot();
        let report = self.orchestrator.execute_cycle(
            sim_now_ms,
            buffer,
            self.generator.total_generated(),
            &mut self.feedback,
        );
        self.telemetry.publish(&report.status);
    }

    fn log_status(&self, elapsed_ms: u64) {
        let (accepted, rejected) = self.orchestrator.ingest_quality();
        info!(
            target: crate::log_targets::LOOP,
            elapsed_s = elapsed_ms / 1000,
            cycles = self.orchestrator.cycle_counter(),
            transactions = self.generator.total_generated(),
            buffer = self.generator.buffer().len(),
            active_interventions = self.feedback.active_count(),
            interventions_applied = self.feedback.total_applied(),
            ingest_accepted = accepted,
            ingest_rejected = rejected,
            "Status"
        );
        for (issuer, state) in self.drift.states() {
            info!(
                target: crate::log_targets::LOOP,
                issuer = %issuer,
                success = format!("{:.1}%", state.success_rate * 100.0),
                latency_ms = format!("{:.0}", state.latency_ms),
                retry = format!("{:.1}%", state.retry_prob * 100.0),
                "Issuer health"
            );
        }
    }
}

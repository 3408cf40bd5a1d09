//! Snapshot persistence for warm-restarting the agent.
//!
//! After every cycle the orchestrator saves the cross-cycle state: active
//! interventions, rolling baselines, the cycle counter, the RNG seed, and
//! the policy's NO-ACTION streak. On startup the last snapshot is restored
//! so interventions resume with their original deadlines and baselines never
//! reset.
//!
//! Writes are atomic: serialize to `<path>.tmp`, then rename. Unknown fields
//! in an older or newer snapshot are ignored on load.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::observation::RollingBaseline;
use crate::errors::SnapshotError;
use crate::stream::feedback::ActiveIntervention;
use crate::types::Dimension;

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything that must survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    #[serde(default)]
    pub version: u32,
    pub saved_at_ms: u64,
    pub cycle_counter: u64,
    pub rng_seed: u64,
    #[serde(default)]
    pub no_action_streak: u32,
    pub baselines: Vec<(Dimension, RollingBaseline)>,
    pub active_interventions: Vec<ActiveIntervention>,
}

/// Saves and loads agent snapshots at a fixed path.
pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically persist a snapshot.
    pub fn save(&self, snapshot: &AgentSnapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| SnapshotError::Serialize(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, &self.path)?;

        info!(
            target: crate::log_targets::MEMORY,
            cycle = snapshot.cycle_counter,
            baselines = snapshot.baselines.len(),
            interventions = snapshot.active_interventions.len(),
            "Snapshot saved to {}",
            self.path.display()
        );
        Ok(())
    }

    /// Load the last snapshot. `Ok(None)` when no snapshot exists.
    pub fn load(&self) -> Result<Option<AgentSnapshot>, SnapshotError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        let snapshot: AgentSnapshot = serde_json::from_str(&json)
            .map_err(|e| SnapshotError::Deserialize(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            warn!(
                target: crate::log_targets::MEMORY,
                found = snapshot.version,
                expected = SNAPSHOT_VERSION,
                "Snapshot version mismatch, loading anyway"
            );
        }
        info!(
            target: crate::log_targets::MEMORY,
            cycle = snapshot.cycle_counter,
            interventions = snapshot.active_interventions.len(),
            "Snapshot loaded from {}",
            self.path.display()
        );
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::{
        InterventionOption, InterventionParameters, InterventionPhase, InterventionTarget,
        InterventionType, OutcomeEstimate, Tradeoffs,
    };
    use crate::types::Issuer;

    fn sample_snapshot() -> AgentSnapshot {
        let mut baseline = RollingBaseline::new(0.1);
        for i in 0..5 {
            baseline.update(0.95, 200.0, 0.05, i * 1_000);
        }
        AgentSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at_ms: 123_456,
            cycle_counter: 42,
            rng_seed: 7,
            no_action_streak: 3,
            baselines: vec![(Dimension::Issuer(Issuer::Hdfc), baseline)],
            active_interventions: vec![ActiveIntervention {
                id: 9,
                option: InterventionOption {
                    kind: InterventionType::SuppressPath,
                    target: InterventionTarget::Issuer(Issuer::Icici),
                    parameters: InterventionParameters::with_duration(300_000, "issuer_outage"),
                    expected_outcome: OutcomeEstimate {
                        success_rate_change: 0.1,
                        latency_change_ms: -50.0,
                        cost_change: 0.05,
                        confidence: 0.7,
                    },
                    tradeoffs: Tradeoffs::NEUTRAL,
                    reversible: true,
                    blast_radius: 0.2,
                },
                start_ms: 100_000,
                end_ms: 400_000,
                phase: InterventionPhase::Acting,
                reference_success_rate: 0.93,
                rollback_conditions: Vec::new(),
                degraded_cycles: 1,
            }],
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = std::env::temp_dir().join("payops_snapshot_rt");
        let _ = fs::remove_dir_all(&dir);
        let manager = SnapshotManager::new(dir.join("state.json"));

        let snapshot = sample_snapshot();
        manager.save(&snapshot).unwrap();
        let loaded = manager.load().unwrap().expect("snapshot present");
        assert_eq!(loaded, snapshot);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_snapshot_is_none() {
        let manager = SnapshotManager::new("/nonexistent-dir-payops/state.json");
        assert!(manager.load().unwrap().is_none());
    }

    #[test]
    fn test_unknown_fields_ignored_on_load() {
        let dir = std::env::temp_dir().join("payops_snapshot_unknown");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let mut value = serde_json::to_value(sample_snapshot()).unwrap();
        value["some_future_field"] = serde_json::json!({"a": 1});
        fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let manager = SnapshotManager::new(&path);
        let loaded = manager.load().unwrap().expect("snapshot present");
        assert_eq!(loaded.cycle_counter, 42);
        let _ = fs::remove_dir_all(&dir);
    }
}

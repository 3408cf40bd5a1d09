//! Append-only audit log: newline-delimited JSON, one record per decision
//! plus high-severity records for rollbacks.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, warn};

use crate::agent::decision::Decision;
use crate::intervention::{InterventionType, RollbackCondition};

/// One audit record. Tagged by event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Decision {
        cycle_id: u64,
        decision: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        option: Option<InterventionType>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        guardrail_outcome: String,
        nrv: f64,
        min_freq_triggered: bool,
        requires_human_approval: bool,
        rationale: String,
        timestamp_ms: u64,
    },
    Rollback {
        cycle_id: u64,
        intervention_id: u64,
        option: InterventionType,
        target: String,
        severity: &'static str,
        condition: RollbackCondition,
        reference_success_rate: f64,
        observed_success_rate: f64,
        timestamp_ms: u64,
    },
    RollbackFailed {
        cycle_id: u64,
        intervention_id: u64,
        severity: &'static str,
        detail: String,
        timestamp_ms: u64,
    },
}

impl AuditEvent {
    pub fn from_decision(cycle_id: u64, decision: &Decision, timestamp_ms: u64) -> Self {
        AuditEvent::Decision {
            cycle_id,
            decision: if decision.should_act { "act" } else { "no_action" },
            option: decision.selected_option.as_ref().map(|o| o.kind),
            target: decision
                .selected_option
                .as_ref()
                .map(|o| o.target.to_string()),
            guardrail_outcome: decision.guardrail_outcome.clone(),
            nrv: decision.nrv,
            min_freq_triggered: decision.min_freq_triggered,
            requires_human_approval: decision.requires_human_approval,
            rationale: decision.rationale.clone(),
            timestamp_ms,
        }
    }

    pub fn rollback(
        cycle_id: u64,
        intervention: &crate::stream::feedback::ActiveIntervention,
        observed_success_rate: f64,
        condition: RollbackCondition,
        timestamp_ms: u64,
    ) -> Self {
        AuditEvent::Rollback {
            cycle_id,
            intervention_id: intervention.id,
            option: intervention.option.kind,
            target: intervention.option.target.to_string(),
            severity: "high",
            condition,
            reference_success_rate: intervention.reference_success_rate,
            observed_success_rate,
            timestamp_ms,
        }
    }

    pub fn rollback_failed(
        cycle_id: u64,
        intervention_id: u64,
        detail: String,
        timestamp_ms: u64,
    ) -> Self {
        AuditEvent::RollbackFailed {
            cycle_id,
            intervention_id,
            severity: "high",
            detail,
            timestamp_ms,
        }
    }
}

/// Appends NDJSON records to a per-run audit file. Write failures are logged
/// and swallowed; auditing must never take down the control loop.
pub struct AuditLog {
    path: PathBuf,
    file: Option<File>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = Self::open(&path);
        if file.is_none() {
            warn!(
                target: crate::log_targets::MEMORY,
                "Audit log unavailable at {}",
                path.display()
            );
        }
        Self { path, file }
    }

    fn open(path: &Path) -> Option<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && fs::create_dir_all(parent).is_err() {
                return None;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    }

    /// Append one record. Retries the open once if the file handle was lost.
    pub fn append(&mut self, event: &AuditEvent) {
        if self.file.is_none() {
            self.file = Self::open(&self.path);
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                error!(
                    target: crate::log_targets::MEMORY,
                    error = %e,
                    "Audit serialization failed"
                );
                return;
            }
        };
        if let Err(e) = writeln!(file, "{line}") {
            error!(
                target: crate::log_targets::MEMORY,
                error = %e,
                "Audit write failed"
            );
            self.file = None;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::decision::DecisionState;

    fn decision() -> Decision {
        Decision {
            should_act: true,
            selected_option: None,
            rationale: "forced".to_string(),
            alternatives: Vec::new(),
            requires_human_approval: false,
            nrv: -5.0,
            min_freq_triggered: true,
            guardrail_outcome: "pass".to_string(),
            state: DecisionState::OptionSelected,
        }
    }

    #[test]
    fn test_append_writes_ndjson_lines() {
        let dir = std::env::temp_dir().join("payops_audit_test");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("audit.ndjson");
        let mut log = AuditLog::new(&path);

        log.append(&AuditEvent::from_decision(1, &decision(), 1_000));
        log.append(&AuditEvent::from_decision(2, &decision(), 2_000));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["event"], "decision");
            assert_eq!(value["min_freq_triggered"], true);
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rollback_failed_record_is_high_severity() {
        let event = AuditEvent::rollback_failed(
            3,
            9,
            "no active intervention with id 9".to_string(),
            5_000,
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "rollback_failed");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["intervention_id"], 9);
    }
}

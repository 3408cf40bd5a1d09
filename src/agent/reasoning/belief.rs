//! Belief state: the agent's current best reading of system health.
//!
//! Holds a small per-dimension cache of the latest hypotheses. Dimensions
//! that stop producing hypotheses age out after a few cycles so stale
//! beliefs do not keep influencing decisions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::reasoning::hypothesis::Hypothesis;
use crate::types::Dimension;

/// Cycles a dimension's beliefs survive without fresh hypotheses.
const BELIEF_TTL_CYCLES: u64 = 3;

/// Snapshot of the agent's beliefs after a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    pub hypotheses: Vec<Hypothesis>,
    /// 1.0 = fully healthy.
    pub system_health: f64,
    /// 1 − max hypothesis confidence; 0 when no hypotheses are active.
    pub uncertainty: f64,
    pub max_confidence: f64,
    /// True when the best hypothesis is below the uncertainty threshold.
    pub uncertain: bool,
    pub last_updated_ms: u64,
}

impl BeliefState {
    pub fn healthy(now_ms: u64) -> Self {
        Self {
            hypotheses: Vec::new(),
            system_health: 1.0,
            uncertainty: 0.0,
            max_confidence: 0.0,
            uncertain: false,
            last_updated_ms: now_ms,
        }
    }
}

struct CachedBeliefs {
    hypotheses: Vec<Hypothesis>,
    last_seen_cycle: u64,
}

/// Maintains the belief cache across cycles.
pub struct BeliefTracker {
    cache: HashMap<Dimension, CachedBeliefs>,
    uncertainty_threshold: f64,
    cycle: u64,
}

impl BeliefTracker {
    pub fn new(uncertainty_threshold: f64) -> Self {
        Self {
            cache: HashMap::new(),
            uncertainty_threshold,
            cycle: 0,
        }
    }

    /// Fold this cycle's hypotheses in and produce the current belief state.
    pub fn update(&mut self, hypotheses: Vec<Hypothesis>, now_ms: u64) -> BeliefState {
        self.cycle += 1;

        for hypothesis in hypotheses {
            let entry = self
                .cache
                .entry(hypothesis.dimension)
                .or_insert_with(|| CachedBeliefs {
                    hypotheses: Vec::new(),
                    last_seen_cycle: self.cycle,
                });
            if entry.last_seen_cycle < self.cycle {
                // First hypothesis for this dimension this cycle replaces
                // last cycle's set.
                entry.hypotheses.clear();
                entry.last_seen_cycle = self.cycle;
            }
            entry.hypotheses.push(hypothesis);
        }

        let cycle = self.cycle;
        self.cache
            .retain(|_, cached| cycle - cached.last_seen_cycle < BELIEF_TTL_CYCLES);

        let active: Vec<Hypothesis> = self
            .cache
            .values()
            .flat_map(|c| c.hypotheses.iter().cloned())
            .collect();

        let max_confidence = active.iter().map(|h| h.confidence).fold(0.0, f64::max);
        let avg_confidence = if active.is_empty() {
            0.0
        } else {
            active.iter().map(|h| h.confidence).sum::<f64>() / active.len() as f64
        };
        let uncertain = !active.is_empty() && max_confidence < self.uncertainty_threshold;

        let state = BeliefState {
            system_health: (1.0 - avg_confidence * 0.5).clamp(0.0, 1.0),
            uncertainty: if active.is_empty() {
                0.0
            } else {
                1.0 - max_confidence
            },
            max_confidence,
            uncertain,
            last_updated_ms: now_ms,
            hypotheses: active,
        };

        debug!(
            target: crate::log_targets::REASON,
            hypotheses = state.hypotheses.len(),
            health = format!("{:.2}", state.system_health),
            uncertainty = format!("{:.2}", state.uncertainty),
            uncertain = state.uncertain,
            "Beliefs updated"
        );
        state
    }
}

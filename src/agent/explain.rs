//! Explanation generation: a one-line executive summary plus structured
//! detail for each cycle, feeding logs and the telemetry thinking log.

use crate::agent::decision::Decision;
use crate::agent::reasoning::{BeliefState, DetectedPattern, Hypothesis};

/// Dual-register explanation of one cycle.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub summary: String,
    pub detail: Vec<String>,
    pub confidence: f64,
    pub uncertain: bool,
}

pub struct ExplanationGenerator;

impl ExplanationGenerator {
    pub fn explain(
        patterns: &[DetectedPattern],
        hypotheses: &[Hypothesis],
        beliefs: &BeliefState,
        decision: &Decision,
        max_z: f64,
    ) -> Explanation {
        let mut detail = Vec::new();

        let summary = if patterns.is_empty() {
            if decision.min_freq_triggered {
                "Stream nominal; cadence alert issued by minimum-frequency rule".to_string()
            } else {
                "Stream nominal; monitoring".to_string()
            }
        } else {
            let lead = &patterns[0];
            let action = match &decision.selected_option {
                Some(option) if decision.should_act => format!("applying {}", option.kind),
                _ => "holding".to_string(),
            };
            let certainty = if beliefs.uncertain {
                " (diagnosis uncertain)"
            } else {
                ""
            };
            format!(
                "{} on {} (severity {:.2}){certainty}; {action}",
                lead.pattern, lead.dimension, lead.severity
            )
        };

        for pattern in patterns {
            detail.push(format!(
                "pattern {} on {} severity {:.2}",
                pattern.pattern, pattern.dimension, pattern.severity
            ));
        }
        for hypothesis in hypotheses {
            detail.push(format!(
                "hypothesis {} ({:.0}% confidence): {}",
                hypothesis.root_cause,
                hypothesis.confidence * 100.0,
                hypothesis.description
            ));
        }
        if max_z.abs() > 0.0 {
            detail.push(format!("max |Z| this cycle: {:.2}", max_z.abs()));
        }
        if beliefs.uncertain {
            detail.push(format!(
                "belief state uncertain: best hypothesis at {:.0}% confidence",
                beliefs.max_confidence * 100.0
            ));
        }
        detail.push(format!("decision: {}", decision.rationale));

        Explanation {
            summary,
            detail,
            confidence: beliefs.max_confidence,
            uncertain: beliefs.uncertain,
        }
    }
}

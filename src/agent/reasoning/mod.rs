//! Reasoning layer: anomaly scan → pattern classification → hypotheses →
//! belief state.

pub mod anomaly;
pub mod belief;
pub mod hypothesis;
pub mod pattern;

pub use anomaly::{AnomalyDetector, AnomalySignal};
pub use belief::{BeliefState, BeliefTracker};
pub use hypothesis::{Hypothesis, HypothesisGenerator, ImpactEstimate};
pub use pattern::{DetectedPattern, Evidence, PatternClassifier, PatternType};

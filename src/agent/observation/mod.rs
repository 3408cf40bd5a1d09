//! Observation layer: sliding window, rolling baselines, ingest validation.

pub mod baseline;
pub mod validator;
pub mod window;

pub use baseline::{BaselineManager, Metric, RollingBaseline};
pub use validator::IngestValidator;
pub use window::{DimensionStats, ObservationWindow, WindowStats};

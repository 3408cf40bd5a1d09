//! Payment-stream simulation: drift engine, transaction generator, and the
//! feedback controller that closes the loop between decisions and future
//! generation.

pub mod buffer;
pub mod drift;
pub mod feedback;
pub mod generator;

pub use buffer::TransactionBuffer;
pub use drift::{DriftEngine, DriftParams, IssuerState, OuParams};
pub use feedback::{ActiveIntervention, FeedbackController, ManualRollback};
pub use generator::{GeneratorParams, RateSchedule, TransactionGenerator};

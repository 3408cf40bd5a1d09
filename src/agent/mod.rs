//! The autonomous operations agent: observation, reasoning, decision,
//! explanation, learning, persistence, and the per-cycle orchestrator.

pub mod config;
pub mod decision;
pub mod explain;
pub mod learning;
pub mod memory;
pub mod observation;
pub mod orchestrator;
pub mod reasoning;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use config::AppConfig;
pub use orchestrator::{AgentOrchestrator, CycleReport};

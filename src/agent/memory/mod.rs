//! Persistence: snapshots for warm restart and the append-only audit log.

pub mod audit;
pub mod snapshot;

pub use audit::{AuditEvent, AuditLog};
pub use snapshot::{AgentSnapshot, SnapshotManager, SNAPSHOT_VERSION};

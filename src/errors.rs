use thiserror::Error;

/// Configuration validation errors.
///
/// These are the only fatal errors in the system: an invalid configuration
/// rejects the run at startup. Everything downstream recovers locally.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("Invalid value for '{key}': {value} (expected {expected})")]
    OutOfRange {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Unknown issuer '{0}' in config (valid: HDFC, ICICI, AXIS, SBI)")]
    UnknownIssuer(String),

    #[error("Config section '{0}' is empty but required")]
    EmptySection(String),
}

/// Transaction ingest errors. A record failing validation is dropped and
/// counted; the stream continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Timestamp {0} is outside the plausible range")]
    BadTimestamp(u64),

    #[error("Latency {0}ms is outside [0, 60000]")]
    BadLatency(u32),

    #[error("Retry count {0} exceeds hard cap")]
    BadRetryCount(u8),

    #[error("Non-positive amount {0}")]
    BadAmount(f64),
}

/// Snapshot persistence errors. Write failures keep in-memory state and
/// retry next cycle; read failures fall back to defaults.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialize(String),

    #[error("Snapshot deserialization error: {0}")]
    Deserialize(String),
}

/// Main crate error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Audit log error: {0}")]
    Audit(String),

    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl Error {
    /// Create a range-violation config error.
    pub fn out_of_range(
        key: impl Into<String>,
        value: impl ToString,
        expected: impl Into<String>,
    ) -> Self {
        Error::Config(ConfigError::OutOfRange {
            key: key.into(),
            value: value.to_string(),
            expected: expected.into(),
        })
    }
}

//! Structured logging setup.
//!
//! Component log targets allow per-subsystem filtering:
//!
//! | Target | Description |
//! |--------|-------------|
//! | `payops::stream`    | Drift, generation, feedback multipliers |
//! | `payops::observe`   | Window, baselines, ingest quality |
//! | `payops::reason`    | Anomalies, patterns, hypotheses |
//! | `payops::decide`    | Options, NRV, policy, outcomes |
//! | `payops::loop`      | Control loop lifecycle |
//! | `payops::memory`    | Snapshots and audit log |
//! | `payops::telemetry` | WebSocket broadcast |
//!
//! ```bash
//! # Debug only the decision layer
//! RUST_LOG=info,payops::decide=debug payops-agent run
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, for development.
    #[default]
    Pretty,
    /// JSON, for log aggregation.
    Json,
    /// Compact single-line.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Base level when RUST_LOG is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// When set, also write daily-rotated JSON logs to this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            log_dir: None,
        }
    }
}

/// Initialize the global subscriber.
///
/// Returns `WorkerGuard`s that must stay alive for the program's lifetime so
/// file logs are flushed.
pub fn init_logging(
    config: &LogConfig,
    env_filter_override: Option<&str>,
) -> Result<Vec<WorkerGuard>, Box<dyn std::error::Error>> {
    let mut guards = Vec::new();

    let base_filter = if let Some(filter) = env_filter_override {
        EnvFilter::new(filter)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "payops-agent.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new(&config.level));

        match config.format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(file_layer)
                    .with(fmt::layer().json().with_filter(base_filter))
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::registry()
                    .with(file_layer)
                    .with(fmt::layer().compact().with_filter(base_filter))
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(file_layer)
                    .with(fmt::layer().with_target(false).with_filter(base_filter))
                    .init();
            }
        }
    } else {
        match config.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .json()
                    .init();
            }
            LogFormat::Compact => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .compact()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .with_env_filter(base_filter)
                    .with_target(false)
                    .init();
            }
        }
    }

    Ok(guards)
}

/// Log target constants for component-specific filtering.
///
/// ```ignore
/// tracing::debug!(target: log_targets::REASON, z = %z, "Anomaly flagged");
/// ```
pub mod targets {
    /// Drift, generation, feedback multipliers.
    pub const STREAM: &str = "payops::stream";
    /// Window, baselines, ingest quality.
    pub const OBSERVE: &str = "payops::observe";
    /// Anomalies, patterns, hypotheses.
    pub const REASON: &str = "payops::reason";
    /// Options, NRV, policy, outcomes.
    pub const DECIDE: &str = "payops::decide";
    /// Control loop lifecycle.
    pub const LOOP: &str = "payops::loop";
    /// Snapshots and audit log.
    pub const MEMORY: &str = "payops::memory";
    /// WebSocket broadcast.
    pub const TELEMETRY: &str = "payops::telemetry";
}

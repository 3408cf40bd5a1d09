//! Payment-operations agent CLI.
//!
//! Runs the closed-loop simulator and agent with:
//! - JSON config file support with range validation
//! - Structured logging with tracing
//! - Telemetry WebSocket for the dashboard
//! - Snapshot-based warm restart

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use payops_agent::{init_logging, AppConfig, ControlLoop, LogFormat};

#[derive(Parser)]
#[command(name = "payops-agent")]
#[command(version, about = "Autonomous payment-operations agent", long_about = None)]
struct Cli {
    /// Path to JSON config file
    #[arg(short, long, default_value = "payops.json")]
    config: PathBuf,

    /// Override run duration in seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Override simulation time scale (1.0 = real time)
    #[arg(long)]
    time_scale: Option<f64>,

    /// Override snapshot path
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample config file
    GenerateConfig {
        #[arg(short, long, default_value = "payops.json")]
        output: PathBuf,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the agent (default)
    Run,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::GenerateConfig { ref output }) => {
            if let Err(e) = std::fs::write(output, AppConfig::sample_json()) {
                eprintln!("Failed to write {}: {e}", output.display());
                return ExitCode::FAILURE;
            }
            println!("Sample config written to {}", output.display());
            ExitCode::SUCCESS
        }
        Some(Commands::ValidateConfig) => match load_config(&cli) {
            Ok(_) => {
                println!("Config OK: {}", cli.config.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Config invalid: {e}");
                ExitCode::FAILURE
            }
        },
        _ => run(cli),
    }
}

fn run(cli: Cli) -> ExitCode {
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guards = match init_logging(&config.logging, cli.log_level.as_deref()) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let snapshot_path = cli
            .snapshot
            .as_ref()
            .map(|p| p.display().to_string());
        let mut control_loop = ControlLoop::new(&config, snapshot_path);
        let shutdown = control_loop.shutdown_handle();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, finishing current cycle");
                shutdown.store(true, Ordering::Relaxed);
            }
        });

        control_loop.run().await;
    });

    ExitCode::SUCCESS
}

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        AppConfig::default()
    };

    if let Some(duration) = cli.duration {
        config.simulation.duration_seconds = Some(duration);
    }
    if let Some(time_scale) = cli.time_scale {
        config.simulation.time_scale = time_scale;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = match format.as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
    }

    // CLI overrides re-validated with the rest.
    config.validate()?;
    Ok(config)
}

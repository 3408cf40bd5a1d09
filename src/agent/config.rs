//! Application configuration: serde tree, range validation, and conversion
//! into the runtime parameter structs each component takes.
//!
//! Configuration is the one place where errors are fatal: any value outside
//! the ranges below rejects the run at startup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::decision::{Guardrails, NrvParams};
use crate::agent::telemetry::TelemetryConfig;
use crate::errors::ConfigError;
use crate::prelude::Result;
use crate::infra::logging::LogConfig;
use crate::stream::drift::{DriftParams, IssuerState, OuParams};
use crate::stream::generator::{GeneratorParams, RateSchedule};
use crate::types::{Issuer, PaymentMethod};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub drift: DriftSection,
    #[serde(default)]
    pub issuers: BTreeMap<String, IssuerInit>,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub safety: SafetySection,
    #[serde(default)]
    pub memory: MemorySection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriftSection {
    #[serde(default = "default_theta")]
    pub theta: f64,
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    #[serde(default = "default_mean_success")]
    pub mean_success: f64,
    #[serde(default = "default_sigma_latency")]
    pub sigma_latency: f64,
    #[serde(default = "default_retry_spike_prob")]
    pub retry_spike_prob: f64,
    #[serde(default = "default_retry_spike_magnitude")]
    pub retry_spike_magnitude: f64,
    #[serde(default = "default_retry_decay")]
    pub retry_decay: f64,
    /// Per-issuer OU overrides, keyed by issuer name.
    #[serde(default)]
    pub per_issuer: BTreeMap<String, IssuerDriftOverride>,
}

fn default_theta() -> f64 {
    0.1
}
fn default_sigma() -> f64 {
    0.05
}
fn default_mean_success() -> f64 {
    0.95
}
fn default_sigma_latency() -> f64 {
    10.0
}
fn default_retry_spike_prob() -> f64 {
    0.01
}
fn default_retry_spike_magnitude() -> f64 {
    0.2
}
fn default_retry_decay() -> f64 {
    0.99
}

impl Default for DriftSection {
    fn default() -> Self {
        Self {
            theta: default_theta(),
            sigma: default_sigma(),
            mean_success: default_mean_success(),
            sigma_latency: default_sigma_latency(),
            retry_spike_prob: default_retry_spike_prob(),
            retry_spike_magnitude: default_retry_spike_magnitude(),
            retry_decay: default_retry_decay(),
            per_issuer: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IssuerDriftOverride {
    pub theta: Option<f64>,
    pub sigma: Option<f64>,
    pub mean_success: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IssuerInit {
    #[serde(default = "default_initial_success")]
    pub initial_success: f64,
    #[serde(default = "default_initial_latency")]
    pub initial_latency: f64,
    #[serde(default = "default_initial_retry_prob")]
    pub initial_retry_prob: f64,
}

fn default_initial_success() -> f64 {
    0.95
}
fn default_initial_latency() -> f64 {
    200.0
}
fn default_initial_retry_prob() -> f64 {
    0.05
}

impl Default for IssuerInit {
    fn default() -> Self {
        Self {
            initial_success: default_initial_success(),
            initial_latency: default_initial_latency(),
            initial_retry_prob: default_initial_retry_prob(),
        }
    }
}

/// Optional non-constant load shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSection {
    Sinusoidal {
        amplitude: f64,
        period_s: f64,
    },
    Burst {
        burst_rate: f64,
        period_s: f64,
        burst_fraction: f64,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorSection {
    #[serde(default = "default_transaction_rate")]
    pub transaction_rate: f64,
    /// When set, modulates the base rate; constant otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSection>,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_p_soft")]
    pub p_soft: f64,
    #[serde(default = "default_latency_cv")]
    pub latency_cv: f64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
    /// Method name → relative weight.
    #[serde(default = "default_method_mix")]
    pub method_mix: BTreeMap<String, f64>,
}

fn default_transaction_rate() -> f64 {
    20.0
}
fn default_buffer_size() -> usize {
    1000
}
fn default_p_soft() -> f64 {
    0.7
}
fn default_latency_cv() -> f64 {
    0.2
}
fn default_max_retries() -> u8 {
    10
}
fn default_method_mix() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("card".to_string(), 0.5),
        ("upi".to_string(), 0.3),
        ("wallet".to_string(), 0.15),
        ("netbanking".to_string(), 0.05),
    ])
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            transaction_rate: default_transaction_rate(),
            schedule: None,
            buffer_size: default_buffer_size(),
            p_soft: default_p_soft(),
            latency_cv: default_latency_cv(),
            max_retries: default_max_retries(),
            method_mix: default_method_mix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSection {
    #[serde(default = "default_cycle_interval_s")]
    pub cycle_interval_s: f64,
    #[serde(default = "default_window_duration_ms")]
    pub window_duration_ms: u64,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,
    #[serde(default = "default_min_action_frequency_cycles")]
    pub min_action_frequency_cycles: u32,
    #[serde(default = "default_min_confidence_for_action")]
    pub min_confidence_for_action: f64,
    #[serde(default = "default_max_blast_radius_for_autonomy")]
    pub max_blast_radius_for_autonomy: f64,
    #[serde(default = "default_avg_ticket_value")]
    pub avg_ticket_value: f64,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_min_baseline_cycles")]
    pub min_baseline_cycles: u64,
    #[serde(default = "default_baseline_alpha")]
    pub baseline_alpha: f64,
    #[serde(default = "default_uncertainty_threshold")]
    pub uncertainty_threshold: f64,
    #[serde(default = "default_sla_p95_ms")]
    pub sla_p95_ms: f64,
}

fn default_cycle_interval_s() -> f64 {
    10.0
}
fn default_window_duration_ms() -> u64 {
    300_000
}
fn default_anomaly_threshold() -> f64 {
    2.0
}
fn default_min_action_frequency_cycles() -> u32 {
    6
}
fn default_min_confidence_for_action() -> f64 {
    0.7
}
fn default_max_blast_radius_for_autonomy() -> f64 {
    0.3
}
fn default_avg_ticket_value() -> f64 {
    100.0
}
fn default_min_samples() -> usize {
    50
}
fn default_min_baseline_cycles() -> u64 {
    3
}
fn default_baseline_alpha() -> f64 {
    0.1
}
fn default_uncertainty_threshold() -> f64 {
    0.5
}
fn default_sla_p95_ms() -> f64 {
    1_000.0
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            cycle_interval_s: default_cycle_interval_s(),
            window_duration_ms: default_window_duration_ms(),
            anomaly_threshold: default_anomaly_threshold(),
            min_action_frequency_cycles: default_min_action_frequency_cycles(),
            min_confidence_for_action: default_min_confidence_for_action(),
            max_blast_radius_for_autonomy: default_max_blast_radius_for_autonomy(),
            avg_ticket_value: default_avg_ticket_value(),
            min_samples: default_min_samples(),
            min_baseline_cycles: default_min_baseline_cycles(),
            baseline_alpha: default_baseline_alpha(),
            uncertainty_threshold: default_uncertainty_threshold(),
            sla_p95_ms: default_sla_p95_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSection {
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_time_scale() -> f64 {
    1.0
}
fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            duration_seconds: None,
            seed: None,
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetrySection {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,
    #[serde(default = "default_telemetry_bind")]
    pub bind: String,
    #[serde(default = "default_telemetry_port")]
    pub port: u16,
}

fn default_telemetry_enabled() -> bool {
    true
}
fn default_telemetry_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_telemetry_port() -> u16 {
    8765
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            bind: default_telemetry_bind(),
            port: default_telemetry_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetySection {
    #[serde(default = "default_max_retry_adjustment")]
    pub max_retry_adjustment: f64,
    #[serde(default = "default_max_suppression_duration_ms")]
    pub max_suppression_duration_ms: u64,
    #[serde(default)]
    pub protected_targets: Vec<String>,
    /// Linear ramp back to nominal after an intervention expires.
    #[serde(default = "default_ramp_back_ms")]
    pub ramp_back_ms: u64,
}

fn default_max_retry_adjustment() -> f64 {
    2.0
}
fn default_max_suppression_duration_ms() -> u64 {
    600_000
}
fn default_ramp_back_ms() -> u64 {
    45_000
}

impl Default for SafetySection {
    fn default() -> Self {
        Self {
            max_retry_adjustment: default_max_retry_adjustment(),
            max_suppression_duration_ms: default_max_suppression_duration_ms(),
            protected_targets: Vec::new(),
            ramp_back_ms: default_ramp_back_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySection {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    #[serde(default = "default_audit_path")]
    pub audit_path: String,
}

fn default_snapshot_path() -> String {
    ".payops/state.json".to_string()
}
fn default_audit_path() -> String {
    ".payops/audit.ndjson".to_string()
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            audit_path: default_audit_path(),
        }
    }
}

impl AppConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every numeric parameter. First violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.drift;
        check_range("drift.theta", d.theta, 1e-6, 10.0)?;
        check_range("drift.sigma", d.sigma, 0.0, 1.0)?;
        check_range("drift.mean_success", d.mean_success, 0.0, 1.0)?;
        check_range("drift.sigma_latency", d.sigma_latency, 0.0, 1_000.0)?;
        check_range("drift.retry_spike_prob", d.retry_spike_prob, 0.0, 1.0)?;
        check_range(
            "drift.retry_spike_magnitude",
            d.retry_spike_magnitude,
            0.0,
            0.5,
        )?;
        check_range("drift.retry_decay", d.retry_decay, 0.5, 1.0)?;
        for (name, o) in &d.per_issuer {
            if Issuer::from_name(name).is_none() {
                return Err(ConfigError::UnknownIssuer(name.clone()));
            }
            if let Some(theta) = o.theta {
                check_range(&format!("drift.per_issuer.{name}.theta"), theta, 1e-6, 10.0)?;
            }
            if let Some(sigma) = o.sigma {
                check_range(&format!("drift.per_issuer.{name}.sigma"), sigma, 0.0, 1.0)?;
            }
            if let Some(mean) = o.mean_success {
                check_range(
                    &format!("drift.per_issuer.{name}.mean_success"),
                    mean,
                    0.0,
                    1.0,
                )?;
            }
        }

        for (name, init) in &self.issuers {
            if Issuer::from_name(name).is_none() {
                return Err(ConfigError::UnknownIssuer(name.clone()));
            }
            check_range(
                &format!("issuers.{name}.initial_success"),
                init.initial_success,
                0.0,
                1.0,
            )?;
            check_range(
                &format!("issuers.{name}.initial_latency"),
                init.initial_latency,
                50.0,
                2_000.0,
            )?;
            check_range(
                &format!("issuers.{name}.initial_retry_prob"),
                init.initial_retry_prob,
                0.0,
                0.5,
            )?;
        }

        let g = &self.generator;
        check_range("generator.transaction_rate", g.transaction_rate, 0.1, 10_000.0)?;
        if g.buffer_size < 10 || g.buffer_size > 1_000_000 {
            return Err(out_of_range(
                "generator.buffer_size",
                g.buffer_size,
                "[10, 1000000]",
            ));
        }
        check_range("generator.p_soft", g.p_soft, 0.0, 1.0)?;
        check_range("generator.latency_cv", g.latency_cv, 0.01, 2.0)?;
        if g.max_retries > 10 {
            return Err(out_of_range("generator.max_retries", g.max_retries, "[0, 10]"));
        }
        for (name, weight) in &g.method_mix {
            if parse_method(name).is_none() {
                return Err(out_of_range(
                    "generator.method_mix",
                    name,
                    "card|upi|wallet|netbanking",
                ));
            }
            check_range(&format!("generator.method_mix.{name}"), *weight, 0.0, 1.0)?;
        }
        if let Some(ScheduleSection::Burst { burst_fraction, .. }) = &g.schedule {
            check_range("generator.schedule.burst_fraction", *burst_fraction, 0.0, 1.0)?;
        }

        let a = &self.agent;
        check_range("agent.cycle_interval_s", a.cycle_interval_s, 1.0, 3_600.0)?;
        if a.window_duration_ms < 1_000 || a.window_duration_ms > 3_600_000 {
            return Err(out_of_range(
                "agent.window_duration_ms",
                a.window_duration_ms,
                "[1000, 3600000]",
            ));
        }
        check_range("agent.anomaly_threshold", a.anomaly_threshold, 0.5, 10.0)?;
        if a.min_action_frequency_cycles < 2 {
            return Err(out_of_range(
                "agent.min_action_frequency_cycles",
                a.min_action_frequency_cycles,
                ">= 2",
            ));
        }
        check_range(
            "agent.min_confidence_for_action",
            a.min_confidence_for_action,
            0.0,
            1.0,
        )?;
        check_range(
            "agent.max_blast_radius_for_autonomy",
            a.max_blast_radius_for_autonomy,
            0.0,
            1.0,
        )?;
        check_range("agent.avg_ticket_value", a.avg_ticket_value, 0.01, 1e9)?;
        check_range("agent.baseline_alpha", a.baseline_alpha, 0.001, 0.999)?;
        check_range(
            "agent.uncertainty_threshold",
            a.uncertainty_threshold,
            0.0,
            1.0,
        )?;
        check_range("agent.sla_p95_ms", a.sla_p95_ms, 50.0, 60_000.0)?;

        let s = &self.simulation;
        check_range("simulation.time_scale", s.time_scale, 0.01, 1_000.0)?;
        if s.tick_interval_ms < 10 || s.tick_interval_ms > 10_000 {
            return Err(out_of_range(
                "simulation.tick_interval_ms",
                s.tick_interval_ms,
                "[10, 10000]",
            ));
        }
        if let Some(duration) = s.duration_seconds {
            check_range("simulation.duration_seconds", duration, 1.0, 1e7)?;
        }

        let safety = &self.safety;
        check_range(
            "safety.max_retry_adjustment",
            safety.max_retry_adjustment,
            0.1,
            10.0,
        )?;
        if safety.ramp_back_ms < 30_000 || safety.ramp_back_ms > 60_000 {
            return Err(out_of_range(
                "safety.ramp_back_ms",
                safety.ramp_back_ms,
                "[30000, 60000]",
            ));
        }

        Ok(())
    }

    /// Issuers configured for this run; the full fixed set when the section
    /// is empty.
    pub fn issuer_states(&self) -> BTreeMap<Issuer, IssuerState> {
        if self.issuers.is_empty() {
            return Issuer::ALL
                .iter()
                .map(|i| (*i, IssuerState::default()))
                .collect();
        }
        self.issuers
            .iter()
            .filter_map(|(name, init)| {
                Issuer::from_name(name).map(|issuer| {
                    (
                        issuer,
                        IssuerState::new(
                            init.initial_success,
                            init.initial_latency,
                            init.initial_retry_prob,
                        ),
                    )
                })
            })
            .collect()
    }

    pub fn drift_params(&self) -> DriftParams {
        let base = OuParams {
            theta: self.drift.theta,
            sigma: self.drift.sigma,
            mean_success: self.drift.mean_success,
        };
        let overrides = self
            .drift
            .per_issuer
            .iter()
            .filter_map(|(name, o)| {
                Issuer::from_name(name).map(|issuer| {
                    (
                        issuer,
                        OuParams {
                            theta: o.theta.unwrap_or(base.theta),
                            sigma: o.sigma.unwrap_or(base.sigma),
                            mean_success: o.mean_success.unwrap_or(base.mean_success),
                        },
                    )
                })
            })
            .collect();
        DriftParams {
            base,
            overrides,
            sigma_latency: self.drift.sigma_latency,
            retry_spike_prob: self.drift.retry_spike_prob,
            retry_spike_magnitude: self.drift.retry_spike_magnitude,
            retry_decay: self.drift.retry_decay,
        }
    }

    pub fn generator_params(&self) -> GeneratorParams {
        let schedule = match &self.generator.schedule {
            None => RateSchedule::Constant {
                rate: self.generator.transaction_rate,
            },
            Some(ScheduleSection::Sinusoidal { amplitude, period_s }) => {
                RateSchedule::Sinusoidal {
                    base: self.generator.transaction_rate,
                    amplitude: *amplitude,
                    period_s: *period_s,
                }
            }
            Some(ScheduleSection::Burst {
                burst_rate,
                period_s,
                burst_fraction,
            }) => RateSchedule::Burst {
                base: self.generator.transaction_rate,
                burst_rate: *burst_rate,
                period_s: *period_s,
                burst_fraction: *burst_fraction,
            },
        };
        let issuer_weights = self
            .issuer_states()
            .keys()
            .map(|issuer| (*issuer, 1.0))
            .collect();
        let method_mix = self
            .generator
            .method_mix
            .iter()
            .filter_map(|(name, weight)| parse_method(name).map(|m| (m, *weight)))
            .collect();
        GeneratorParams {
            schedule,
            buffer_size: self.generator.buffer_size,
            p_soft: self.generator.p_soft,
            latency_cv: self.generator.latency_cv,
            max_retry_count: self.generator.max_retries,
            issuer_weights,
            method_mix,
            ..GeneratorParams::default()
        }
    }

    pub fn guardrails(&self) -> Guardrails {
        Guardrails {
            max_retry_adjustment: self.safety.max_retry_adjustment,
            max_suppression_duration_ms: self.safety.max_suppression_duration_ms,
            protected_targets: self.safety.protected_targets.iter().cloned().collect(),
            max_blast_radius_for_autonomy: self.agent.max_blast_radius_for_autonomy,
            min_confidence_for_action: self.agent.min_confidence_for_action,
        }
    }

    pub fn nrv_params(&self) -> NrvParams {
        NrvParams {
            avg_ticket_value: self.agent.avg_ticket_value,
            ..NrvParams::default()
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            enabled: self.telemetry.enabled,
            bind: self.telemetry.bind.clone(),
            port: self.telemetry.port,
            ..TelemetryConfig::default()
        }
    }

    /// Pretty-printed sample config for `generate-config`.
    pub fn sample_json() -> String {
        let mut config = AppConfig::default();
        config.issuers = Issuer::ALL
            .iter()
            .map(|i| (i.as_str().to_string(), IssuerInit::default()))
            .collect();
        serde_json::to_string_pretty(&config).expect("default config serializes")
    }
}

fn parse_method(name: &str) -> Option<PaymentMethod> {
    match name.to_ascii_lowercase().as_str() {
        "card" => Some(PaymentMethod::Card),
        "upi" => Some(PaymentMethod::Upi),
        "wallet" => Some(PaymentMethod::Wallet),
        "netbanking" => Some(PaymentMethod::Netbanking),
        _ => None,
    }
}

fn check_range(key: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(out_of_range(key, value, &format!("[{min}, {max}]")));
    }
    Ok(())
}

fn out_of_range(key: &str, value: impl ToString, expected: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sample_json_round_trips() {
        let json = AppConfig::sample_json();
        let config: AppConfig = serde_json::from_str(&json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.issuers.len(), 4);
    }

    #[test]
    fn test_out_of_range_theta_rejected() {
        let mut config = AppConfig::default();
        config.drift.theta = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_issuer_rejected() {
        let mut config = AppConfig::default();
        config.issuers.insert("KOTAK".to_string(), IssuerInit::default());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownIssuer(_))
        ));
    }

    #[test]
    fn test_ramp_outside_spec_band_rejected() {
        let mut config = AppConfig::default();
        config.safety.ramp_back_ms = 10_000;
        assert!(config.validate().is_err());
        config.safety.ramp_back_ms = 60_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_method_mix_rejected() {
        let mut config = AppConfig::default();
        config
            .generator
            .method_mix
            .insert("crypto".to_string(), 0.2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_issuer_override_resolves() {
        let mut config = AppConfig::default();
        config.drift.per_issuer.insert(
            "ICICI".to_string(),
            IssuerDriftOverride {
                theta: Some(0.5),
                sigma: None,
                mean_success: Some(0.8),
            },
        );
        let params = config.drift_params();
        let icici = params.overrides.get(&Issuer::Icici).unwrap();
        assert!((icici.theta - 0.5).abs() < 1e-12);
        assert!((icici.sigma - config.drift.sigma).abs() < 1e-12);
        assert!((icici.mean_success - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_json_fields_ignored() {
        let json = r#"{ "agent": { "cycle_interval_s": 8.0, "future_knob": 1 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert!((config.agent.cycle_interval_s - 8.0).abs() < 1e-12);
    }
}

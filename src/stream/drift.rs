//! Stochastic drift engine for per-issuer health parameters.
//!
//! Success rate follows an Ornstein-Uhlenbeck process:
//!
//! ```text
//! x ← x + θ(μ − x)·dt + σ·√dt·N(0,1)
//! ```
//!
//! Latency follows a bounded Gaussian random walk, and retry probability
//! follows a spike-and-decay process that occasionally produces retry storms.
//! All three are clipped to their valid ranges after every step, so issuer
//! state is always well-formed regardless of parameter choices.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::Issuer;

/// Bounds for issuer state, applied after every drift step.
pub const SUCCESS_RATE_RANGE: (f64, f64) = (0.0, 1.0);
pub const LATENCY_MS_RANGE: (f64, f64) = (50.0, 2000.0);
pub const RETRY_PROB_RANGE: (f64, f64) = (0.0, 0.5);

/// Ornstein-Uhlenbeck parameters for one issuer's success rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OuParams {
    /// Mean reversion strength. Higher reverts faster.
    pub theta: f64,
    /// Volatility of the diffusion term.
    pub sigma: f64,
    /// Long-run mean success rate.
    pub mean_success: f64,
}

impl Default for OuParams {
    fn default() -> Self {
        Self {
            theta: 0.1,
            sigma: 0.05,
            mean_success: 0.95,
        }
    }
}

/// Full drift configuration: global OU parameters, per-issuer overrides, and
/// the latency/retry dynamics shared by all issuers.
#[derive(Debug, Clone)]
pub struct DriftParams {
    pub base: OuParams,
    /// Per-issuer overrides of the OU parameters.
    pub overrides: BTreeMap<Issuer, OuParams>,
    /// Std-dev of the latency random walk per unit √dt.
    pub sigma_latency: f64,
    /// Probability per simulated second of a retry spike.
    pub retry_spike_prob: f64,
    /// Retry probability added on a spike event.
    pub retry_spike_magnitude: f64,
    /// Multiplicative decay applied to retry probability on non-spike steps.
    pub retry_decay: f64,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            base: OuParams::default(),
            overrides: BTreeMap::new(),
            sigma_latency: 10.0,
            retry_spike_prob: 0.01,
            retry_spike_magnitude: 0.2,
            retry_decay: 0.99,
        }
    }
}

impl DriftParams {
    fn params_for(&self, issuer: Issuer) -> OuParams {
        self.overrides.get(&issuer).copied().unwrap_or(self.base)
    }
}

/// Latent health of a single issuer.
///
/// Mutated only by the drift engine; everything else reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IssuerState {
    pub success_rate: f64,
    pub latency_ms: f64,
    pub retry_prob: f64,
    pub last_updated_ms: u64,
}

impl IssuerState {
    pub fn new(success_rate: f64, latency_ms: f64, retry_prob: f64) -> Self {
        let mut state = Self {
            success_rate,
            latency_ms,
            retry_prob,
            last_updated_ms: 0,
        };
        state.clamp();
        state
    }

    /// Clip all parameters to their valid ranges.
    fn clamp(&mut self) {
        self.success_rate = self
            .success_rate
            .clamp(SUCCESS_RATE_RANGE.0, SUCCESS_RATE_RANGE.1);
        self.latency_ms = self.latency_ms.clamp(LATENCY_MS_RANGE.0, LATENCY_MS_RANGE.1);
        self.retry_prob = self.retry_prob.clamp(RETRY_PROB_RANGE.0, RETRY_PROB_RANGE.1);
    }
}

impl Default for IssuerState {
    fn default() -> Self {
        Self::new(0.95, 200.0, 0.05)
    }
}

/// Drives issuer state evolution. Owns the issuer map exclusively.
pub struct DriftEngine {
    params: DriftParams,
    states: BTreeMap<Issuer, IssuerState>,
    rng: SmallRng,
    /// Issuers pinned by scenario injection; drift skips them.
    pinned: BTreeMap<Issuer, IssuerState>,
}

impl DriftEngine {
    /// Create a seeded engine with the given initial states.
    pub fn new(params: DriftParams, initial: BTreeMap<Issuer, IssuerState>, seed: u64) -> Self {
        info!(
            target: crate::log_targets::STREAM,
            theta = params.base.theta,
            sigma = params.base.sigma,
            mean_success = params.base.mean_success,
            issuers = initial.len(),
            "Drift engine initialized"
        );
        Self {
            params,
            states: initial,
            rng: SmallRng::seed_from_u64(seed),
            pinned: BTreeMap::new(),
        }
    }

    /// Advance all issuers by `dt` seconds of simulated time.
    pub fn update(&mut self, dt: f64, now_ms: u64) {
        if dt <= 0.0 {
            return;
        }
        let sqrt_dt = dt.sqrt();

        for (issuer, state) in self.states.iter_mut() {
            if let Some(pin) = self.pinned.get(issuer) {
                *state = *pin;
                state.last_updated_ms = now_ms;
                continue;
            }
            let p = self.params.params_for(*issuer);

            // Success rate: OU step.
            let noise: f64 = StandardNormal.sample(&mut self.rng);
            state.success_rate +=
                p.theta * (p.mean_success - state.success_rate) * dt + p.sigma * sqrt_dt * noise;

            // Latency: bounded Gaussian random walk.
            let noise: f64 = StandardNormal.sample(&mut self.rng);
            state.latency_ms += self.params.sigma_latency * sqrt_dt * noise;

            // Retry probability: rare spike, otherwise multiplicative decay.
            if self.rng.gen::<f64>() < self.params.retry_spike_prob * dt {
                state.retry_prob += self.params.retry_spike_magnitude;
                debug!(
                    target: crate::log_targets::STREAM,
                    issuer = %issuer,
                    retry_prob = state.retry_prob,
                    "Retry spike"
                );
            } else {
                state.retry_prob *= self.params.retry_decay;
            }

            state.clamp();
            state.last_updated_ms = now_ms;
        }
    }

    pub fn state(&self, issuer: Issuer) -> Option<&IssuerState> {
        self.states.get(&issuer)
    }

    pub fn states(&self) -> &BTreeMap<Issuer, IssuerState> {
        &self.states
    }

    /// Pin an issuer to a fixed state (fault injection). Drift is suspended
    /// for that issuer until [`DriftEngine::unpin`] is called.
    pub fn pin(&mut self, issuer: Issuer, state: IssuerState) {
        self.states.insert(issuer, state);
        self.pinned.insert(issuer, state);
    }

    pub fn unpin(&mut self, issuer: Issuer) {
        self.pinned.remove(&issuer);
    }

    /// Mean success rate across all issuers.
    pub fn mean_success_rate(&self) -> f64 {
        if self.states.is_empty() {
            return 1.0;
        }
        self.states.values().map(|s| s.success_rate).sum::<f64>() / self.states.len() as f64
    }

    /// Mean latency across all issuers.
    pub fn mean_latency_ms(&self) -> f64 {
        if self.states.is_empty() {
            return 0.0;
        }
        self.states.values().map(|s| s.latency_ms).sum::<f64>() / self.states.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_states() -> BTreeMap<Issuer, IssuerState> {
        Issuer::ALL
            .iter()
            .map(|i| (*i, IssuerState::default()))
            .collect()
    }

    #[test]
    fn test_bounds_hold_under_extreme_volatility() {
        let params = DriftParams {
            base: OuParams {
                theta: 0.1,
                sigma: 5.0,
                mean_success: 0.95,
            },
            sigma_latency: 500.0,
            retry_spike_prob: 0.5,
            ..DriftParams::default()
        };
        let mut engine = DriftEngine::new(params, default_states(), 7);

        for step in 0..5_000 {
            engine.update(0.1, step * 100);
            for state in engine.states().values() {
                assert!((0.0..=1.0).contains(&state.success_rate));
                assert!((50.0..=2000.0).contains(&state.latency_ms));
                assert!((0.0..=0.5).contains(&state.retry_prob));
            }
        }
    }

    #[test]
    fn test_mean_reversion_toward_long_run_mean() {
        // Time-average over >> 1/theta should sit near mu within the OU
        // stationary band 3*sigma/sqrt(2*theta).
        let params = DriftParams {
            base: OuParams {
                theta: 0.1,
                sigma: 0.02,
                mean_success: 0.95,
            },
            ..DriftParams::default()
        };
        let mut engine = DriftEngine::new(params, default_states(), 42);

        let mut sum = 0.0;
        let steps = 20_000usize;
        for step in 0..steps {
            engine.update(0.1, step as u64 * 100);
            sum += engine.state(Issuer::Hdfc).unwrap().success_rate;
        }
        let avg = sum / steps as f64;
        let band = 3.0 * 0.02 / (2.0_f64 * 0.1).sqrt();
        assert!(
            (avg - 0.95).abs() < band,
            "time-average {avg:.4} outside ±{band:.4} of 0.95"
        );
    }

    #[test]
    fn test_seeded_updates_are_reproducible() {
        let mut a = DriftEngine::new(DriftParams::default(), default_states(), 123);
        let mut b = DriftEngine::new(DriftParams::default(), default_states(), 123);

        for step in 0..200 {
            a.update(0.1, step * 100);
            b.update(0.1, step * 100);
        }
        assert_eq!(a.states(), b.states());
    }

    #[test]
    fn test_per_issuer_override_applies() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            Issuer::Sbi,
            OuParams {
                theta: 2.0,
                sigma: 0.0,
                mean_success: 0.5,
            },
        );
        let params = DriftParams {
            base: OuParams {
                theta: 2.0,
                sigma: 0.0,
                mean_success: 0.99,
            },
            overrides,
            ..DriftParams::default()
        };
        let mut engine = DriftEngine::new(params, default_states(), 1);
        for step in 0..500 {
            engine.update(0.1, step * 100);
        }
        assert!((engine.state(Issuer::Sbi).unwrap().success_rate - 0.5).abs() < 0.05);
        assert!((engine.state(Issuer::Hdfc).unwrap().success_rate - 0.99).abs() < 0.05);
    }

    #[test]
    fn test_pinned_issuer_does_not_drift() {
        let mut engine = DriftEngine::new(DriftParams::default(), default_states(), 9);
        engine.pin(Issuer::Icici, IssuerState::new(0.3, 800.0, 0.05));
        for step in 0..100 {
            engine.update(0.1, step * 100);
        }
        let state = engine.state(Issuer::Icici).unwrap();
        assert!((state.success_rate - 0.3).abs() < f64::EPSILON);
        assert!((state.latency_ms - 800.0).abs() < f64::EPSILON);
    }
}

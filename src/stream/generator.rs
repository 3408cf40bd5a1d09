//! Continuous transaction generator.
//!
//! Each tick emits `⌊rate·dt⌋` transactions (a fractional carry keeps the
//! long-run rate exact), sampling issuer, method, geography, outcome, retry
//! count and latency from the drifting issuer states modulated by the
//! feedback controller's multipliers.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

use crate::stream::buffer::TransactionBuffer;
use crate::stream::drift::DriftEngine;
use crate::stream::feedback::FeedbackController;
use crate::types::{Geography, Issuer, Outcome, PaymentMethod, Transaction};

/// Offered-load schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum RateSchedule {
    /// Fixed transactions per second.
    Constant { rate: f64 },
    /// `base + amplitude·sin(2π·t/period)` transactions per second,
    /// floored at zero.
    Sinusoidal {
        base: f64,
        amplitude: f64,
        period_s: f64,
    },
    /// `base` normally; `burst_rate` during the first `burst_fraction` of
    /// each period.
    Burst {
        base: f64,
        burst_rate: f64,
        period_s: f64,
        burst_fraction: f64,
    },
}

impl RateSchedule {
    /// Instantaneous rate at simulated time `t` seconds.
    pub fn rate_at(&self, t_s: f64) -> f64 {
        match self {
            RateSchedule::Constant { rate } => *rate,
            RateSchedule::Sinusoidal {
                base,
                amplitude,
                period_s,
            } => {
                let phase = 2.0 * std::f64::consts::PI * t_s / period_s;
                (base + amplitude * phase.sin()).max(0.0)
            }
            RateSchedule::Burst {
                base,
                burst_rate,
                period_s,
                burst_fraction,
            } => {
                let into_period = (t_s % period_s) / period_s;
                if into_period < *burst_fraction {
                    *burst_rate
                } else {
                    *base
                }
            }
        }
    }
}

/// Static generation parameters, resolved from config at startup.
#[derive(Debug, Clone)]
pub struct GeneratorParams {
    pub schedule: RateSchedule,
    pub buffer_size: usize,
    /// Probability a failure is a soft (retryable) failure.
    pub p_soft: f64,
    /// Coefficient of variation of the latency distribution.
    pub latency_cv: f64,
    pub max_retry_count: u8,
    /// Base traffic weight per issuer, before volume multipliers.
    pub issuer_weights: Vec<(Issuer, f64)>,
    pub method_mix: Vec<(PaymentMethod, f64)>,
    pub geo_mix: Vec<(Geography, f64)>,
    pub amount_range: (f64, f64),
}

impl Default for GeneratorParams {
    fn default() -> Self {
        Self {
            schedule: RateSchedule::Constant { rate: 20.0 },
            buffer_size: 1000,
            p_soft: 0.7,
            latency_cv: 0.2,
            max_retry_count: 10,
            issuer_weights: Issuer::ALL.iter().map(|i| (*i, 1.0)).collect(),
            method_mix: vec![
                (PaymentMethod::Card, 0.5),
                (PaymentMethod::Upi, 0.3),
                (PaymentMethod::Wallet, 0.15),
                (PaymentMethod::Netbanking, 0.05),
            ],
            geo_mix: vec![
                (Geography::Us, 0.4),
                (Geography::Eu, 0.3),
                (Geography::Asia, 0.3),
            ],
            amount_range: (10.0, 1000.0),
        }
    }
}

/// Emits the payment stream. Owns the bounded transaction buffer.
pub struct TransactionGenerator {
    params: GeneratorParams,
    buffer: TransactionBuffer,
    rng: SmallRng,
    next_id: u64,
    /// Fractional transactions carried between ticks.
    carry: f64,
    /// Simulated seconds since start, drives the rate schedule.
    elapsed_s: f64,
    last_timestamp_ms: u64,
}

impl TransactionGenerator {
    pub fn new(params: GeneratorParams, seed: u64) -> Self {
        let buffer = TransactionBuffer::new(params.buffer_size);
        Self {
            params,
            buffer,
            rng: SmallRng::seed_from_u64(seed),
            next_id: 1,
            carry: 0.0,
            elapsed_s: 0.0,
            last_timestamp_ms: 0,
        }
    }

    /// Generate the batch for a tick of `dt` simulated seconds.
    ///
    /// Reads issuer state from the drift engine and multipliers from the
    /// feedback controller; pushes into the ring buffer and returns the batch.
    pub fn generate(
        &mut self,
        dt: f64,
        now_ms: u64,
        drift: &DriftEngine,
        feedback: &FeedbackController,
    ) -> Vec<Transaction> {
        if dt <= 0.0 || drift.states().is_empty() {
            return Vec::new();
        }

        let rate = self.params.schedule.rate_at(self.elapsed_s);
        self.elapsed_s += dt;
        self.carry += rate * dt;
        let count = self.carry.floor() as usize;
        self.carry -= count as f64;
        if count == 0 {
            return Vec::new();
        }

        let dt_ms = (dt * 1000.0).max(1.0) as u64;
        let stride_ms = (dt_ms / count as u64).max(1);
        let mut batch = Vec::with_capacity(count);

        // Issuer weights under current volume multipliers.
        let weights: Vec<(Issuer, f64)> = self
            .params
            .issuer_weights
            .iter()
            .map(|(issuer, w)| (*issuer, w * feedback.volume_multiplier(*issuer, now_ms)))
            .collect();

        for i in 0..count {
            let issuer = self.pick_issuer(&weights);
            let state = match drift.state(issuer) {
                Some(s) => *s,
                None => continue,
            };

            let effective_success =
                (state.success_rate * feedback.success_multiplier(issuer, now_ms)).clamp(0.0, 1.0);
            let effective_retry =
                (state.retry_prob * feedback.retry_multiplier(now_ms)).clamp(0.0, 0.5);

            let outcome = self.draw_outcome(effective_success);
            let retry_count = self.draw_retries(effective_retry);
            let latency_ms = self.draw_latency(state.latency_ms);

            // Tick start plus jittered intra-tick offset, clamped monotone.
            let jitter = self.rng.gen_range(0..=stride_ms);
            let candidate = now_ms + i as u64 * stride_ms + jitter;
            let timestamp_ms = candidate.max(self.last_timestamp_ms);
            self.last_timestamp_ms = timestamp_ms;

            let error_code = match outcome {
                Outcome::Success => None,
                _ => Some(format!("ERR_{}", self.rng.gen_range(1000..10000))),
            };

            let txn = Transaction {
                id: self.next_id,
                timestamp_ms,
                issuer,
                method: self.pick_weighted_method(feedback, now_ms),
                geography: self.pick_weighted_geo(),
                outcome,
                latency_ms,
                retry_count,
                error_code,
                amount: self
                    .rng
                    .gen_range(self.params.amount_range.0..self.params.amount_range.1),
            };
            self.next_id += 1;
            self.buffer.push(txn.clone());
            batch.push(txn);
        }

        debug!(
            target: crate::log_targets::STREAM,
            count = batch.len(),
            buffer = self.buffer.len(),
            "Generated batch"
        );
        batch
    }

    fn pick_issuer(&mut self, weights: &[(Issuer, f64)]) -> Issuer {
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            // All issuers suppressed: fall back to uniform.
            let idx = self.rng.gen_range(0..weights.len());
            return weights[idx].0;
        }
        let mut draw = self.rng.gen::<f64>() * total;
        for (issuer, w) in weights {
            draw -= w;
            if draw <= 0.0 {
                return *issuer;
            }
        }
        weights[weights.len() - 1].0
    }

    fn pick_weighted_method(
        &mut self,
        feedback: &FeedbackController,
        now_ms: u64,
    ) -> PaymentMethod {
        let weights: Vec<(PaymentMethod, f64)> = self
            .params
            .method_mix
            .iter()
            .map(|(m, w)| (*m, w * feedback.method_volume_multiplier(*m, now_ms)))
            .collect();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            let idx = self.rng.gen_range(0..weights.len());
            return weights[idx].0;
        }
        let mut draw = self.rng.gen::<f64>() * total;
        for (method, w) in &weights {
            draw -= w;
            if draw <= 0.0 {
                return *method;
            }
        }
        weights[weights.len() - 1].0
    }

    fn pick_weighted_geo(&mut self) -> Geography {
        let total: f64 = self.params.geo_mix.iter().map(|(_, w)| w).sum();
        let mut draw = self.rng.gen::<f64>() * total;
        for (geo, w) in &self.params.geo_mix {
            draw -= w;
            if draw <= 0.0 {
                return *geo;
            }
        }
        self.params.geo_mix[self.params.geo_mix.len() - 1].0
    }

    fn draw_outcome(&mut self, effective_success: f64) -> Outcome {
        if self.rng.gen::<f64>() < effective_success {
            Outcome::Success
        } else if self.rng.gen::<f64>() < self.params.p_soft {
            Outcome::SoftFail
        } else {
            Outcome::HardFail
        }
    }

    /// Geometric retry count: each retry happens with probability `r`,
    /// capped at the configured maximum.
    fn draw_retries(&mut self, r: f64) -> u8 {
        let mut count = 0u8;
        while count < self.params.max_retry_count && self.rng.gen::<f64>() < r {
            count += 1;
        }
        count
    }

    /// Lognormal latency centred on the issuer's drifting mean with the
    /// configured coefficient of variation.
    fn draw_latency(&mut self, mean_ms: f64) -> u32 {
        let cv = self.params.latency_cv.max(1e-6);
        let sigma_sq = (1.0 + cv * cv).ln();
        let mu = mean_ms.max(1.0).ln() - sigma_sq / 2.0;
        let z: f64 = StandardNormal.sample(&mut self.rng);
        let latency = (mu + sigma_sq.sqrt() * z).exp();
        latency.clamp(50.0, 2000.0) as u32
    }

    pub fn buffer(&self) -> &TransactionBuffer {
        &self.buffer
    }

    pub fn total_generated(&self) -> u64 {
        self.next_id - 1
    }
}

//! Ingest validation for incoming transactions.
//!
//! Malformed records are dropped and counted; the stream never aborts on a
//! bad record.

use tracing::warn;

use crate::errors::IngestError;
use crate::types::Transaction;

/// Sanity caps, deliberately loose. These catch corrupted records, not
/// anomalous-but-real traffic.
const MAX_LATENCY_MS: u32 = 60_000;
const MAX_RETRY_COUNT: u8 = 50;

/// Validates transactions and tracks stream quality.
#[derive(Debug, Default)]
pub struct IngestValidator {
    accepted: u64,
    rejected: u64,
}

impl IngestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check one record. `Err` means drop it.
    pub fn validate(&self, txn: &Transaction) -> Result<(), IngestError> {
        if txn.timestamp_ms == 0 {
            return Err(IngestError::BadTimestamp(txn.timestamp_ms));
        }
        if txn.latency_ms > MAX_LATENCY_MS {
            return Err(IngestError::BadLatency(txn.latency_ms));
        }
        if txn.retry_count > MAX_RETRY_COUNT {
            return Err(IngestError::BadRetryCount(txn.retry_count));
        }
        if txn.amount <= 0.0 || !txn.amount.is_finite() {
            return Err(IngestError::BadAmount(txn.amount));
        }
        Ok(())
    }

    /// Filter a batch in place, keeping valid records and counting the rest.
    pub fn filter_batch(&mut self, batch: &mut Vec<Transaction>) {
        let before = batch.len();
        batch.retain(|txn| match self.validate(txn) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    target: crate::log_targets::OBSERVE,
                    id = txn.id,
                    error = %e,
                    "Dropping invalid transaction"
                );
                false
            }
        });
        self.rejected += (before - batch.len()) as u64;
        self.accepted += batch.len() as u64;
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

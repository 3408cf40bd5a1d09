//! Bounded ring buffer for recent transactions.
//!
//! Single producer (generator), single reader (observation). Overflow drops
//! the oldest entries first.

use std::collections::VecDeque;

use crate::types::Transaction;

#[derive(Debug)]
pub struct TransactionBuffer {
    buf: VecDeque<Transaction>,
    capacity: usize,
    total_pushed: u64,
    total_dropped: u64,
}

impl TransactionBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
            total_dropped: 0,
        }
    }

    pub fn push(&mut self, txn: Transaction) {
        if self.buf.len() == self.capacity {
            self.buf.pop_front();
            self.total_dropped += 1;
        }
        self.buf.push_back(txn);
        self.total_pushed += 1;
    }

    pub fn extend(&mut self, txns: impl IntoIterator<Item = Transaction>) {
        for txn in txns {
            self.push(txn);
        }
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.buf.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Geography, Issuer, Outcome, PaymentMethod};

    fn txn(id: u64, ts: u64) -> Transaction {
        Transaction {
            id,
            timestamp_ms: ts,
            issuer: Issuer::Hdfc,
            method: PaymentMethod::Card,
            geography: Geography::Us,
            outcome: Outcome::Success,
            latency_ms: 120,
            retry_count: 0,
            error_code: None,
            amount: 100.0,
        }
    }

    #[test]
    fn test_capacity_never_exceeded_oldest_dropped_first() {
        let mut buf = TransactionBuffer::new(5);
        for i in 0..12u64 {
            buf.push(txn(i, i * 10));
            assert!(buf.len() <= 5);
        }
        let contents = buf.snapshot();
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[0].id, 7);
        assert_eq!(contents[4].id, 11);
        assert_eq!(buf.total_pushed(), 12);
        assert_eq!(buf.total_dropped(), 7);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let mut buf = TransactionBuffer::new(100);
        buf.extend((0..10u64).map(|i| txn(i, 1000 + i)));
        let snap = buf.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[1].timestamp_ms >= pair[0].timestamp_ms);
        }
    }
}

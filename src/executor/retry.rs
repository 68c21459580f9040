//! Per-bault retry records, kept across polling cycles

use alloy_primitives::{Address, U256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryRecord {
    /// Failed attempts so far
    pub attempts: u32,

    /// Earned reward seen before the first attempt; a drop below this means
    /// someone else compounded the bault
    pub baseline_earned: U256,
}

/// Owned by the scheduler and lent to the executor; only ever touched
/// sequentially
#[derive(Debug, Default)]
pub struct RetryBook {
    records: HashMap<Address, RetryRecord>,
}

impl RetryBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self, vault: &Address) -> u32 {
        self.records.get(vault).map(|r| r.attempts).unwrap_or(0)
    }

    pub fn baseline(&self, vault: &Address) -> Option<U256> {
        self.records.get(vault).map(|r| r.baseline_earned)
    }

    /// Count one failure; the baseline is fixed by the first one. Returns the
    /// new attempt count.
    pub fn record_failure(&mut self, vault: Address, earned: U256) -> u32 {
        let record = self.records.entry(vault).or_insert(RetryRecord {
            attempts: 0,
            baseline_earned: earned,
        });
        record.attempts += 1;
        record.attempts
    }

    pub fn clear(&mut self, vault: &Address) {
        self.records.remove(vault);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lifecycle() {
        let mut book = RetryBook::new();
        let vault = Address::repeat_byte(1);
        assert_eq!(book.attempts(&vault), 0);
        assert_eq!(book.baseline(&vault), None);

        assert_eq!(book.record_failure(vault, U256::from(100u64)), 1);
        assert_eq!(book.record_failure(vault, U256::from(250u64)), 2);
        assert_eq!(book.attempts(&vault), 2);
        assert_eq!(book.baseline(&vault), Some(U256::from(100u64)));

        book.clear(&vault);
        assert!(book.is_empty());
        assert_eq!(book.baseline(&vault), None);
    }
}

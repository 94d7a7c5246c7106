//! Cash State
//!
//! The single logical state block shared by the cash module (writer) and the
//! cash lens (reader): one `SafeCashConfig` per registered safe.
//!
//! # Critical Invariants
//!
//! 1. **Never deleted**: a safe's config lives for the lifetime of the state
//! 2. **Idempotency**: a cleared transaction id stays cleared
//! 3. **Single withdrawal**: each safe has at most one pending withdrawal

use crate::core::types::Address;
use crate::models::safe::SafeCashConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Repository of per-safe cash configuration
///
/// # Example
///
/// ```rust
/// use safe_cash_core_rs::models::{CashState, SafeCashConfig, SpendingLimit};
/// use safe_cash_core_rs::Address;
///
/// let mut state = CashState::new();
/// let limit = SpendingLimit::initialize(100, 1_000, 0, 0).unwrap();
/// state.insert(Address::new("0xsafe"), SafeCashConfig::new(limit));
///
/// assert!(state.contains(&Address::new("0xsafe")));
/// assert_eq!(state.num_safes(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashState {
    safes: BTreeMap<Address, SafeCashConfig>,
}

impl CashState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, safe: &Address) -> bool {
        self.safes.contains_key(safe)
    }

    pub fn get(&self, safe: &Address) -> Option<&SafeCashConfig> {
        self.safes.get(safe)
    }

    pub fn get_mut(&mut self, safe: &Address) -> Option<&mut SafeCashConfig> {
        self.safes.get_mut(safe)
    }

    /// Store a safe's config, replacing any previous value
    ///
    /// Used both for registration and to commit a staged copy.
    pub fn insert(&mut self, safe: Address, config: SafeCashConfig) {
        self.safes.insert(safe, config);
    }

    pub fn num_safes(&self) -> usize {
        self.safes.len()
    }

    /// Iterate safes in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &SafeCashConfig)> {
        self.safes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spending_limit::SpendingLimit;

    #[test]
    fn test_insert_replaces_staged_copy() {
        let safe = Address::new("SAFE_A");
        let mut state = CashState::new();
        state.insert(
            safe.clone(),
            SafeCashConfig::new(SpendingLimit::initialize(100, 1_000, 0, 0).unwrap()),
        );

        let mut staged = state.get(&safe).cloned().unwrap();
        staged.add_cashback(42);
        assert_eq!(state.get(&safe).unwrap().total_cashback_earned_usd(), 0);

        state.insert(safe.clone(), staged);
        assert_eq!(state.get(&safe).unwrap().total_cashback_earned_usd(), 42);
        assert_eq!(state.num_safes(), 1);
    }
}

//! Identifiers and value types
//!
//! CRITICAL: All money values are u128.
//! - USD amounts carry 6 decimals (`USD_UNIT` = $1.00)
//! - Token amounts are in the token's base units
//! - Percentages are basis points (`HUNDRED_PERCENT_BPS` = 100%)

use serde::{Deserialize, Serialize};
use std::fmt;

/// One US dollar
pub const USD_UNIT: u128 = 1_000_000;

/// 100% expressed in basis points
pub const HUNDRED_PERCENT_BPS: u128 = 10_000;

/// Account or token identifier
///
/// Safes, tokens, recipients and collaborator contracts are all addressed the
/// same way. The empty string is the zero address.
///
/// # Example
/// ```
/// use safe_cash_core_rs::Address;
///
/// let safe = Address::new("0xsafe");
/// assert!(!safe.is_zero());
/// assert!(Address::zero().is_zero());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn zero() -> Self {
        Self(String::new())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            write!(f, "<zero>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Spend transaction identifier
///
/// Supplied by the card processor; each id may be debited at most once per safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(String);

impl TxId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh random identifier (UUID v4)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TxId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A token paired with an amount in its base units
///
/// Used both for reporting balances and as the "what if" collateral override
/// handed to the ledger's borrowing-power query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub token: Address,
    pub amount: u128,
}

impl TokenData {
    pub fn new(token: Address, amount: u128) -> Self {
        Self { token, amount }
    }
}

/// Returns the first token that appears more than once
pub fn find_duplicate(tokens: &[Address]) -> Option<&Address> {
    let mut seen = std::collections::HashSet::with_capacity(tokens.len());
    tokens.iter().find(|token| !seen.insert(*token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_duplicate() {
        let a = Address::new("A");
        let b = Address::new("B");
        assert_eq!(find_duplicate(&[a.clone(), b.clone()]), None);
        assert_eq!(find_duplicate(&[a.clone(), b, a.clone()]), Some(&a));
        assert_eq!(find_duplicate(&[]), None);
    }

    #[test]
    fn test_generated_tx_ids_are_unique() {
        assert_ne!(TxId::generate(), TxId::generate());
    }
}

//! Withdrawal request model
//!
//! A safe has at most one outstanding withdrawal request. Its lifecycle:
//! - Created by `request_withdrawal` (replacing and cancelling any previous one)
//! - Shrunk per token when a later spend/repay would otherwise overdraw the safe
//! - Cancelled when a new request is made or a spend retry needs the collateral back
//! - Consumed by `process_withdrawal` once `finalize_time` has passed

use crate::core::time::Timestamp;
use crate::core::types::{Address, TokenData};
use serde::{Deserialize, Serialize};

/// A pending withdrawal of one or more tokens to a single recipient
///
/// `tokens` and `amounts` are parallel arrays; tokens are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Unique request identifier (UUID), used to correlate events
    id: String,
    tokens: Vec<Address>,
    amounts: Vec<u128>,
    recipient: Address,
    finalize_time: Timestamp,
}

impl WithdrawalRequest {
    /// Create a new request
    ///
    /// # Panics
    /// Panics if `tokens` and `amounts` differ in length. Callers validate
    /// shapes before building a request.
    pub fn new(
        tokens: Vec<Address>,
        amounts: Vec<u128>,
        recipient: Address,
        finalize_time: Timestamp,
    ) -> Self {
        assert_eq!(
            tokens.len(),
            amounts.len(),
            "tokens and amounts must have equal length"
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tokens,
            amounts,
            recipient,
            finalize_time,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tokens(&self) -> &[Address] {
        &self.tokens
    }

    pub fn amounts(&self) -> &[u128] {
        &self.amounts
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn finalize_time(&self) -> Timestamp {
        self.finalize_time
    }

    /// Whether the request can be processed at `now`
    pub fn is_finalized(&self, now: Timestamp) -> bool {
        now >= self.finalize_time
    }

    /// Amount of `token` promised to the recipient (0 if not part of the request)
    pub fn amount_for(&self, token: &Address) -> u128 {
        self.tokens
            .iter()
            .position(|t| t == token)
            .map(|i| self.amounts[i])
            .unwrap_or(0)
    }

    /// Lower the amount of `token` to `new_amount`
    ///
    /// Returns `true` if the amount changed. Never raises an amount.
    pub fn shrink_to(&mut self, token: &Address, new_amount: u128) -> bool {
        match self.tokens.iter().position(|t| t == token) {
            Some(i) if self.amounts[i] > new_amount => {
                self.amounts[i] = new_amount;
                true
            }
            _ => false,
        }
    }

    /// Token/amount pairs
    pub fn entries(&self) -> Vec<TokenData> {
        self.tokens
            .iter()
            .zip(&self.amounts)
            .map(|(token, amount)| TokenData::new(token.clone(), *amount))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WithdrawalRequest {
        WithdrawalRequest::new(
            vec![Address::new("USDC"), Address::new("WETH")],
            vec![100, 5],
            Address::new("recipient"),
            1_000,
        )
    }

    #[test]
    fn test_amount_for_unknown_token_is_zero() {
        assert_eq!(request().amount_for(&Address::new("DAI")), 0);
        assert_eq!(request().amount_for(&Address::new("WETH")), 5);
    }

    #[test]
    fn test_shrink_never_raises() {
        let mut r = request();
        assert!(!r.shrink_to(&Address::new("USDC"), 150));
        assert!(r.shrink_to(&Address::new("USDC"), 20));
        assert_eq!(r.amount_for(&Address::new("USDC")), 20);
        assert!(!r.shrink_to(&Address::new("DAI"), 0));
    }

    #[test]
    fn test_finalize_boundary() {
        let r = request();
        assert!(!r.is_finalized(999));
        assert!(r.is_finalized(1_000));
    }

    #[test]
    #[should_panic(expected = "tokens and amounts must have equal length")]
    fn test_mismatched_lengths_panic() {
        WithdrawalRequest::new(vec![Address::new("USDC")], vec![], Address::new("r"), 0);
    }
}

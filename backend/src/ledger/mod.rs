//! Collateral ledger interface
//!
//! The ledger tracks collateral, prices and loans. It is an external
//! collaborator: the cash module and lens only consume the interface below.
//!
//! # "What if" queries
//!
//! [`CollateralLedger::borrowing_power_and_total_borrowing`] takes the caller's
//! view of the safe's collateral instead of reading balances itself. This is
//! how spends and withdrawals are simulated without mutating anything: the
//! caller passes balances minus pending withdrawals, minus the amount about to
//! leave the safe.
//!
//! [`InMemoryLedger`] is a complete in-process implementation used by the
//! test-suite and by hosts that replay transactions.

pub mod memory;

pub use memory::{InMemoryLedger, TokenListing};

use crate::core::types::{Address, TokenData, HUNDRED_PERCENT_BPS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by a collateral ledger
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Token {0} is not supported by the ledger")]
    UnsupportedToken(Address),

    #[error("Account unhealthy: total borrowing {total_borrowing} exceeds max borrow {max_borrow}")]
    AccountUnhealthy {
        max_borrow: u128,
        total_borrowing: u128,
    },

    #[error("Insufficient liquidity for {token}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        token: Address,
        requested: u128,
        available: u128,
    },

    #[error("Repayment of {amount} {token} exceeds outstanding debt {debt}")]
    RepaymentExceedsDebt {
        token: Address,
        amount: u128,
        debt: u128,
    },

    #[error("Arithmetic overflow in ledger computation")]
    Overflow,
}

/// Risk parameters of a collateral token (basis points)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralTokenConfig {
    /// Share of the token's USD value counted as borrowing power
    pub ltv: u64,
    pub liquidation_threshold: u64,
    pub liquidation_bonus: u64,
}

impl CollateralTokenConfig {
    /// Borrowing power contributed by `value_usd` of this token
    pub fn borrowing_power(&self, value_usd: u128) -> u128 {
        value_usd.saturating_mul(self.ltv as u128) / HUNDRED_PERCENT_BPS
    }
}

/// Borrowing capacity of a safe versus its outstanding loans (USD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingPosition {
    pub max_borrow: u128,
    pub total_borrowing: u128,
}

impl BorrowingPosition {
    /// Borrowings do not exceed capacity
    pub fn is_healthy(&self) -> bool {
        self.total_borrowing <= self.max_borrow
    }

    /// Additional USD that can be borrowed (0 when over-borrowed)
    pub fn headroom(&self) -> u128 {
        self.max_borrow.saturating_sub(self.total_borrowing)
    }

    /// USD by which borrowings exceed capacity (0 when healthy)
    pub fn deficit(&self) -> u128 {
        self.total_borrowing.saturating_sub(self.max_borrow)
    }
}

/// Read/write interface of the collateral & borrowing ledger
///
/// All USD values carry 6 decimals; token amounts are in base units.
pub trait CollateralLedger {
    /// Address that receives approvals for repayments
    fn address(&self) -> Address;

    fn is_borrow_token(&self, token: &Address) -> bool;

    fn is_collateral_token(&self, token: &Address) -> bool;

    /// Whitelisted collateral tokens, in listing order
    fn collateral_tokens(&self) -> Vec<Address>;

    /// Whitelisted borrow tokens, in listing order
    fn borrow_tokens(&self) -> Vec<Address>;

    fn collateral_token_config(&self, token: &Address) -> Option<CollateralTokenConfig>;

    /// USD price of one whole token
    fn price(&self, token: &Address) -> Result<u128, LedgerError>;

    fn convert_usd_to_collateral_token(
        &self,
        token: &Address,
        amount_usd: u128,
    ) -> Result<u128, LedgerError>;

    fn convert_collateral_token_to_usd(
        &self,
        token: &Address,
        amount: u128,
    ) -> Result<u128, LedgerError>;

    /// Borrowing power of `collateral` against the safe's current borrowings
    fn borrowing_power_and_total_borrowing(
        &self,
        safe: &Address,
        collateral: &[TokenData],
    ) -> Result<BorrowingPosition, LedgerError>;

    /// Outstanding debt of the safe per borrow token (token units)
    fn borrowings(&self, safe: &Address) -> Vec<TokenData>;

    /// Amount of `token` the ledger can lend right now
    fn available_liquidity(&self, token: &Address) -> u128;

    /// Fail if `collateral` cannot support the safe's borrowings
    fn ensure_health(&self, safe: &Address, collateral: &[TokenData]) -> Result<(), LedgerError> {
        let position = self.borrowing_power_and_total_borrowing(safe, collateral)?;
        if !position.is_healthy() {
            return Err(LedgerError::AccountUnhealthy {
                max_borrow: position.max_borrow,
                total_borrowing: position.total_borrowing,
            });
        }
        Ok(())
    }

    /// Draw a loan of `amount` `token` for `safe`, paid out to `recipient`
    fn borrow(
        &mut self,
        safe: &Address,
        token: &Address,
        amount: u128,
        recipient: &Address,
    ) -> Result<(), LedgerError>;

    /// Apply a repayment of `amount` `token` against the safe's debt
    fn repay(&mut self, safe: &Address, token: &Address, amount: u128) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrowing_position_math() {
        let healthy = BorrowingPosition {
            max_borrow: 100,
            total_borrowing: 40,
        };
        assert!(healthy.is_healthy());
        assert_eq!(healthy.headroom(), 60);
        assert_eq!(healthy.deficit(), 0);

        let underwater = BorrowingPosition {
            max_borrow: 40,
            total_borrowing: 100,
        };
        assert!(!underwater.is_healthy());
        assert_eq!(underwater.headroom(), 0);
        assert_eq!(underwater.deficit(), 60);
    }

    #[test]
    fn test_borrowing_power_rounds_down() {
        let config = CollateralTokenConfig {
            ltv: 5_000,
            liquidation_threshold: 8_000,
            liquidation_bonus: 100,
        };
        assert_eq!(config.borrowing_power(101), 50);
    }
}

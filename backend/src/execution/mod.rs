//! Safe execution capability
//!
//! The cash module never moves funds itself. It describes what a safe must do
//! as a batch of [`Instruction`]s and hands the batch to a [`SafeAccounts`]
//! implementation, which executes it on the safe's behalf.
//!
//! # Critical Invariants
//!
//! - **Atomicity**: a batch is applied completely or not at all
//! - **No hidden targets**: every instruction names the contract it calls
//!
//! # Example
//!
//! ```rust
//! use safe_cash_core_rs::execution::{Call, Instruction};
//! use safe_cash_core_rs::Address;
//!
//! let usdc = Address::new("USDC");
//! let pay = Instruction::transfer(usdc.clone(), Address::new("dispatcher"), 25_000_000);
//!
//! assert_eq!(pay.target, usdc);
//! assert!(matches!(pay.call, Call::Transfer { amount: 25_000_000, .. }));
//! ```

use crate::core::types::Address;
use crate::ledger::{CollateralLedger, LedgerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while a safe executes an instruction batch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Insufficient {token} balance in {safe}: required {required}, available {available}")]
    InsufficientBalance {
        safe: Address,
        token: Address,
        required: u128,
        available: u128,
    },

    #[error("Insufficient {token} allowance for {spender}: required {required}, approved {approved}")]
    InsufficientAllowance {
        token: Address,
        spender: Address,
        required: u128,
        approved: u128,
    },

    #[error("Unknown call target {0}")]
    UnknownTarget(Address),

    #[error("Ledger call failed: {0}")]
    Ledger(#[from] LedgerError),
}

/// Payload of one instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Call {
    /// Move `amount` of the target token from the safe to `to`
    Transfer { to: Address, amount: u128 },

    /// Let `spender` pull up to `amount` of the target token from the safe
    Approve { spender: Address, amount: u128 },

    /// Draw a loan from the target ledger, paid out to `recipient`
    Borrow {
        token: Address,
        amount: u128,
        recipient: Address,
    },

    /// Repay the safe's debt at the target ledger
    Repay { token: Address, amount: u128 },
}

/// A call the safe performs on `target`, forwarding `value` native units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub target: Address,
    pub value: u128,
    pub call: Call,
}

impl Instruction {
    pub fn transfer(token: Address, to: Address, amount: u128) -> Self {
        Self {
            target: token,
            value: 0,
            call: Call::Transfer { to, amount },
        }
    }

    pub fn approve(token: Address, spender: Address, amount: u128) -> Self {
        Self {
            target: token,
            value: 0,
            call: Call::Approve { spender, amount },
        }
    }

    pub fn borrow(ledger: Address, token: Address, amount: u128, recipient: Address) -> Self {
        Self {
            target: ledger,
            value: 0,
            call: Call::Borrow {
                token,
                amount,
                recipient,
            },
        }
    }

    pub fn repay(ledger: Address, token: Address, amount: u128) -> Self {
        Self {
            target: ledger,
            value: 0,
            call: Call::Repay { token, amount },
        }
    }
}

/// The abstract Safe capability
///
/// Implementations own token balances and execute instruction batches for a
/// safe. A failed batch must leave every balance, allowance and loan
/// untouched.
pub trait SafeAccounts {
    /// Balance of `token` held by `safe` (base units)
    fn balance_of(&self, safe: &Address, token: &Address) -> u128;

    /// Execute `instructions` atomically on behalf of `safe`
    fn execute(
        &mut self,
        safe: &Address,
        instructions: &[Instruction],
    ) -> Result<(), ExecutionError>;
}

/// Everything the cash module and lens need from the outside world
pub trait CashEnvironment: CollateralLedger + SafeAccounts {}

impl<T: CollateralLedger + SafeAccounts> CashEnvironment for T {}

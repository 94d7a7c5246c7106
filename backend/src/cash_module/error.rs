//! Cash module errors
//!
//! Every rejection is synchronous and aborts the operation. [`CashError::kind`]
//! groups variants into the categories callers branch on.

use crate::core::time::Timestamp;
use crate::core::types::{Address, TxId};
use crate::execution::ExecutionError;
use crate::ledger::LedgerError;
use crate::models::safe::Mode;
use crate::models::spending_limit::SpendingLimitError;
use thiserror::Error;

/// Failure category of a [`CashError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transaction id already cleared
    Idempotency,
    /// Token not borrow- or collateral-capable where required
    UnsupportedAsset,
    /// USD amount converts to zero tokens
    DegenerateAmount,
    /// Balance cannot cover a spend, repay or withdrawal
    InsufficientBalance,
    /// Borrowings would exceed borrowing power
    OverBorrowed,
    /// Multiple tokens in Credit mode, or a redundant mode change
    ModeConflict,
    /// Withdrawal processed before its finalize time
    Timing,
    /// Restricted action invoked by the wrong account
    Authorization,
    /// Daily or monthly spending limit exceeded
    LimitExceeded,
    /// Malformed arguments or unknown safe
    InvalidInput,
    /// Any other collaborator failure
    Collaborator,
}

/// Errors that can occur during cash module operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CashError {
    #[error("Transaction {0} already cleared")]
    TransactionAlreadyCleared(TxId),

    #[error("Unsupported token {0}")]
    UnsupportedToken(Address),

    #[error("Amount cannot be zero")]
    AmountZero,

    #[error("Insufficient balance of {token}: required {required}, available {available}")]
    InsufficientBalance {
        token: Address,
        required: u128,
        available: u128,
    },

    #[error("Over-borrowed: total borrowing {total_borrowing} exceeds max borrow {max_borrow}")]
    OverBorrowed {
        max_borrow: u128,
        total_borrowing: u128,
    },

    #[error("Credit mode only supports a single token, got {0}")]
    MultipleTokensInCreditMode(usize),

    #[error("Mode {0} is already set")]
    ModeAlreadySet(Mode),

    #[error("Withdrawal cannot be processed before {finalize_time} (now {now})")]
    CannotWithdrawYet {
        finalize_time: Timestamp,
        now: Timestamp,
    },

    #[error("{account} is not authorized to {action}")]
    Unauthorized {
        account: Address,
        action: &'static str,
    },

    #[error("Duplicate token {0}")]
    DuplicateToken(Address),

    #[error("Array length mismatch: {tokens} tokens, {amounts} amounts")]
    ArrayLengthMismatch { tokens: usize, amounts: usize },

    #[error("No tokens provided")]
    NoTokens,

    #[error("Recipient cannot be the zero address")]
    InvalidRecipient,

    #[error("No withdrawal request pending for {0}")]
    WithdrawalNotFound(Address),

    #[error("Safe {0} is not registered")]
    SafeNotRegistered(Address),

    #[error("Safe {0} is already registered")]
    SafeAlreadyRegistered(Address),

    #[error("Cashback split {0} bps exceeds 100%")]
    InvalidCashbackSplit(u64),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Config mismatch: expected hash {expected}, got {actual}")]
    ConfigMismatch { expected: String, actual: String },

    #[error("State validation error: {0}")]
    StateValidation(String),

    #[error("Spending limit: {0}")]
    SpendingLimit(#[from] SpendingLimitError),

    #[error("Ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Execution: {0}")]
    Execution(#[from] ExecutionError),
}

impl CashError {
    /// Category of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            CashError::TransactionAlreadyCleared(_) => ErrorKind::Idempotency,
            CashError::UnsupportedToken(_)
            | CashError::Ledger(LedgerError::UnsupportedToken(_)) => ErrorKind::UnsupportedAsset,
            CashError::AmountZero => ErrorKind::DegenerateAmount,
            CashError::InsufficientBalance { .. }
            | CashError::Execution(ExecutionError::InsufficientBalance { .. }) => {
                ErrorKind::InsufficientBalance
            }
            CashError::OverBorrowed { .. }
            | CashError::Ledger(LedgerError::AccountUnhealthy { .. })
            | CashError::Execution(ExecutionError::Ledger(
                LedgerError::AccountUnhealthy { .. },
            )) => ErrorKind::OverBorrowed,
            CashError::MultipleTokensInCreditMode(_) | CashError::ModeAlreadySet(_) => {
                ErrorKind::ModeConflict
            }
            CashError::CannotWithdrawYet { .. } => ErrorKind::Timing,
            CashError::Unauthorized { .. } => ErrorKind::Authorization,
            CashError::SpendingLimit(SpendingLimitError::DailyLimitExceeded { .. })
            | CashError::SpendingLimit(SpendingLimitError::MonthlyLimitExceeded { .. }) => {
                ErrorKind::LimitExceeded
            }
            CashError::Ledger(_) | CashError::Execution(_) => ErrorKind::Collaborator,
            CashError::DuplicateToken(_)
            | CashError::ArrayLengthMismatch { .. }
            | CashError::NoTokens
            | CashError::InvalidRecipient
            | CashError::WithdrawalNotFound(_)
            | CashError::SafeNotRegistered(_)
            | CashError::SafeAlreadyRegistered(_)
            | CashError::InvalidCashbackSplit(_)
            | CashError::Overflow
            | CashError::InvalidConfig(_)
            | CashError::Serialization(_)
            | CashError::ConfigMismatch { .. }
            | CashError::StateValidation(_)
            | CashError::SpendingLimit(_) => ErrorKind::InvalidInput,
        }
    }
}

//! Safe Cash Core - Rust Engine
//!
//! Spend authorization and collateral-health engine for card-linked smart
//! accounts ("safes").
//!
//! # Architecture
//!
//! - **core**: Timestamps, calendar boundaries and identifiers
//! - **models**: Domain types (SpendingLimit, SafeCashConfig, WithdrawalRequest, Event)
//! - **ledger**: Collateral & borrowing ledger interface plus an in-memory ledger
//! - **execution**: Instructions a safe executes on the module's behalf
//! - **cash_module**: The per-safe state machine (spend, repay, withdraw, mode)
//! - **lens**: Read-only spend simulation and aggregate views
//!
//! # Critical Invariants
//!
//! 1. All USD values are u128 with 6 decimals; token amounts are base units
//! 2. Time is always passed in explicitly (`now`), never read from the system
//! 3. A rejected operation leaves no state change except a cleared transaction id

// Module declarations
pub mod cash_module;
pub mod core;
pub mod execution;
pub mod ledger;
pub mod lens;
pub mod models;

// Re-exports for convenience
pub use cash_module::{CashError, CashModule, CashModuleConfig, ErrorKind, SpendReceipt};
pub use core::time::{Clock, Timestamp};
pub use core::types::{Address, TokenData, TxId};
pub use execution::{CashEnvironment, Instruction, SafeAccounts};
pub use ledger::{CollateralLedger, InMemoryLedger};
pub use lens::{CashLens, DebitModeMaxSpend, SafeCashData, SpendCheck};
pub use models::{
    event::{Event, EventLog},
    safe::{Mode, SafeCashConfig},
    spending_limit::SpendingLimit,
    withdrawal::WithdrawalRequest,
};

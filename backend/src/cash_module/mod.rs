//! Cash Module - per-safe spend authorization
//!
//! Decides whether a card spend may be debited from a safe, funds it in the
//! safe's current mode, and manages the withdrawal and spending-limit state
//! that constrains those decisions.
//!
//! See `engine.rs` for the state machine and administration, `spend.rs` for
//! spends and repayments, `withdrawal.rs` for the withdrawal lifecycle.

pub mod checkpoint;
pub mod collateral;
pub mod engine;
pub mod error;
pub mod spend;
pub mod withdrawal;

pub use checkpoint::{compute_config_hash, StateSnapshot};
pub use engine::{CashModule, CashModuleConfig, Delays};
pub use error::{CashError, ErrorKind};
pub use spend::{RepayReceipt, SpendAttemptError, SpendLeg, SpendReceipt};

//! Domain models for the cash engine

pub mod event;
pub mod safe;
pub mod spending_limit;
pub mod state;
pub mod withdrawal;

// Re-exports
pub use event::{Event, EventLog};
pub use safe::{Mode, SafeCashConfig, SafeTier, DEFAULT_CASHBACK_SPLIT_TO_SAFE_BPS};
pub use spending_limit::{PendingLimitUpdate, SpendingHeadroom, SpendingLimit, SpendingLimitError};
pub use state::CashState;
pub use withdrawal::WithdrawalRequest;

//! Core primitives shared by every component: identifiers, token amounts and time.

pub mod time;
pub mod types;

pub use time::{start_of_next_day, start_of_next_month, Clock, Timestamp, SECONDS_PER_DAY};
pub use types::{Address, TokenData, TxId, HUNDRED_PERCENT_BPS, USD_UNIT};

//! Event logging for auditing and replay.
//!
//! This module defines the Event enum which captures every committed state
//! change of the cash module. Events enable:
//! - Auditing (which spend debited which safe, and under which mode)
//! - Off-chain indexing (withdrawal lifecycle, limit changes)
//! - Debugging (why a pending withdrawal disappeared)
//!
//! Events are only appended once an operation commits; a rejected operation
//! leaves no trace in the log.
//!
//! # Example
//!
//! ```rust
//! use safe_cash_core_rs::models::{Event, EventLog, Mode};
//! use safe_cash_core_rs::Address;
//!
//! let mut log = EventLog::new();
//! log.log(Event::ModeSet {
//!     time: 1_000,
//!     safe: Address::new("0xsafe"),
//!     previous_mode: Mode::Debit,
//!     new_mode: Mode::Credit,
//!     effective_time: 1_060,
//! });
//!
//! assert_eq!(log.events_of_type("ModeSet").len(), 1);
//! ```

use crate::core::time::Timestamp;
use crate::core::types::{Address, TxId};
use crate::models::safe::{Mode, SafeTier};
use serde::{Deserialize, Serialize};

/// Cash module event capturing a committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Safe registered with the cash module
    SafeSetUp {
        time: Timestamp,
        safe: Address,
        daily_limit: u128,
        monthly_limit: u128,
        timezone_offset: i64,
    },

    /// Mode changed or a change was scheduled for `effective_time`
    ModeSet {
        time: Timestamp,
        safe: Address,
        previous_mode: Mode,
        new_mode: Mode,
        effective_time: Timestamp,
    },

    /// New spending limits stored (effective at `effective_time`)
    SpendingLimitChanged {
        time: Timestamp,
        safe: Address,
        new_daily_limit: u128,
        new_monthly_limit: u128,
        effective_time: Timestamp,
    },

    /// Card spend debited
    Spend {
        time: Timestamp,
        safe: Address,
        tx_id: TxId,
        mode: Mode,
        tokens: Vec<Address>,
        amounts: Vec<u128>,
        amounts_usd: Vec<u128>,
        total_usd: u128,
    },

    /// Debt repaid from the safe's balance
    Repay {
        time: Timestamp,
        safe: Address,
        token: Address,
        amount: u128,
        amount_usd: u128,
    },

    WithdrawalRequested {
        time: Timestamp,
        safe: Address,
        request_id: String,
        tokens: Vec<Address>,
        amounts: Vec<u128>,
        recipient: Address,
        finalize_time: Timestamp,
    },

    /// A pending withdrawal amount was lowered to make room for a spend/repay
    WithdrawalAmountUpdated {
        time: Timestamp,
        safe: Address,
        request_id: String,
        token: Address,
        new_amount: u128,
    },

    WithdrawalCancelled {
        time: Timestamp,
        safe: Address,
        request_id: String,
        tokens: Vec<Address>,
        amounts: Vec<u128>,
        recipient: Address,
    },

    WithdrawalProcessed {
        time: Timestamp,
        safe: Address,
        request_id: String,
        tokens: Vec<Address>,
        amounts: Vec<u128>,
        recipient: Address,
    },

    DelaysSet {
        time: Timestamp,
        withdrawal_delay: u64,
        spend_limit_delay: u64,
        mode_delay: u64,
    },

    SettlementDispatcherSet {
        time: Timestamp,
        previous: Address,
        dispatcher: Address,
    },

    SafeTierSet {
        time: Timestamp,
        safe: Address,
        tier: SafeTier,
    },

    CashbackSplitSet {
        time: Timestamp,
        safe: Address,
        previous_bps: u64,
        split_bps: u64,
    },

    CashbackRecorded {
        time: Timestamp,
        safe: Address,
        amount_usd: u128,
        total_usd: u128,
    },
}

impl Event {
    /// Get the time at which this event was committed
    pub fn time(&self) -> Timestamp {
        match self {
            Event::SafeSetUp { time, .. }
            | Event::ModeSet { time, .. }
            | Event::SpendingLimitChanged { time, .. }
            | Event::Spend { time, .. }
            | Event::Repay { time, .. }
            | Event::WithdrawalRequested { time, .. }
            | Event::WithdrawalAmountUpdated { time, .. }
            | Event::WithdrawalCancelled { time, .. }
            | Event::WithdrawalProcessed { time, .. }
            | Event::DelaysSet { time, .. }
            | Event::SettlementDispatcherSet { time, .. }
            | Event::SafeTierSet { time, .. }
            | Event::CashbackSplitSet { time, .. }
            | Event::CashbackRecorded { time, .. } => *time,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SafeSetUp { .. } => "SafeSetUp",
            Event::ModeSet { .. } => "ModeSet",
            Event::SpendingLimitChanged { .. } => "SpendingLimitChanged",
            Event::Spend { .. } => "Spend",
            Event::Repay { .. } => "Repay",
            Event::WithdrawalRequested { .. } => "WithdrawalRequested",
            Event::WithdrawalAmountUpdated { .. } => "WithdrawalAmountUpdated",
            Event::WithdrawalCancelled { .. } => "WithdrawalCancelled",
            Event::WithdrawalProcessed { .. } => "WithdrawalProcessed",
            Event::DelaysSet { .. } => "DelaysSet",
            Event::SettlementDispatcherSet { .. } => "SettlementDispatcherSet",
            Event::SafeTierSet { .. } => "SafeTierSet",
            Event::CashbackSplitSet { .. } => "CashbackSplitSet",
            Event::CashbackRecorded { .. } => "CashbackRecorded",
        }
    }

    /// Get the safe this event relates to (None for module-wide events)
    pub fn safe(&self) -> Option<&Address> {
        match self {
            Event::SafeSetUp { safe, .. }
            | Event::ModeSet { safe, .. }
            | Event::SpendingLimitChanged { safe, .. }
            | Event::Spend { safe, .. }
            | Event::Repay { safe, .. }
            | Event::WithdrawalRequested { safe, .. }
            | Event::WithdrawalAmountUpdated { safe, .. }
            | Event::WithdrawalCancelled { safe, .. }
            | Event::WithdrawalProcessed { safe, .. }
            | Event::SafeTierSet { safe, .. }
            | Event::CashbackSplitSet { safe, .. }
            | Event::CashbackRecorded { safe, .. } => Some(safe),
            Event::DelaysSet { .. } | Event::SettlementDispatcherSet { .. } => None,
        }
    }

    /// Get the spend transaction id if the event is a spend
    pub fn tx_id(&self) -> Option<&TxId> {
        match self {
            Event::Spend { tx_id, .. } => Some(tx_id),
            _ => None,
        }
    }
}

/// Event log for storing and querying cash module events.
///
/// This is a simple wrapper around Vec<Event> with convenience methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Append a batch of events committed together
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Get the number of events logged
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get all events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific safe
    pub fn events_for_safe(&self, safe: &Address) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.safe() == Some(safe))
            .collect()
    }

    /// Get events for a specific spend transaction
    pub fn events_for_tx(&self, tx_id: &TxId) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.tx_id() == Some(tx_id))
            .collect()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend_event(safe: &str, tx: &str) -> Event {
        Event::Spend {
            time: 10,
            safe: Address::new(safe),
            tx_id: TxId::new(tx),
            mode: Mode::Debit,
            tokens: vec![Address::new("USDC")],
            amounts: vec![5_000_000],
            amounts_usd: vec![5_000_000],
            total_usd: 5_000_000,
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = spend_event("SAFE_A", "tx_001");
        assert_eq!(event.time(), 10);
        assert_eq!(event.event_type(), "Spend");
        assert_eq!(event.safe(), Some(&Address::new("SAFE_A")));
        assert_eq!(event.tx_id(), Some(&TxId::new("tx_001")));
    }

    #[test]
    fn test_module_wide_events_have_no_safe() {
        let event = Event::DelaysSet {
            time: 0,
            withdrawal_delay: 60,
            spend_limit_delay: 60,
            mode_delay: 60,
        };
        assert_eq!(event.safe(), None);
        assert_eq!(event.tx_id(), None);
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        assert!(log.is_empty());

        log.log(spend_event("SAFE_A", "tx_001"));
        log.extend(vec![
            spend_event("SAFE_B", "tx_002"),
            Event::SafeTierSet {
                time: 11,
                safe: Address::new("SAFE_A"),
                tier: SafeTier::Chad,
            },
        ]);

        assert_eq!(log.len(), 3);
        assert_eq!(log.events_for_safe(&Address::new("SAFE_A")).len(), 2);
        assert_eq!(log.events_of_type("Spend").len(), 2);
        assert_eq!(log.events_for_tx(&TxId::new("tx_002")).len(), 1);

        log.clear();
        assert!(log.is_empty());
    }
}

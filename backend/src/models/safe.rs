//! Safe cash configuration
//!
//! One `SafeCashConfig` exists per registered safe. It is created on setup,
//! mutated only by the cash module and never deleted.
//!
//! # Mode State Machine
//!
//! ```text
//!            set_mode(Credit), delay > 0
//!   Debit ──────────────────────────────► Debit + incoming Credit @ t
//!     ▲                                           │
//!     │ set_mode(Debit) (immediate,               │ first access with now >= t
//!     │ clears any incoming change)               ▼
//!     └──────────────────────────────────────── Credit
//! ```
//!
//! A due incoming change is applied lazily: mutating paths call
//! [`SafeCashConfig::resolve_mode`], read paths call
//! [`SafeCashConfig::effective_mode`] which never writes.

use crate::core::time::Timestamp;
use crate::core::types::{Address, TxId};
use crate::models::spending_limit::SpendingLimit;
use crate::models::withdrawal::WithdrawalRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default share of cashback paid to the safe itself (basis points)
pub const DEFAULT_CASHBACK_SPLIT_TO_SAFE_BPS: u64 = 5_000;

/// How a safe funds its spending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Spending consumes the safe's own token balances
    #[default]
    Debit,
    /// Spending draws a loan against the safe's collateral
    Credit,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Debit => write!(f, "Debit"),
            Mode::Credit => write!(f, "Credit"),
        }
    }
}

/// Cashback classification of a safe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafeTier {
    #[default]
    Pepe,
    Wojak,
    Chad,
    Whale,
    Business,
}

/// Per-safe state owned by the cash module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeCashConfig {
    mode: Mode,

    /// Mode scheduled to become current at `incoming_mode_start_time`
    incoming_mode: Option<Mode>,

    /// Activation time of `incoming_mode` (0 = nothing pending)
    incoming_mode_start_time: Timestamp,

    spending_limit: SpendingLimit,

    /// At most one outstanding withdrawal
    pending_withdrawal_request: Option<WithdrawalRequest>,

    /// Append-only set of debited transaction ids
    transaction_cleared: BTreeSet<TxId>,

    safe_tier: SafeTier,

    cashback_split_to_safe_bps: u64,

    /// Lifetime cashback credited to this safe (USD, 6 decimals)
    total_cashback_earned_usd: u128,
}

impl SafeCashConfig {
    /// Fresh configuration in Debit mode with the given spending limit
    pub fn new(spending_limit: SpendingLimit) -> Self {
        Self {
            mode: Mode::Debit,
            incoming_mode: None,
            incoming_mode_start_time: 0,
            spending_limit,
            pending_withdrawal_request: None,
            transaction_cleared: BTreeSet::new(),
            safe_tier: SafeTier::default(),
            cashback_split_to_safe_bps: DEFAULT_CASHBACK_SPLIT_TO_SAFE_BPS,
            total_cashback_earned_usd: 0,
        }
    }

    // =========================================================================
    // Mode
    // =========================================================================

    /// Stored mode, ignoring any incoming change
    pub fn stored_mode(&self) -> Mode {
        self.mode
    }

    pub fn incoming_mode(&self) -> Option<Mode> {
        self.incoming_mode
    }

    pub fn incoming_mode_start_time(&self) -> Timestamp {
        self.incoming_mode_start_time
    }

    fn incoming_due(&self, now: Timestamp) -> Option<Mode> {
        match self.incoming_mode {
            Some(mode)
                if self.incoming_mode_start_time != 0
                    && now >= self.incoming_mode_start_time =>
            {
                Some(mode)
            }
            _ => None,
        }
    }

    /// Mode in force at `now`, without persisting a due change
    pub fn effective_mode(&self, now: Timestamp) -> Mode {
        self.incoming_due(now).unwrap_or(self.mode)
    }

    /// Apply a due incoming mode change. Returns the new mode if one was applied.
    pub fn resolve_mode(&mut self, now: Timestamp) -> Option<Mode> {
        let due = self.incoming_due(now)?;
        self.mode = due;
        self.clear_incoming_mode();
        Some(due)
    }

    /// Switch immediately, dropping any scheduled change
    pub fn set_mode_now(&mut self, mode: Mode) {
        self.mode = mode;
        self.clear_incoming_mode();
    }

    /// Schedule `mode` to become current at `start_time`
    pub fn schedule_mode(&mut self, mode: Mode, start_time: Timestamp) {
        self.incoming_mode = Some(mode);
        self.incoming_mode_start_time = start_time;
    }

    fn clear_incoming_mode(&mut self) {
        self.incoming_mode = None;
        self.incoming_mode_start_time = 0;
    }

    // =========================================================================
    // Spending limit
    // =========================================================================

    pub fn spending_limit(&self) -> &SpendingLimit {
        &self.spending_limit
    }

    pub fn spending_limit_mut(&mut self) -> &mut SpendingLimit {
        &mut self.spending_limit
    }

    // =========================================================================
    // Withdrawals
    // =========================================================================

    pub fn pending_withdrawal(&self) -> Option<&WithdrawalRequest> {
        self.pending_withdrawal_request.as_ref()
    }

    pub fn pending_withdrawal_mut(&mut self) -> Option<&mut WithdrawalRequest> {
        self.pending_withdrawal_request.as_mut()
    }

    /// Amount of `token` promised to a pending withdrawal
    pub fn pending_withdrawal_amount(&self, token: &Address) -> u128 {
        self.pending_withdrawal_request
            .as_ref()
            .map(|request| request.amount_for(token))
            .unwrap_or(0)
    }

    /// Replace the pending withdrawal, returning the previous one
    pub fn replace_pending_withdrawal(
        &mut self,
        request: WithdrawalRequest,
    ) -> Option<WithdrawalRequest> {
        self.pending_withdrawal_request.replace(request)
    }

    /// Remove and return the pending withdrawal
    pub fn take_pending_withdrawal(&mut self) -> Option<WithdrawalRequest> {
        self.pending_withdrawal_request.take()
    }

    // =========================================================================
    // Idempotency
    // =========================================================================

    pub fn is_transaction_cleared(&self, tx_id: &TxId) -> bool {
        self.transaction_cleared.contains(tx_id)
    }

    /// Record `tx_id` as debited. Returns `false` if it was already cleared.
    pub fn mark_transaction_cleared(&mut self, tx_id: TxId) -> bool {
        self.transaction_cleared.insert(tx_id)
    }

    // =========================================================================
    // Cashback classification
    // =========================================================================

    pub fn safe_tier(&self) -> SafeTier {
        self.safe_tier
    }

    pub fn set_safe_tier(&mut self, tier: SafeTier) {
        self.safe_tier = tier;
    }

    pub fn cashback_split_to_safe_bps(&self) -> u64 {
        self.cashback_split_to_safe_bps
    }

    pub fn set_cashback_split_to_safe_bps(&mut self, bps: u64) {
        self.cashback_split_to_safe_bps = bps;
    }

    pub fn total_cashback_earned_usd(&self) -> u128 {
        self.total_cashback_earned_usd
    }

    pub fn add_cashback(&mut self, amount_usd: u128) {
        self.total_cashback_earned_usd = self.total_cashback_earned_usd.saturating_add(amount_usd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SafeCashConfig {
        SafeCashConfig::new(SpendingLimit::initialize(100, 1_000, 0, 1_000).unwrap())
    }

    #[test]
    fn test_new_config_is_debit_without_pending_change() {
        let c = config();
        assert_eq!(c.stored_mode(), Mode::Debit);
        assert_eq!(c.incoming_mode_start_time(), 0);
        assert_eq!(c.effective_mode(u64::MAX), Mode::Debit);
    }

    #[test]
    fn test_effective_mode_does_not_persist() {
        let mut c = config();
        c.schedule_mode(Mode::Credit, 500);

        assert_eq!(c.effective_mode(499), Mode::Debit);
        assert_eq!(c.effective_mode(500), Mode::Credit);
        assert_eq!(c.stored_mode(), Mode::Debit);

        assert_eq!(c.resolve_mode(499), None);
        assert_eq!(c.resolve_mode(500), Some(Mode::Credit));
        assert_eq!(c.stored_mode(), Mode::Credit);
        assert_eq!(c.incoming_mode(), None);
    }

    #[test]
    fn test_set_mode_now_clears_schedule() {
        let mut c = config();
        c.schedule_mode(Mode::Credit, 500);
        c.set_mode_now(Mode::Debit);
        assert_eq!(c.effective_mode(10_000), Mode::Debit);
        assert_eq!(c.incoming_mode_start_time(), 0);
    }

    #[test]
    fn test_mark_transaction_cleared_once() {
        let mut c = config();
        assert!(c.mark_transaction_cleared(TxId::new("tx-1")));
        assert!(!c.mark_transaction_cleared(TxId::new("tx-1")));
        assert!(c.is_transaction_cleared(&TxId::new("tx-1")));
    }
}

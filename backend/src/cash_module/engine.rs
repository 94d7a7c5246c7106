//! Cash Module Engine
//!
//! Owns every safe's [`SafeCashConfig`] and applies the mutating operations:
//! - Safe setup and spending-limit changes
//! - Debit/Credit mode switching with delayed activation
//! - Card spends, repayments and withdrawals (see `spend.rs`, `withdrawal.rs`)
//! - Controller-only administration (delays, settlement dispatcher, tiers)
//!
//! # Critical Invariants
//!
//! - **All-or-nothing**: operations stage changes on a copy of the safe's
//!   config and commit only on success. The single exception is the
//!   transaction-cleared mark of a spend, which persists once the
//!   idempotency check has passed.
//! - **Lazy mode resolution**: a due incoming mode is applied by the next
//!   mutating call; reads report it through [`CashModule::get_mode`].
//! - **Events follow commits**: nothing is logged for a rejected operation.
//!
//! # Example
//!
//! ```rust
//! use safe_cash_core_rs::cash_module::{CashModule, CashModuleConfig};
//! use safe_cash_core_rs::models::Mode;
//! use safe_cash_core_rs::Address;
//!
//! let config = CashModuleConfig {
//!     controller: Address::new("0xcontroller"),
//!     settlement_dispatcher: Address::new("0xdispatcher"),
//!     withdrawal_delay: 60,
//!     spend_limit_delay: 3_600,
//!     mode_delay: 60,
//! };
//! let mut module = CashModule::new(config).unwrap();
//!
//! let safe = Address::new("0xsafe");
//! module.setup_safe(&safe, 1_000_000_000, 10_000_000_000, 0, 1_000).unwrap();
//!
//! module.set_mode(&safe, Mode::Credit, 1_000).unwrap();
//! assert_eq!(module.get_mode(&safe, 1_059).unwrap(), Mode::Debit);
//! assert_eq!(module.get_mode(&safe, 1_060).unwrap(), Mode::Credit);
//! ```

use crate::cash_module::error::CashError;
use crate::core::time::Timestamp;
use crate::core::types::{Address, TxId, HUNDRED_PERCENT_BPS};
use crate::models::event::{Event, EventLog};
use crate::models::safe::{Mode, SafeCashConfig, SafeTier};
use crate::models::spending_limit::SpendingLimit;
use crate::models::state::CashState;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ============================================================================
// Configuration Types
// ============================================================================

/// Construction-time configuration of the cash module
///
/// # Fields
///
/// * `controller` - Account allowed to run administrative operations
/// * `settlement_dispatcher` - Recipient of spent funds and borrowed loans
/// * `withdrawal_delay` - Seconds between a withdrawal request and its finalization
/// * `spend_limit_delay` - Seconds before a spending-limit change takes effect
/// * `mode_delay` - Seconds before a switch to Credit mode takes effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashModuleConfig {
    pub controller: Address,

    pub settlement_dispatcher: Address,

    #[serde(default)]
    pub withdrawal_delay: u64,

    #[serde(default)]
    pub spend_limit_delay: u64,

    #[serde(default)]
    pub mode_delay: u64,
}

impl CashModuleConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, CashError> {
        let config: CashModuleConfig = serde_json::from_str(json)
            .map_err(|e| CashError::InvalidConfig(format!("Config parse failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CashError> {
        if self.controller.is_zero() {
            return Err(CashError::InvalidConfig(
                "controller must not be the zero address".to_string(),
            ));
        }
        if self.settlement_dispatcher.is_zero() {
            return Err(CashError::InvalidConfig(
                "settlement_dispatcher must not be the zero address".to_string(),
            ));
        }
        Ok(())
    }

    /// Delays as configured at construction
    pub fn delays(&self) -> Delays {
        Delays {
            withdrawal: self.withdrawal_delay,
            spend_limit: self.spend_limit_delay,
            mode: self.mode_delay,
        }
    }
}

/// Delays in force (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delays {
    pub withdrawal: u64,
    pub spend_limit: u64,
    pub mode: u64,
}

// ============================================================================
// Cash Module
// ============================================================================

/// The per-safe spend authorization state machine
#[derive(Debug, Clone)]
pub struct CashModule {
    config: CashModuleConfig,
    pub(crate) delays: Delays,
    pub(crate) settlement_dispatcher: Address,
    pub(crate) state: CashState,
    pub(crate) events: EventLog,
}

impl CashModule {
    /// Create a module with no registered safes
    ///
    /// # Errors
    /// `InvalidConfig` if the controller or dispatcher is the zero address.
    pub fn new(config: CashModuleConfig) -> Result<Self, CashError> {
        config.validate()?;

        Ok(Self {
            delays: config.delays(),
            settlement_dispatcher: config.settlement_dispatcher.clone(),
            config,
            state: CashState::new(),
            events: EventLog::new(),
        })
    }

    // ========================================================================
    // Staging
    // ========================================================================

    /// Copy of a safe's config to stage changes on
    pub(crate) fn staged(&self, safe: &Address) -> Result<SafeCashConfig, CashError> {
        self.state
            .get(safe)
            .cloned()
            .ok_or_else(|| CashError::SafeNotRegistered(safe.clone()))
    }

    /// Store a staged config and log the events it produced
    pub(crate) fn commit(&mut self, safe: &Address, config: SafeCashConfig, events: Vec<Event>) {
        self.state.insert(safe.clone(), config);
        self.events.extend(events);
    }

    fn ensure_controller(&self, caller: &Address, action: &'static str) -> Result<(), CashError> {
        if caller != &self.config.controller {
            return Err(CashError::Unauthorized {
                account: caller.clone(),
                action,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Safe Lifecycle
    // ========================================================================

    /// Register a safe in Debit mode with an initial spending limit
    ///
    /// # Errors
    /// - `SafeAlreadyRegistered` if the safe already has a config
    /// - `SpendingLimit` if daily > monthly or the timezone offset is invalid
    pub fn setup_safe(
        &mut self,
        safe: &Address,
        daily_limit: u128,
        monthly_limit: u128,
        timezone_offset: i64,
        now: Timestamp,
    ) -> Result<(), CashError> {
        if self.state.contains(safe) {
            return Err(CashError::SafeAlreadyRegistered(safe.clone()));
        }

        let limit = SpendingLimit::initialize(daily_limit, monthly_limit, timezone_offset, now)?;
        info!(
            safe = %safe,
            daily_limit = %daily_limit,
            monthly_limit = %monthly_limit,
            "safe set up"
        );

        self.commit(
            safe,
            SafeCashConfig::new(limit),
            vec![Event::SafeSetUp {
                time: now,
                safe: safe.clone(),
                daily_limit,
                monthly_limit,
                timezone_offset,
            }],
        );
        Ok(())
    }

    /// Switch between Debit and Credit
    ///
    /// Moving to Debit is immediate and drops a scheduled switch to Credit.
    /// Moving to Credit is scheduled at `now + mode_delay` unless the delay is
    /// zero. Requesting the mode already in force with nothing scheduled is
    /// rejected.
    pub fn set_mode(
        &mut self,
        safe: &Address,
        mode: Mode,
        now: Timestamp,
    ) -> Result<(), CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        let previous_mode = config.stored_mode();
        let cancels_incoming = config.incoming_mode().is_some_and(|incoming| incoming != mode);
        if previous_mode == mode && !cancels_incoming {
            return Err(CashError::ModeAlreadySet(mode));
        }

        let effective_time = if mode == Mode::Debit || self.delays.mode == 0 {
            config.set_mode_now(mode);
            now
        } else {
            let start = now.saturating_add(self.delays.mode);
            config.schedule_mode(mode, start);
            start
        };
        debug!(safe = %safe, %previous_mode, new_mode = %mode, effective_time, "mode set");

        self.commit(
            safe,
            config,
            vec![Event::ModeSet {
                time: now,
                safe: safe.clone(),
                previous_mode,
                new_mode: mode,
                effective_time,
            }],
        );
        Ok(())
    }

    /// Store new spending limits, effective after the spend-limit delay
    pub fn update_spending_limit(
        &mut self,
        safe: &Address,
        daily_limit: u128,
        monthly_limit: u128,
        now: Timestamp,
    ) -> Result<(), CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        let delay = self.delays.spend_limit;
        config
            .spending_limit_mut()
            .update(daily_limit, monthly_limit, delay, now)?;

        self.commit(
            safe,
            config,
            vec![Event::SpendingLimitChanged {
                time: now,
                safe: safe.clone(),
                new_daily_limit: daily_limit,
                new_monthly_limit: monthly_limit,
                effective_time: now.saturating_add(delay),
            }],
        );
        Ok(())
    }

    /// Share of cashback paid to the safe rather than its spender (bps)
    pub fn set_cashback_split_to_safe_percentage(
        &mut self,
        safe: &Address,
        split_bps: u64,
        now: Timestamp,
    ) -> Result<(), CashError> {
        if split_bps as u128 > HUNDRED_PERCENT_BPS {
            return Err(CashError::InvalidCashbackSplit(split_bps));
        }

        let mut config = self.staged(safe)?;
        config.resolve_mode(now);
        let previous_bps = config.cashback_split_to_safe_bps();
        config.set_cashback_split_to_safe_bps(split_bps);

        self.commit(
            safe,
            config,
            vec![Event::CashbackSplitSet {
                time: now,
                safe: safe.clone(),
                previous_bps,
                split_bps,
            }],
        );
        Ok(())
    }

    // ========================================================================
    // Controller Operations
    // ========================================================================

    pub fn set_delays(
        &mut self,
        caller: &Address,
        withdrawal_delay: u64,
        spend_limit_delay: u64,
        mode_delay: u64,
        now: Timestamp,
    ) -> Result<(), CashError> {
        self.ensure_controller(caller, "set delays")?;

        self.delays = Delays {
            withdrawal: withdrawal_delay,
            spend_limit: spend_limit_delay,
            mode: mode_delay,
        };
        self.events.log(Event::DelaysSet {
            time: now,
            withdrawal_delay,
            spend_limit_delay,
            mode_delay,
        });
        Ok(())
    }

    pub fn set_settlement_dispatcher(
        &mut self,
        caller: &Address,
        dispatcher: &Address,
        now: Timestamp,
    ) -> Result<(), CashError> {
        self.ensure_controller(caller, "set the settlement dispatcher")?;
        if dispatcher.is_zero() {
            return Err(CashError::InvalidRecipient);
        }

        let previous = std::mem::replace(&mut self.settlement_dispatcher, dispatcher.clone());
        self.events.log(Event::SettlementDispatcherSet {
            time: now,
            previous,
            dispatcher: dispatcher.clone(),
        });
        Ok(())
    }

    pub fn set_safe_tier(
        &mut self,
        caller: &Address,
        safe: &Address,
        tier: SafeTier,
        now: Timestamp,
    ) -> Result<(), CashError> {
        self.ensure_controller(caller, "set safe tiers")?;

        let mut config = self.staged(safe)?;
        config.set_safe_tier(tier);
        self.commit(
            safe,
            config,
            vec![Event::SafeTierSet {
                time: now,
                safe: safe.clone(),
                tier,
            }],
        );
        Ok(())
    }

    /// Credit cashback earned by a safe's spends (USD, 6 decimals)
    pub fn record_cashback(
        &mut self,
        caller: &Address,
        safe: &Address,
        amount_usd: u128,
        now: Timestamp,
    ) -> Result<(), CashError> {
        self.ensure_controller(caller, "record cashback")?;
        if amount_usd == 0 {
            return Err(CashError::AmountZero);
        }

        let mut config = self.staged(safe)?;
        config.add_cashback(amount_usd);
        let total_usd = config.total_cashback_earned_usd();
        self.commit(
            safe,
            config,
            vec![Event::CashbackRecorded {
                time: now,
                safe: safe.clone(),
                amount_usd,
                total_usd,
            }],
        );
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &CashModuleConfig {
        &self.config
    }

    pub fn delays(&self) -> Delays {
        self.delays
    }

    pub fn settlement_dispatcher(&self) -> &Address {
        &self.settlement_dispatcher
    }

    pub fn state(&self) -> &CashState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Stored config of a safe (mode not resolved)
    pub fn get_data(&self, safe: &Address) -> Option<&SafeCashConfig> {
        self.state.get(safe)
    }

    pub fn transaction_cleared(&self, safe: &Address, tx_id: &TxId) -> bool {
        self.state
            .get(safe)
            .is_some_and(|config| config.is_transaction_cleared(tx_id))
    }

    /// Mode in force at `now`, including a due incoming change
    pub fn get_mode(&self, safe: &Address, now: Timestamp) -> Result<Mode, CashError> {
        self.state
            .get(safe)
            .map(|config| config.effective_mode(now))
            .ok_or_else(|| CashError::SafeNotRegistered(safe.clone()))
    }

    /// Activation time of the scheduled mode change (0 if none)
    pub fn incoming_mode_start_time(&self, safe: &Address) -> Timestamp {
        self.state
            .get(safe)
            .map(|config| config.incoming_mode_start_time())
            .unwrap_or(0)
    }

    pub fn get_pending_withdrawal_amount(&self, safe: &Address, token: &Address) -> u128 {
        self.state
            .get(safe)
            .map(|config| config.pending_withdrawal_amount(token))
            .unwrap_or(0)
    }
}

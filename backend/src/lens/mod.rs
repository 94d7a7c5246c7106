//! Cash Lens - read-only spend simulation
//!
//! Answers "would this spend succeed?" and "how much could this safe spend?"
//! without mutating anything. Every answer mirrors what the cash module would
//! do at the same `now`: pending mode changes are treated as applied, spending
//! limits as renewed, and a pending withdrawal as shrinkable or cancellable.
//!
//! # Example
//!
//! ```rust
//! use safe_cash_core_rs::cash_module::{CashModule, CashModuleConfig};
//! use safe_cash_core_rs::ledger::{CollateralTokenConfig, InMemoryLedger, TokenListing};
//! use safe_cash_core_rs::lens::CashLens;
//! use safe_cash_core_rs::{Address, TxId};
//!
//! let usdc = Address::new("USDC");
//! let safe = Address::new("0xsafe");
//!
//! let mut ledger = InMemoryLedger::new(Address::new("0xdebt-manager"));
//! ledger.list_token(usdc.clone(), TokenListing {
//!     decimals: 6,
//!     price_usd: 1_000_000,
//!     collateral: Some(CollateralTokenConfig { ltv: 8_000, liquidation_threshold: 9_000, liquidation_bonus: 100 }),
//!     borrowable: true,
//! });
//! ledger.mint(&safe, &usdc, 100_000_000);
//!
//! let mut module = CashModule::new(CashModuleConfig {
//!     controller: Address::new("0xcontroller"),
//!     settlement_dispatcher: Address::new("0xdispatcher"),
//!     withdrawal_delay: 0,
//!     spend_limit_delay: 0,
//!     mode_delay: 0,
//! }).unwrap();
//! module.setup_safe(&safe, 1_000_000_000, 5_000_000_000, 0, 0).unwrap();
//!
//! let lens = CashLens::new(&module, &ledger);
//! let tx = TxId::new("tx-1");
//! assert!(lens.can_spend(&safe, &tx, &[usdc.clone()], &[50_000_000], 0).allowed);
//!
//! let check = lens.can_spend(&safe, &tx, &[usdc], &[150_000_000], 0);
//! assert!(!check.allowed);
//! assert_eq!(check.reason, "Insufficient balance to spend with Debit flow");
//! ```

mod data;
mod debit;

pub use data::{SafeCashData, TokenPrice};
pub use debit::DebitModeMaxSpend;

use crate::cash_module::collateral::simulated_collateral;
use crate::cash_module::CashModule;
use crate::core::time::Timestamp;
use crate::core::types::{find_duplicate, Address, TokenData, TxId};
use crate::execution::CashEnvironment;
use crate::ledger::{BorrowingPosition, LedgerError};
use crate::models::safe::{Mode, SafeCashConfig};
use crate::models::withdrawal::WithdrawalRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from lens queries that cannot be answered with a verdict
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LensError {
    #[error("Safe {0} is not registered")]
    SafeNotRegistered(Address),

    #[error("Not a supported stable token: {0}")]
    UnsupportedToken(Address),

    #[error("Duplicate token {0}")]
    DuplicateToken(Address),

    #[error("Ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// Verdict of a simulated spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendCheck {
    pub allowed: bool,
    /// Why the spend would fail (empty when allowed)
    pub reason: String,
}

impl SpendCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Verdict of a preference-ordered single-token spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleTokenSpendCheck {
    /// First token that would succeed
    pub token: Option<Address>,
    pub check: SpendCheck,
}

/// Token of a simulated spend with its converted amount
struct Leg {
    token: Address,
    amount_usd: u128,
    amount: u128,
}

/// Read-only view over a cash module and its environment
pub struct CashLens<'a, E: ?Sized> {
    module: &'a CashModule,
    env: &'a E,
}

impl<'a, E: CashEnvironment + ?Sized> CashLens<'a, E> {
    pub fn new(module: &'a CashModule, env: &'a E) -> Self {
        Self { module, env }
    }

    fn safe_config(&self, safe: &Address) -> Result<&'a SafeCashConfig, LensError> {
        self.module
            .get_data(safe)
            .ok_or_else(|| LensError::SafeNotRegistered(safe.clone()))
    }

    fn position(
        &self,
        safe: &Address,
        withdrawal: Option<&WithdrawalRequest>,
        outflows: &[TokenData],
    ) -> Result<BorrowingPosition, LedgerError> {
        let collateral = simulated_collateral(self.env, safe, withdrawal, outflows);
        self.env.borrowing_power_and_total_borrowing(safe, &collateral)
    }

    /// Mode in force at `now`
    pub fn get_mode(&self, safe: &Address, now: Timestamp) -> Option<Mode> {
        self.module.get_mode(safe, now).ok()
    }

    // ========================================================================
    // Spend Simulation
    // ========================================================================

    /// Would `spend_tokens` with these arguments succeed at `now`?
    pub fn can_spend(
        &self,
        safe: &Address,
        tx_id: &TxId,
        tokens: &[Address],
        amounts_usd: &[u128],
        now: Timestamp,
    ) -> SpendCheck {
        match self.check_spend(safe, tx_id, tokens, amounts_usd, now) {
            Ok(()) => SpendCheck::allowed(),
            Err(reason) => SpendCheck::rejected(reason),
        }
    }

    fn check_spend(
        &self,
        safe: &Address,
        tx_id: &TxId,
        tokens: &[Address],
        amounts_usd: &[u128],
        now: Timestamp,
    ) -> Result<(), String> {
        if tokens.is_empty() {
            return Err("No tokens provided".to_string());
        }
        if tokens.len() != amounts_usd.len() {
            return Err("Tokens and amounts arrays length mismatch".to_string());
        }
        if find_duplicate(tokens).is_some() {
            return Err("Duplicate token found".to_string());
        }

        let config = self.safe_config(safe).map_err(|e| e.to_string())?;
        if config.is_transaction_cleared(tx_id) {
            return Err("Transaction already cleared".to_string());
        }

        let total_usd = amounts_usd
            .iter()
            .try_fold(0u128, |acc, amount| acc.checked_add(*amount))
            .ok_or_else(|| "Total amount overflows".to_string())?;
        if total_usd == 0 {
            return Err("Total amount cannot be zero".to_string());
        }

        let mode = config.effective_mode(now);
        if mode == Mode::Credit && tokens.len() > 1 {
            return Err("Credit mode only supports a single token".to_string());
        }

        let mut legs = Vec::with_capacity(tokens.len());
        for (token, &amount_usd) in tokens.iter().zip(amounts_usd) {
            if !self.env.is_borrow_token(token) {
                return Err("Not a supported stable token".to_string());
            }
            let amount = self
                .env
                .convert_usd_to_collateral_token(token, amount_usd)
                .map_err(|e| e.to_string())?;
            if amount == 0 {
                return Err("Amount cannot be zero".to_string());
            }
            legs.push(Leg {
                token: token.clone(),
                amount_usd,
                amount,
            });
        }

        config
            .spending_limit()
            .can_spend(total_usd, now)
            .map_err(|e| e.to_string())?;

        match mode {
            Mode::Debit => self.check_debit(safe, config, &legs),
            Mode::Credit => self.check_credit(safe, config, &legs[0]),
        }
    }

    fn check_debit(
        &self,
        safe: &Address,
        config: &SafeCashConfig,
        legs: &[Leg],
    ) -> Result<(), String> {
        let mut withdrawal = config.pending_withdrawal().cloned();
        for leg in legs {
            let balance = self.env.balance_of(safe, &leg.token);
            if leg.amount > balance {
                return Err("Insufficient balance to spend with Debit flow".to_string());
            }
            if let Some(request) = withdrawal.as_mut() {
                request.shrink_to(&leg.token, balance - leg.amount);
            }
        }

        let outflows: Vec<TokenData> = legs
            .iter()
            .map(|leg| TokenData::new(leg.token.clone(), leg.amount))
            .collect();
        let healthy = |withdrawal: Option<&WithdrawalRequest>| -> Result<bool, String> {
            self.position(safe, withdrawal, &outflows)
                .map(|position| position.is_healthy())
                .map_err(|e| e.to_string())
        };

        if healthy(withdrawal.as_ref())? || (withdrawal.is_some() && healthy(None)?) {
            Ok(())
        } else {
            Err("Insufficient borrowing power".to_string())
        }
    }

    fn check_credit(
        &self,
        safe: &Address,
        config: &SafeCashConfig,
        leg: &Leg,
    ) -> Result<(), String> {
        let fits = |withdrawal: Option<&WithdrawalRequest>| -> Result<bool, String> {
            self.position(safe, withdrawal, &[])
                .map(|p| p.total_borrowing.saturating_add(leg.amount_usd) <= p.max_borrow)
                .map_err(|e| e.to_string())
        };

        let withdrawal = config.pending_withdrawal();
        if !(fits(withdrawal)? || (withdrawal.is_some() && fits(None)?)) {
            return Err("Insufficient borrowing power".to_string());
        }
        if self.env.available_liquidity(&leg.token) < leg.amount {
            return Err("Insufficient liquidity in the ledger to fund the loan".to_string());
        }
        Ok(())
    }

    /// Find the first preferred token a single-token spend would succeed with
    ///
    /// Uses `credit_preferences` or `debit_preferences` depending on the mode
    /// in force at `now`. If no token works, reports the first failure.
    pub fn can_spend_single_token(
        &self,
        safe: &Address,
        tx_id: &TxId,
        credit_preferences: &[Address],
        debit_preferences: &[Address],
        amount_usd: u128,
        now: Timestamp,
    ) -> SingleTokenSpendCheck {
        let mode = match self.module.get_mode(safe, now) {
            Ok(mode) => mode,
            Err(err) => {
                return SingleTokenSpendCheck {
                    token: None,
                    check: SpendCheck::rejected(err.to_string()),
                }
            }
        };
        let preferences = match mode {
            Mode::Credit => credit_preferences,
            Mode::Debit => debit_preferences,
        };

        let mut first_failure = None;
        for token in preferences {
            let check =
                self.can_spend(safe, tx_id, std::slice::from_ref(token), &[amount_usd], now);
            if check.allowed {
                return SingleTokenSpendCheck {
                    token: Some(token.clone()),
                    check,
                };
            }
            first_failure.get_or_insert(check);
        }

        SingleTokenSpendCheck {
            token: None,
            check: first_failure.unwrap_or_else(|| SpendCheck::rejected("No tokens provided")),
        }
    }

    // ========================================================================
    // Credit Headroom
    // ========================================================================

    /// Largest Credit-mode spend the safe's collateral supports (USD)
    ///
    /// Tokens promised to a pending withdrawal do not count.
    pub fn get_max_spend_credit(&self, safe: &Address) -> Result<u128, LensError> {
        let config = self.safe_config(safe)?;
        let position = self.position(safe, config.pending_withdrawal(), &[])?;
        Ok(position.headroom())
    }
}

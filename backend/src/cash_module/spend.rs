//! Card spends and repayments
//!
//! A spend debits a safe for a card transaction identified by a [`TxId`]:
//! - **Debit** mode transfers the safe's own tokens to the settlement dispatcher
//! - **Credit** mode borrows the amount against the safe's collateral, paid
//!   out to the settlement dispatcher
//!
//! # Critical Invariants
//!
//! - **Idempotency**: once a transaction id passes the idempotency check it is
//!   marked cleared for good, even if the spend later fails
//! - **Limit accounting**: the spending limit is charged only when the spend
//!   commits
//! - **Withdrawal priority**: a spend may shrink a pending withdrawal, and may
//!   cancel it once to restore health, but never the other way around
//!
//! # Cancel-and-retry
//!
//! Each funding attempt returns [`SpendAttemptError::OverBorrowed`] when the
//! safe would end up unhealthy. If a withdrawal is pending, it is cancelled
//! and the attempt runs exactly once more.

use crate::cash_module::collateral::simulated_collateral;
use crate::cash_module::engine::CashModule;
use crate::cash_module::error::CashError;
use crate::cash_module::withdrawal::{cancel_pending_withdrawal, make_room_for_outflow};
use crate::core::time::Timestamp;
use crate::core::types::{find_duplicate, Address, TokenData, TxId};
use crate::execution::{CashEnvironment, ExecutionError, Instruction};
use crate::ledger::LedgerError;
use crate::models::event::Event;
use crate::models::safe::{Mode, SafeCashConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Outcome of one funding attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendAttemptError {
    /// The safe would be unhealthy; cancelling a pending withdrawal may help
    OverBorrowed {
        max_borrow: u128,
        total_borrowing: u128,
    },
    /// Anything else; never retried
    Fatal(CashError),
}

impl From<SpendAttemptError> for CashError {
    fn from(err: SpendAttemptError) -> Self {
        match err {
            SpendAttemptError::OverBorrowed {
                max_borrow,
                total_borrowing,
            } => CashError::OverBorrowed {
                max_borrow,
                total_borrowing,
            },
            SpendAttemptError::Fatal(err) => err,
        }
    }
}

impl From<ExecutionError> for SpendAttemptError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Ledger(LedgerError::AccountUnhealthy {
                max_borrow,
                total_borrowing,
            }) => SpendAttemptError::OverBorrowed {
                max_borrow,
                total_borrowing,
            },
            other => SpendAttemptError::Fatal(other.into()),
        }
    }
}

impl From<LedgerError> for SpendAttemptError {
    fn from(err: LedgerError) -> Self {
        SpendAttemptError::Fatal(err.into())
    }
}

/// One token of a spend, with its USD amount and converted token amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendLeg {
    pub token: Address,
    pub amount_usd: u128,
    pub amount: u128,
}

/// Result of a committed spend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendReceipt {
    pub tx_id: TxId,
    pub mode: Mode,
    pub legs: Vec<SpendLeg>,
    pub total_usd: u128,
    /// Id of the withdrawal cancelled to make the spend fit, if any
    pub cancelled_withdrawal: Option<String>,
}

/// Result of a committed repayment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepayReceipt {
    pub token: Address,
    pub amount: u128,
    pub amount_usd: u128,
}

/// Run `attempt`; if it reports over-borrowing while a withdrawal is
/// pending, cancel the withdrawal and run it once more.
///
/// Returns the id of the cancelled withdrawal, if one was cancelled.
fn attempt_with_withdrawal_fallback<F>(
    safe: &Address,
    config: &mut SafeCashConfig,
    now: Timestamp,
    events: &mut Vec<Event>,
    mut attempt: F,
) -> Result<Option<String>, CashError>
where
    F: FnMut(&SafeCashConfig) -> Result<(), SpendAttemptError>,
{
    match attempt(config) {
        Ok(()) => Ok(None),
        Err(SpendAttemptError::OverBorrowed { .. }) if config.pending_withdrawal().is_some() => {
            let cancelled = cancel_pending_withdrawal(safe, config, now, events);
            warn!(
                safe = %safe,
                request_id = ?cancelled,
                "spend over-borrows, cancelled pending withdrawal and retrying"
            );
            attempt(config)?;
            Ok(cancelled)
        }
        Err(err) => Err(err.into()),
    }
}

/// Debit attempt: health check with the outflows removed, then transfer
fn attempt_debit<E: CashEnvironment>(
    env: &mut E,
    safe: &Address,
    config: &SafeCashConfig,
    legs: &[SpendLeg],
    dispatcher: &Address,
) -> Result<(), SpendAttemptError> {
    let outflows: Vec<TokenData> = legs
        .iter()
        .map(|leg| TokenData::new(leg.token.clone(), leg.amount))
        .collect();
    let collateral = simulated_collateral(&*env, safe, config.pending_withdrawal(), &outflows);
    let position = env.borrowing_power_and_total_borrowing(safe, &collateral)?;
    if !position.is_healthy() {
        return Err(SpendAttemptError::OverBorrowed {
            max_borrow: position.max_borrow,
            total_borrowing: position.total_borrowing,
        });
    }

    let instructions: Vec<Instruction> = legs
        .iter()
        .map(|leg| Instruction::transfer(leg.token.clone(), dispatcher.clone(), leg.amount))
        .collect();
    env.execute(safe, &instructions)?;
    Ok(())
}

/// Credit attempt: headroom check net of the pending withdrawal, then borrow
fn attempt_credit<E: CashEnvironment>(
    env: &mut E,
    safe: &Address,
    config: &SafeCashConfig,
    leg: &SpendLeg,
    dispatcher: &Address,
) -> Result<(), SpendAttemptError> {
    let collateral = simulated_collateral(&*env, safe, config.pending_withdrawal(), &[]);
    let position = env.borrowing_power_and_total_borrowing(safe, &collateral)?;
    let total_borrowing = position.total_borrowing.saturating_add(leg.amount_usd);
    if total_borrowing > position.max_borrow {
        return Err(SpendAttemptError::OverBorrowed {
            max_borrow: position.max_borrow,
            total_borrowing,
        });
    }

    let borrow = Instruction::borrow(
        env.address(),
        leg.token.clone(),
        leg.amount,
        dispatcher.clone(),
    );
    env.execute(safe, &[borrow])?;
    Ok(())
}

impl CashModule {
    /// Spend `amount_usd` of a single token
    ///
    /// See [`CashModule::spend_tokens`].
    pub fn spend<E: CashEnvironment>(
        &mut self,
        env: &mut E,
        safe: &Address,
        tx_id: &TxId,
        token: &Address,
        amount_usd: u128,
        now: Timestamp,
    ) -> Result<SpendReceipt, CashError> {
        self.spend_tokens(
            env,
            safe,
            tx_id,
            std::slice::from_ref(token),
            &[amount_usd],
            now,
        )
    }

    /// Debit a card transaction across one or more tokens
    ///
    /// Credit mode accepts exactly one token.
    ///
    /// # Errors
    /// - `TransactionAlreadyCleared` if `tx_id` was seen before
    /// - `NoTokens`, `ArrayLengthMismatch`, `DuplicateToken` for malformed input
    /// - `UnsupportedToken` if a token is not a borrow token
    /// - `AmountZero` if an amount converts to zero tokens
    /// - `SpendingLimit` if the daily or monthly limit would be exceeded
    /// - `InsufficientBalance` (Debit) if the safe cannot cover a token amount
    /// - `OverBorrowed` if the safe stays unhealthy after the single retry
    pub fn spend_tokens<E: CashEnvironment>(
        &mut self,
        env: &mut E,
        safe: &Address,
        tx_id: &TxId,
        tokens: &[Address],
        amounts_usd: &[u128],
        now: Timestamp,
    ) -> Result<SpendReceipt, CashError> {
        let mut config = self.staged(safe)?;
        if config.is_transaction_cleared(tx_id) {
            return Err(CashError::TransactionAlreadyCleared(tx_id.clone()));
        }

        // The cleared mark survives whatever happens next
        config.mark_transaction_cleared(tx_id.clone());
        if let Some(stored) = self.state.get_mut(safe) {
            stored.mark_transaction_cleared(tx_id.clone());
        }

        if let Some(mode) = config.resolve_mode(now) {
            debug!(safe = %safe, %mode, "incoming mode applied");
        }
        let mode = config.stored_mode();

        let legs = self.build_legs(&*env, tokens, amounts_usd, mode)?;
        let total_usd = legs
            .iter()
            .try_fold(0u128, |acc, leg| acc.checked_add(leg.amount_usd))
            .ok_or(CashError::Overflow)?;

        config.spending_limit_mut().spend(total_usd, now)?;

        let mut events = Vec::new();
        let dispatcher = self.settlement_dispatcher.clone();
        let cancelled_withdrawal = match mode {
            Mode::Debit => {
                for leg in &legs {
                    make_room_for_outflow(
                        &*env,
                        safe,
                        &mut config,
                        &leg.token,
                        leg.amount,
                        now,
                        &mut events,
                    )?;
                }
                attempt_with_withdrawal_fallback(safe, &mut config, now, &mut events, |config| {
                    attempt_debit(env, safe, config, &legs, &dispatcher)
                })?
            }
            Mode::Credit => {
                let leg = &legs[0];
                attempt_with_withdrawal_fallback(safe, &mut config, now, &mut events, |config| {
                    attempt_credit(env, safe, config, leg, &dispatcher)
                })?
            }
        };

        events.push(Event::Spend {
            time: now,
            safe: safe.clone(),
            tx_id: tx_id.clone(),
            mode,
            tokens: legs.iter().map(|leg| leg.token.clone()).collect(),
            amounts: legs.iter().map(|leg| leg.amount).collect(),
            amounts_usd: legs.iter().map(|leg| leg.amount_usd).collect(),
            total_usd,
        });
        self.commit(safe, config, events);
        debug!(safe = %safe, tx_id = %tx_id, %mode, total_usd = %total_usd, "spend committed");

        Ok(SpendReceipt {
            tx_id: tx_id.clone(),
            mode,
            legs,
            total_usd,
            cancelled_withdrawal,
        })
    }

    fn build_legs<E: CashEnvironment>(
        &self,
        env: &E,
        tokens: &[Address],
        amounts_usd: &[u128],
        mode: Mode,
    ) -> Result<Vec<SpendLeg>, CashError> {
        if tokens.is_empty() {
            return Err(CashError::NoTokens);
        }
        if tokens.len() != amounts_usd.len() {
            return Err(CashError::ArrayLengthMismatch {
                tokens: tokens.len(),
                amounts: amounts_usd.len(),
            });
        }
        if let Some(duplicate) = find_duplicate(tokens) {
            return Err(CashError::DuplicateToken(duplicate.clone()));
        }
        if mode == Mode::Credit && tokens.len() > 1 {
            return Err(CashError::MultipleTokensInCreditMode(tokens.len()));
        }

        tokens
            .iter()
            .zip(amounts_usd)
            .map(|(token, &amount_usd)| {
                if !env.is_borrow_token(token) {
                    return Err(CashError::UnsupportedToken(token.clone()));
                }
                let amount = env.convert_usd_to_collateral_token(token, amount_usd)?;
                if amount == 0 {
                    return Err(CashError::AmountZero);
                }
                Ok(SpendLeg {
                    token: token.clone(),
                    amount_usd,
                    amount,
                })
            })
            .collect()
    }

    /// Repay `amount_usd` of the safe's debt in a borrow token
    ///
    /// Approves the ledger and repays in one batch. A pending withdrawal of the
    /// token is lowered if the safe could not honour both.
    pub fn repay<E: CashEnvironment>(
        &mut self,
        env: &mut E,
        safe: &Address,
        token: &Address,
        amount_usd: u128,
        now: Timestamp,
    ) -> Result<RepayReceipt, CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        if !env.is_borrow_token(token) {
            return Err(CashError::UnsupportedToken(token.clone()));
        }
        let amount = env.convert_usd_to_collateral_token(token, amount_usd)?;
        if amount == 0 {
            return Err(CashError::AmountZero);
        }

        let mut events = Vec::new();
        make_room_for_outflow(&*env, safe, &mut config, token, amount, now, &mut events)?;

        let ledger = env.address();
        env.execute(
            safe,
            &[
                Instruction::approve(token.clone(), ledger.clone(), amount),
                Instruction::repay(ledger, token.clone(), amount),
            ],
        )?;

        events.push(Event::Repay {
            time: now,
            safe: safe.clone(),
            token: token.clone(),
            amount,
            amount_usd,
        });
        self.commit(safe, config, events);
        debug!(safe = %safe, token = %token, amount = %amount, "repay committed");

        Ok(RepayReceipt {
            token: token.clone(),
            amount,
            amount_usd,
        })
    }
}

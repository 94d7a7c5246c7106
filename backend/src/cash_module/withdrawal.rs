//! Delayed withdrawals
//!
//! A safe may move tokens out only through a withdrawal request that
//! finalizes after the withdrawal delay. While pending, the requested tokens
//! stop counting as collateral. At most one request exists per safe; a new
//! request replaces the old one.

use crate::cash_module::collateral::simulated_collateral;
use crate::cash_module::engine::CashModule;
use crate::cash_module::error::CashError;
use crate::core::time::Timestamp;
use crate::core::types::{find_duplicate, Address};
use crate::execution::{CashEnvironment, Instruction};
use crate::ledger::LedgerError;
use crate::models::event::Event;
use crate::models::safe::SafeCashConfig;
use crate::models::withdrawal::WithdrawalRequest;
use tracing::{debug, info};

/// Drop the pending withdrawal, if any, recording a cancellation event
///
/// Returns the id of the cancelled request.
pub(crate) fn cancel_pending_withdrawal(
    safe: &Address,
    config: &mut SafeCashConfig,
    now: Timestamp,
    events: &mut Vec<Event>,
) -> Option<String> {
    let request = config.take_pending_withdrawal()?;
    events.push(Event::WithdrawalCancelled {
        time: now,
        safe: safe.clone(),
        request_id: request.id().to_string(),
        tokens: request.tokens().to_vec(),
        amounts: request.amounts().to_vec(),
        recipient: request.recipient().clone(),
    });
    Some(request.id().to_string())
}

/// Ensure `amount` of `token` can leave the safe
///
/// Fails if the balance is short. If the balance covers `amount` but not
/// `amount` plus the pending withdrawal of `token`, the withdrawal is lowered
/// to whatever the balance leaves over.
pub(crate) fn make_room_for_outflow<E: CashEnvironment + ?Sized>(
    env: &E,
    safe: &Address,
    config: &mut SafeCashConfig,
    token: &Address,
    amount: u128,
    now: Timestamp,
    events: &mut Vec<Event>,
) -> Result<(), CashError> {
    let balance = env.balance_of(safe, token);
    if amount > balance {
        return Err(CashError::InsufficientBalance {
            token: token.clone(),
            required: amount,
            available: balance,
        });
    }

    if let Some(request) = config.pending_withdrawal_mut() {
        let promised = request.amount_for(token);
        let remaining = balance - amount;
        if promised > remaining && request.shrink_to(token, remaining) {
            debug!(
                safe = %safe,
                token = %token,
                new_amount = %remaining,
                "withdrawal amount lowered"
            );
            events.push(Event::WithdrawalAmountUpdated {
                time: now,
                safe: safe.clone(),
                request_id: request.id().to_string(),
                token: token.clone(),
                new_amount: remaining,
            });
        }
    }
    Ok(())
}

/// Transfer every non-zero amount of `request` to its recipient
fn transfer_out<E: CashEnvironment>(
    env: &mut E,
    safe: &Address,
    request: &WithdrawalRequest,
) -> Result<(), CashError> {
    let instructions: Vec<Instruction> = request
        .entries()
        .into_iter()
        .filter(|entry| entry.amount > 0)
        .map(|entry| Instruction::transfer(entry.token, request.recipient().clone(), entry.amount))
        .collect();
    env.execute(safe, &instructions)?;
    Ok(())
}

fn processed_event(safe: &Address, request: &WithdrawalRequest, now: Timestamp) -> Event {
    Event::WithdrawalProcessed {
        time: now,
        safe: safe.clone(),
        request_id: request.id().to_string(),
        tokens: request.tokens().to_vec(),
        amounts: request.amounts().to_vec(),
        recipient: request.recipient().clone(),
    }
}

impl CashModule {
    /// Replace the safe's pending withdrawal with a new request
    ///
    /// The request finalizes at `now + withdrawal_delay`; with a zero delay it
    /// is processed immediately. The whole operation is rejected if the safe
    /// would be unhealthy without the requested tokens.
    ///
    /// # Errors
    /// - `InvalidRecipient` if `recipient` is the zero address
    /// - `NoTokens`, `ArrayLengthMismatch`, `DuplicateToken` for malformed input
    /// - `InsufficientBalance` if a token balance is below its amount
    /// - `OverBorrowed` if the remaining collateral cannot support the debt
    pub fn request_withdrawal<E: CashEnvironment>(
        &mut self,
        env: &mut E,
        safe: &Address,
        tokens: &[Address],
        amounts: &[u128],
        recipient: &Address,
        now: Timestamp,
    ) -> Result<WithdrawalRequest, CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        if recipient.is_zero() {
            return Err(CashError::InvalidRecipient);
        }
        if tokens.len() != amounts.len() {
            return Err(CashError::ArrayLengthMismatch {
                tokens: tokens.len(),
                amounts: amounts.len(),
            });
        }
        if tokens.is_empty() {
            return Err(CashError::NoTokens);
        }
        if let Some(duplicate) = find_duplicate(tokens) {
            return Err(CashError::DuplicateToken(duplicate.clone()));
        }

        let mut events = Vec::new();
        cancel_pending_withdrawal(safe, &mut config, now, &mut events);

        for (token, &amount) in tokens.iter().zip(amounts) {
            let available = env.balance_of(safe, token);
            if amount > available {
                return Err(CashError::InsufficientBalance {
                    token: token.clone(),
                    required: amount,
                    available,
                });
            }
        }

        let finalize_time = now.saturating_add(self.delays.withdrawal);
        let request = WithdrawalRequest::new(
            tokens.to_vec(),
            amounts.to_vec(),
            recipient.clone(),
            finalize_time,
        );

        let collateral = simulated_collateral(&*env, safe, Some(&request), &[]);
        env.ensure_health(safe, &collateral).map_err(|err| match err {
            LedgerError::AccountUnhealthy {
                max_borrow,
                total_borrowing,
            } => CashError::OverBorrowed {
                max_borrow,
                total_borrowing,
            },
            other => other.into(),
        })?;

        events.push(Event::WithdrawalRequested {
            time: now,
            safe: safe.clone(),
            request_id: request.id().to_string(),
            tokens: request.tokens().to_vec(),
            amounts: request.amounts().to_vec(),
            recipient: recipient.clone(),
            finalize_time,
        });
        info!(safe = %safe, request_id = request.id(), finalize_time, "withdrawal requested");

        if self.delays.withdrawal == 0 {
            transfer_out(env, safe, &request)?;
            events.push(processed_event(safe, &request, now));
        } else {
            config.replace_pending_withdrawal(request.clone());
        }

        self.commit(safe, config, events);
        Ok(request)
    }

    /// Execute the pending withdrawal once its finalize time has been reached
    pub fn process_withdrawal<E: CashEnvironment>(
        &mut self,
        env: &mut E,
        safe: &Address,
        now: Timestamp,
    ) -> Result<WithdrawalRequest, CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        let request = config
            .take_pending_withdrawal()
            .ok_or_else(|| CashError::WithdrawalNotFound(safe.clone()))?;
        if !request.is_finalized(now) {
            return Err(CashError::CannotWithdrawYet {
                finalize_time: request.finalize_time(),
                now,
            });
        }

        transfer_out(env, safe, &request)?;
        info!(safe = %safe, request_id = request.id(), "withdrawal processed");

        self.commit(safe, config, vec![processed_event(safe, &request, now)]);
        Ok(request)
    }

    /// Drop the pending withdrawal without moving any funds
    pub fn cancel_withdrawal(
        &mut self,
        safe: &Address,
        now: Timestamp,
    ) -> Result<String, CashError> {
        let mut config = self.staged(safe)?;
        config.resolve_mode(now);

        let mut events = Vec::new();
        let request_id = cancel_pending_withdrawal(safe, &mut config, now, &mut events)
            .ok_or_else(|| CashError::WithdrawalNotFound(safe.clone()))?;

        self.commit(safe, config, events);
        Ok(request_id)
    }
}

//! Hypothetical collateral views
//!
//! Health checks never look at raw balances alone. Tokens promised to a
//! pending withdrawal, and tokens about to leave in a debit spend, no longer
//! back the safe's loans. These helpers build the collateral list the ledger
//! should price for such a scenario.

use crate::core::types::{Address, TokenData};
use crate::execution::CashEnvironment;
use crate::models::withdrawal::WithdrawalRequest;

/// Balance of `token` net of the amount promised to `withdrawal`
pub fn effective_balance<E: CashEnvironment + ?Sized>(
    env: &E,
    safe: &Address,
    withdrawal: Option<&WithdrawalRequest>,
    token: &Address,
) -> u128 {
    let promised = withdrawal.map(|w| w.amount_for(token)).unwrap_or(0);
    env.balance_of(safe, token).saturating_sub(promised)
}

/// Collateral left after `withdrawal` and `outflows` have been taken out
///
/// Covers every collateral token the ledger lists, in listing order.
/// Amounts saturate at zero.
pub fn simulated_collateral<E: CashEnvironment + ?Sized>(
    env: &E,
    safe: &Address,
    withdrawal: Option<&WithdrawalRequest>,
    outflows: &[TokenData],
) -> Vec<TokenData> {
    env.collateral_tokens()
        .into_iter()
        .map(|token| {
            let leaving: u128 = outflows
                .iter()
                .filter(|o| o.token == token)
                .map(|o| o.amount)
                .sum();
            let amount = effective_balance(env, safe, withdrawal, &token).saturating_sub(leaving);
            TokenData::new(token, amount)
        })
        .collect()
}

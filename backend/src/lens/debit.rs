//! Debit-mode spending capacity
//!
//! Spending a collateral token in Debit mode lowers the safe's borrowing
//! power. When the safe could not stay healthy after spending all of its
//! preferred tokens, the shortfall (deficit) is charged against the tokens in
//! preference order: each token keeps back just enough value to cover what is
//! left of the deficit, and only the rest is spendable.

use super::{CashLens, LensError};
use crate::cash_module::collateral::{effective_balance, simulated_collateral};
use crate::core::types::{find_duplicate, Address, TokenData, HUNDRED_PERCENT_BPS};
use crate::execution::CashEnvironment;
use serde::{Deserialize, Serialize};

/// Per-token Debit-mode spending capacity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitModeMaxSpend {
    pub spendable_tokens: Vec<Address>,
    /// Token base units
    pub spendable_amounts: Vec<u128>,
    pub amounts_in_usd: Vec<u128>,
    pub total_spendable_in_usd: u128,
}

impl DebitModeMaxSpend {
    /// Nothing spendable in any of `tokens`
    fn nothing(tokens: &[Address]) -> Self {
        Self {
            spendable_tokens: tokens.to_vec(),
            spendable_amounts: vec![0; tokens.len()],
            amounts_in_usd: vec![0; tokens.len()],
            total_spendable_in_usd: 0,
        }
    }
}

impl<'a, E: CashEnvironment + ?Sized> CashLens<'a, E> {
    /// How much of each preferred token the safe can spend in Debit mode
    ///
    /// Balances are net of the pending withdrawal. If the safe stays healthy
    /// with every preferred token gone, everything is spendable. Otherwise the
    /// deficit is consumed in preference order; tokens with no borrowing power
    /// never help cover it. If the deficit cannot be covered at all, nothing
    /// is spendable.
    ///
    /// # Errors
    /// - `UnsupportedToken` if a preference is not a borrow token
    /// - `DuplicateToken` if a preference repeats
    pub fn get_max_spend_debit(
        &self,
        safe: &Address,
        preferences: &[Address],
    ) -> Result<DebitModeMaxSpend, LensError> {
        if let Some(duplicate) = find_duplicate(preferences) {
            return Err(LensError::DuplicateToken(duplicate.clone()));
        }
        if let Some(token) = preferences.iter().find(|t| !self.env.is_borrow_token(t)) {
            return Err(LensError::UnsupportedToken(token.clone()));
        }

        let config = self.safe_config(safe)?;
        let withdrawal = config.pending_withdrawal();

        let mut balances = Vec::with_capacity(preferences.len());
        let mut values = Vec::with_capacity(preferences.len());
        for token in preferences {
            let balance = effective_balance(self.env, safe, withdrawal, token);
            values.push(self.env.convert_collateral_token_to_usd(token, balance)?);
            balances.push(balance);
        }

        let everything: Vec<TokenData> = preferences
            .iter()
            .zip(&balances)
            .map(|(token, balance)| TokenData::new(token.clone(), *balance))
            .collect();
        let collateral = simulated_collateral(self.env, safe, withdrawal, &everything);
        let position = self
            .env
            .borrowing_power_and_total_borrowing(safe, &collateral)?;

        let mut result = DebitModeMaxSpend {
            spendable_tokens: preferences.to_vec(),
            spendable_amounts: balances.clone(),
            amounts_in_usd: values.clone(),
            total_spendable_in_usd: 0,
        };

        let mut deficit = position.deficit();
        for (i, token) in preferences.iter().enumerate() {
            if deficit == 0 {
                break;
            }
            if values[i] == 0 {
                continue;
            }
            let risk = match self.env.collateral_token_config(token) {
                Some(risk) if risk.ltv > 0 => risk,
                _ => continue,
            };

            let contribution = risk.borrowing_power(values[i]);
            if contribution >= deficit {
                // Keep back deficit / LTV, rounded up
                let retained = (deficit * HUNDRED_PERCENT_BPS).div_ceil(risk.ltv as u128);
                let spendable_usd = values[i].saturating_sub(retained);
                let amount = self
                    .env
                    .convert_usd_to_collateral_token(token, spendable_usd)?
                    .min(balances[i]);
                result.spendable_amounts[i] = amount;
                result.amounts_in_usd[i] = spendable_usd;
                deficit = 0;
            } else {
                result.spendable_amounts[i] = 0;
                result.amounts_in_usd[i] = 0;
                deficit -= contribution;
            }
        }

        if deficit > 0 {
            return Ok(DebitModeMaxSpend::nothing(preferences));
        }

        result.total_spendable_in_usd = result.amounts_in_usd.iter().sum();
        Ok(result)
    }
}

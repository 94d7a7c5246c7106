//! Aggregate safe view for dashboards

use super::{CashLens, DebitModeMaxSpend, LensError};
use crate::core::time::Timestamp;
use crate::core::types::{Address, TokenData};
use crate::execution::CashEnvironment;
use crate::models::safe::{Mode, SafeTier};
use crate::models::spending_limit::{SpendingHeadroom, SpendingLimit};
use crate::models::withdrawal::WithdrawalRequest;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub token: Address,
    /// USD (6 decimals) per whole token
    pub price_usd: u128,
}

/// Everything a client needs to render a safe's cash state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeCashData {
    /// Mode in force, with any due change applied
    pub mode: Mode,
    pub incoming_mode: Option<Mode>,
    pub incoming_mode_start_time: Timestamp,

    /// Raw balances of every collateral token
    pub collateral_balances: Vec<TokenData>,
    pub total_collateral_usd: u128,
    pub borrows: Vec<TokenData>,
    pub token_prices: Vec<TokenPrice>,
    pub withdrawal_request: Option<WithdrawalRequest>,

    /// Borrowing power net of the pending withdrawal
    pub max_borrow: u128,
    pub total_borrowing: u128,

    /// Limit as it applies at the query time
    pub spending_limit: SpendingLimit,
    pub remaining_spending_limit: SpendingHeadroom,

    pub credit_max_spend: u128,
    pub debit_max_spend: DebitModeMaxSpend,

    pub safe_tier: SafeTier,
    pub cashback_split_to_safe_bps: u64,
    pub total_cashback_earned_usd: u128,
}

impl<'a, E: CashEnvironment + ?Sized> CashLens<'a, E> {
    /// Snapshot of a safe's cash state at `now`
    ///
    /// `debit_preferences` orders the tokens for the Debit-mode capacity.
    pub fn get_safe_cash_data(
        &self,
        safe: &Address,
        debit_preferences: &[Address],
        now: Timestamp,
    ) -> Result<SafeCashData, LensError> {
        let config = self.safe_config(safe)?;
        let mode = config.effective_mode(now);
        let (incoming_mode, incoming_mode_start_time) = if mode != config.stored_mode() {
            (None, 0)
        } else {
            (config.incoming_mode(), config.incoming_mode_start_time())
        };

        let collateral_balances: Vec<TokenData> = self
            .env
            .collateral_tokens()
            .into_iter()
            .map(|token| {
                let balance = self.env.balance_of(safe, &token);
                TokenData::new(token, balance)
            })
            .collect();
        let mut total_collateral_usd = 0u128;
        for entry in &collateral_balances {
            total_collateral_usd = total_collateral_usd.saturating_add(
                self.env
                    .convert_collateral_token_to_usd(&entry.token, entry.amount)?,
            );
        }

        let mut priced: Vec<Address> = self.env.collateral_tokens();
        for token in self.env.borrow_tokens() {
            if !priced.contains(&token) {
                priced.push(token);
            }
        }
        let token_prices = priced
            .into_iter()
            .map(|token| -> Result<TokenPrice, LensError> {
                let price_usd = self.env.price(&token)?;
                Ok(TokenPrice { token, price_usd })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let position = self.position(safe, config.pending_withdrawal(), &[])?;
        let spending_limit = config.spending_limit().current(now);

        Ok(SafeCashData {
            mode,
            incoming_mode,
            incoming_mode_start_time,
            collateral_balances,
            total_collateral_usd,
            borrows: self.env.borrowings(safe),
            token_prices,
            withdrawal_request: config.pending_withdrawal().cloned(),
            max_borrow: position.max_borrow,
            total_borrowing: position.total_borrowing,
            remaining_spending_limit: spending_limit.max_can_spend(now),
            spending_limit,
            credit_max_spend: position.headroom(),
            debit_max_spend: self.get_max_spend_debit(safe, debit_preferences)?,
            safe_tier: config.safe_tier(),
            cashback_split_to_safe_bps: config.cashback_split_to_safe_bps(),
            total_cashback_earned_usd: config.total_cashback_earned_usd(),
        })
    }
}

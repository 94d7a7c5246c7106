//! In-memory collateral ledger
//!
//! A self-contained ledger that also plays the role of the token contracts and
//! of the safe execution capability. Balances, allowances, loans and lending
//! liquidity all live in this one struct so that instruction batches can be
//! applied atomically by staging them on a clone.
//!
//! NOTE: Available in all builds so integration tests and replay hosts can use
//! it, but it performs no access control and trusts every caller.

use crate::core::types::{Address, TokenData};
use crate::execution::{Call, ExecutionError, Instruction, SafeAccounts};
use crate::ledger::{BorrowingPosition, CollateralLedger, CollateralTokenConfig, LedgerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Listing parameters of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenListing {
    pub decimals: u32,
    /// USD (6 decimals) per whole token
    pub price_usd: u128,
    /// Risk parameters if the token counts as collateral
    pub collateral: Option<CollateralTokenConfig>,
    /// Whether the ledger lends (and accepts spends in) this token
    pub borrowable: bool,
}

impl TokenListing {
    fn unit(&self) -> u128 {
        10u128.pow(self.decimals)
    }
}

/// Ledger, token balances and safe executor in one place
///
/// # Example
///
/// ```rust
/// use safe_cash_core_rs::ledger::{CollateralLedger, CollateralTokenConfig, InMemoryLedger, TokenListing};
/// use safe_cash_core_rs::execution::SafeAccounts;
/// use safe_cash_core_rs::Address;
///
/// let usdc = Address::new("USDC");
/// let safe = Address::new("SAFE");
/// let mut ledger = InMemoryLedger::new(Address::new("LEDGER"));
/// ledger.list_token(usdc.clone(), TokenListing {
///     decimals: 6,
///     price_usd: 1_000_000,
///     collateral: Some(CollateralTokenConfig { ltv: 9_000, liquidation_threshold: 9_500, liquidation_bonus: 100 }),
///     borrowable: true,
/// });
/// ledger.mint(&safe, &usdc, 100_000_000);
///
/// assert_eq!(ledger.balance_of(&safe, &usdc), 100_000_000);
/// assert_eq!(ledger.convert_collateral_token_to_usd(&usdc, 100_000_000).unwrap(), 100_000_000);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    address: Address,
    tokens: HashMap<Address, TokenListing>,
    listing_order: Vec<Address>,
    /// (holder, token) -> balance
    balances: HashMap<(Address, Address), u128>,
    /// (owner, token, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), u128>,
    /// (safe, token) -> outstanding debt in token units
    debts: HashMap<(Address, Address), u128>,
    /// token -> amount available to lend
    liquidity: HashMap<Address, u128>,
}

impl InMemoryLedger {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            tokens: HashMap::new(),
            listing_order: Vec::new(),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            debts: HashMap::new(),
            liquidity: HashMap::new(),
        }
    }

    /// List (or re-list) a token
    pub fn list_token(&mut self, token: Address, listing: TokenListing) {
        if !self.tokens.contains_key(&token) {
            self.listing_order.push(token.clone());
        }
        self.tokens.insert(token, listing);
    }

    pub fn set_price(&mut self, token: &Address, price_usd: u128) -> Result<(), LedgerError> {
        let listing = self
            .tokens
            .get_mut(token)
            .ok_or_else(|| LedgerError::UnsupportedToken(token.clone()))?;
        listing.price_usd = price_usd;
        Ok(())
    }

    /// Credit `amount` of `token` to `holder` out of thin air
    pub fn mint(&mut self, holder: &Address, token: &Address, amount: u128) {
        *self
            .balances
            .entry((holder.clone(), token.clone()))
            .or_insert(0) += amount;
    }

    /// Overwrite a safe's outstanding debt (for seeding scenarios)
    pub fn set_debt(&mut self, safe: &Address, token: &Address, amount: u128) {
        self.debts.insert((safe.clone(), token.clone()), amount);
    }

    pub fn debt_of(&self, safe: &Address, token: &Address) -> u128 {
        self.debts
            .get(&(safe.clone(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn supply_liquidity(&mut self, token: &Address, amount: u128) {
        *self.liquidity.entry(token.clone()).or_insert(0) += amount;
    }

    pub fn allowance(&self, owner: &Address, token: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(owner.clone(), token.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn listing(&self, token: &Address) -> Result<&TokenListing, LedgerError> {
        self.tokens
            .get(token)
            .ok_or_else(|| LedgerError::UnsupportedToken(token.clone()))
    }

    /// Collateral the ledger itself sees: the safe's raw balances
    fn actual_collateral(&self, safe: &Address) -> Vec<TokenData> {
        self.collateral_tokens()
            .into_iter()
            .map(|token| {
                let amount = self.balance_of(safe, &token);
                TokenData::new(token, amount)
            })
            .collect()
    }

    fn debit_balance(
        &mut self,
        holder: &Address,
        token: &Address,
        amount: u128,
    ) -> Result<(), ExecutionError> {
        let available = self.balance_of(holder, token);
        if available < amount {
            return Err(ExecutionError::InsufficientBalance {
                safe: holder.clone(),
                token: token.clone(),
                required: amount,
                available,
            });
        }
        self.balances
            .insert((holder.clone(), token.clone()), available - amount);
        Ok(())
    }

    fn apply(&mut self, safe: &Address, instruction: &Instruction) -> Result<(), ExecutionError> {
        match &instruction.call {
            Call::Transfer { to, amount } => {
                let token = &instruction.target;
                self.debit_balance(safe, token, *amount)?;
                self.mint(to, token, *amount);
            }
            Call::Approve { spender, amount } => {
                self.allowances.insert(
                    (safe.clone(), instruction.target.clone(), spender.clone()),
                    *amount,
                );
            }
            Call::Borrow {
                token,
                amount,
                recipient,
            } => {
                self.ensure_self_target(&instruction.target)?;
                self.borrow(safe, token, *amount, recipient)?;
            }
            Call::Repay { token, amount } => {
                self.ensure_self_target(&instruction.target)?;
                let spender = self.address.clone();
                let approved = self.allowance(safe, token, &spender);
                if approved < *amount {
                    return Err(ExecutionError::InsufficientAllowance {
                        token: token.clone(),
                        spender,
                        required: *amount,
                        approved,
                    });
                }
                self.debit_balance(safe, token, *amount)?;
                self.allowances
                    .insert((safe.clone(), token.clone(), spender), approved - amount);
                self.repay(safe, token, *amount)?;
            }
        }
        Ok(())
    }

    fn ensure_self_target(&self, target: &Address) -> Result<(), ExecutionError> {
        if target != &self.address {
            return Err(ExecutionError::UnknownTarget(target.clone()));
        }
        Ok(())
    }
}

impl CollateralLedger for InMemoryLedger {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn is_borrow_token(&self, token: &Address) -> bool {
        self.tokens.get(token).is_some_and(|l| l.borrowable)
    }

    fn is_collateral_token(&self, token: &Address) -> bool {
        self.tokens.get(token).is_some_and(|l| l.collateral.is_some())
    }

    fn collateral_tokens(&self) -> Vec<Address> {
        self.listing_order
            .iter()
            .filter(|t| self.is_collateral_token(t))
            .cloned()
            .collect()
    }

    fn borrow_tokens(&self) -> Vec<Address> {
        self.listing_order
            .iter()
            .filter(|t| self.is_borrow_token(t))
            .cloned()
            .collect()
    }

    fn collateral_token_config(&self, token: &Address) -> Option<CollateralTokenConfig> {
        self.tokens.get(token).and_then(|l| l.collateral)
    }

    fn price(&self, token: &Address) -> Result<u128, LedgerError> {
        Ok(self.listing(token)?.price_usd)
    }

    fn convert_usd_to_collateral_token(
        &self,
        token: &Address,
        amount_usd: u128,
    ) -> Result<u128, LedgerError> {
        let listing = self.listing(token)?;
        if listing.price_usd == 0 {
            return Ok(0);
        }
        amount_usd
            .checked_mul(listing.unit())
            .map(|scaled| scaled / listing.price_usd)
            .ok_or(LedgerError::Overflow)
    }

    fn convert_collateral_token_to_usd(
        &self,
        token: &Address,
        amount: u128,
    ) -> Result<u128, LedgerError> {
        let listing = self.listing(token)?;
        amount
            .checked_mul(listing.price_usd)
            .map(|scaled| scaled / listing.unit())
            .ok_or(LedgerError::Overflow)
    }

    fn borrowing_power_and_total_borrowing(
        &self,
        safe: &Address,
        collateral: &[TokenData],
    ) -> Result<BorrowingPosition, LedgerError> {
        let mut max_borrow: u128 = 0;
        for entry in collateral {
            if let Some(config) = self.collateral_token_config(&entry.token) {
                let value = self.convert_collateral_token_to_usd(&entry.token, entry.amount)?;
                max_borrow = max_borrow.saturating_add(config.borrowing_power(value));
            }
        }

        let mut total_borrowing: u128 = 0;
        for debt in self.borrowings(safe) {
            let value = self.convert_collateral_token_to_usd(&debt.token, debt.amount)?;
            total_borrowing = total_borrowing.saturating_add(value);
        }

        Ok(BorrowingPosition {
            max_borrow,
            total_borrowing,
        })
    }

    fn borrowings(&self, safe: &Address) -> Vec<TokenData> {
        self.listing_order
            .iter()
            .filter_map(|token| {
                let amount = self.debt_of(safe, token);
                (amount > 0).then(|| TokenData::new(token.clone(), amount))
            })
            .collect()
    }

    fn available_liquidity(&self, token: &Address) -> u128 {
        self.liquidity.get(token).copied().unwrap_or(0)
    }

    fn borrow(
        &mut self,
        safe: &Address,
        token: &Address,
        amount: u128,
        recipient: &Address,
    ) -> Result<(), LedgerError> {
        if !self.is_borrow_token(token) {
            return Err(LedgerError::UnsupportedToken(token.clone()));
        }

        let available = self.available_liquidity(token);
        if amount > available {
            return Err(LedgerError::InsufficientLiquidity {
                token: token.clone(),
                requested: amount,
                available,
            });
        }

        let position =
            self.borrowing_power_and_total_borrowing(safe, &self.actual_collateral(safe))?;
        let borrowed_usd = self.convert_collateral_token_to_usd(token, amount)?;
        let total_after = position.total_borrowing.saturating_add(borrowed_usd);
        if total_after > position.max_borrow {
            return Err(LedgerError::AccountUnhealthy {
                max_borrow: position.max_borrow,
                total_borrowing: total_after,
            });
        }

        *self.debts.entry((safe.clone(), token.clone())).or_insert(0) += amount;
        self.liquidity.insert(token.clone(), available - amount);
        self.mint(recipient, token, amount);
        Ok(())
    }

    fn repay(&mut self, safe: &Address, token: &Address, amount: u128) -> Result<(), LedgerError> {
        let debt = self.debt_of(safe, token);
        if amount > debt {
            return Err(LedgerError::RepaymentExceedsDebt {
                token: token.clone(),
                amount,
                debt,
            });
        }
        self.debts.insert((safe.clone(), token.clone()), debt - amount);
        self.supply_liquidity(token, amount);
        Ok(())
    }
}

impl SafeAccounts for InMemoryLedger {
    fn balance_of(&self, safe: &Address, token: &Address) -> u128 {
        self.balances
            .get(&(safe.clone(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn execute(
        &mut self,
        safe: &Address,
        instructions: &[Instruction],
    ) -> Result<(), ExecutionError> {
        let mut staged = self.clone();
        for instruction in instructions {
            staged.apply(safe, instruction)?;
        }
        *self = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> Address {
        Address::new("USDC")
    }

    fn weth() -> Address {
        Address::new("WETH")
    }

    fn safe() -> Address {
        Address::new("SAFE")
    }

    fn ledger() -> InMemoryLedger {
        let mut ledger = InMemoryLedger::new(Address::new("LEDGER"));
        ledger.list_token(
            usdc(),
            TokenListing {
                decimals: 6,
                price_usd: 1_000_000,
                collateral: Some(CollateralTokenConfig {
                    ltv: 9_000,
                    liquidation_threshold: 9_500,
                    liquidation_bonus: 100,
                }),
                borrowable: true,
            },
        );
        ledger.list_token(
            weth(),
            TokenListing {
                decimals: 18,
                price_usd: 3_000_000_000,
                collateral: Some(CollateralTokenConfig {
                    ltv: 5_000,
                    liquidation_threshold: 8_000,
                    liquidation_bonus: 500,
                }),
                borrowable: false,
            },
        );
        ledger.supply_liquidity(&usdc(), 1_000_000_000_000);
        ledger
    }

    #[test]
    fn test_conversions_respect_decimals() {
        let l = ledger();
        // 1 WETH = $3000
        assert_eq!(
            l.convert_collateral_token_to_usd(&weth(), 1_000_000_000_000_000_000).unwrap(),
            3_000_000_000
        );
        assert_eq!(
            l.convert_usd_to_collateral_token(&weth(), 1_500_000_000).unwrap(),
            500_000_000_000_000_000
        );
    }

    #[test]
    fn test_borrowing_power_uses_override_not_balances() {
        let mut l = ledger();
        l.mint(&safe(), &usdc(), 1_000_000_000);
        let position = l
            .borrowing_power_and_total_borrowing(&safe(), &[TokenData::new(usdc(), 100_000_000)])
            .unwrap();
        assert_eq!(position.max_borrow, 90_000_000);
        assert_eq!(position.total_borrowing, 0);
    }

    #[test]
    fn test_failed_batch_leaves_state_untouched() {
        let mut l = ledger();
        l.mint(&safe(), &usdc(), 50);

        let result = l.execute(
            &safe(),
            &[
                Instruction::transfer(usdc(), Address::new("A"), 30),
                Instruction::transfer(usdc(), Address::new("B"), 30),
            ],
        );

        assert!(matches!(result, Err(ExecutionError::InsufficientBalance { .. })));
        assert_eq!(l.balance_of(&safe(), &usdc()), 50);
        assert_eq!(l.balance_of(&Address::new("A"), &usdc()), 0);
    }

    #[test]
    fn test_borrow_checks_health_against_balances() {
        let mut l = ledger();
        l.mint(&safe(), &usdc(), 100_000_000); // $100 → $90 power

        let dispatcher = Address::new("DISPATCHER");
        assert!(l.borrow(&safe(), &usdc(), 90_000_000, &dispatcher).is_ok());
        assert_eq!(l.balance_of(&dispatcher, &usdc()), 90_000_000);

        let err = l.borrow(&safe(), &usdc(), 1, &dispatcher).unwrap_err();
        assert!(matches!(err, LedgerError::AccountUnhealthy { .. }));
    }

    #[test]
    fn test_repay_requires_allowance() {
        let mut l = ledger();
        l.mint(&safe(), &usdc(), 100);
        l.set_debt(&safe(), &usdc(), 100);

        let ledger_address = l.address();
        let unapproved = l.execute(
            &safe(),
            &[Instruction::repay(ledger_address.clone(), usdc(), 40)],
        );
        assert!(matches!(unapproved, Err(ExecutionError::InsufficientAllowance { .. })));

        l.execute(
            &safe(),
            &[
                Instruction::approve(usdc(), ledger_address.clone(), 40),
                Instruction::repay(ledger_address, usdc(), 40),
            ],
        )
        .unwrap();
        assert_eq!(l.debt_of(&safe(), &usdc()), 60);
        assert_eq!(l.balance_of(&safe(), &usdc()), 60);
    }

    #[test]
    fn test_unknown_target_rejected() {
        let mut l = ledger();
        let result = l.execute(
            &safe(),
            &[Instruction::repay(Address::new("NOT_LEDGER"), usdc(), 1)],
        );
        assert_eq!(
            result,
            Err(ExecutionError::UnknownTarget(Address::new("NOT_LEDGER")))
        );
    }
}

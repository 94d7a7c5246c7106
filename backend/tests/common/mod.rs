// Shared fixtures for integration tests
//
// A world is one cash module plus an in-memory ledger with three tokens:
// - USDC: $1, 6 decimals, 80% LTV collateral, borrowable
// - USDT: $1, 6 decimals, not collateral, borrowable
// - WETH: $3000, 18 decimals, 50% LTV collateral, not borrowable

#![allow(dead_code)]

use safe_cash_core_rs::cash_module::{CashModule, CashModuleConfig};
use safe_cash_core_rs::ledger::{CollateralTokenConfig, InMemoryLedger, TokenListing};
use safe_cash_core_rs::core::USD_UNIT;
use safe_cash_core_rs::{Address, Clock, Timestamp, TxId};

pub const USD: u128 = USD_UNIT;

/// 2023-11-14 00:00:00 UTC
pub const T0: Timestamp = 1_699_920_000;

pub const DAY: u64 = 86_400;

pub fn usdc() -> Address {
    Address::new("USDC")
}

pub fn usdt() -> Address {
    Address::new("USDT")
}

pub fn weth() -> Address {
    Address::new("WETH")
}

pub fn controller() -> Address {
    Address::new("0xcontroller")
}

pub fn dispatcher() -> Address {
    Address::new("0xdispatcher")
}

pub fn recipient() -> Address {
    Address::new("0xrecipient")
}

pub fn debt_manager() -> Address {
    Address::new("0xdebt-manager")
}

/// `n` tenths of a WETH in base units
pub fn weth_tenths(n: u128) -> u128 {
    n * 100_000_000_000_000_000
}

pub fn tx(id: &str) -> TxId {
    TxId::new(id)
}

pub fn collateral(ltv: u64) -> Option<CollateralTokenConfig> {
    Some(CollateralTokenConfig {
        ltv,
        liquidation_threshold: ltv + 500,
        liquidation_bonus: 100,
    })
}

pub fn stable(collateral: Option<CollateralTokenConfig>) -> TokenListing {
    TokenListing {
        decimals: 6,
        price_usd: USD,
        collateral,
        borrowable: true,
    }
}

pub fn ledger() -> InMemoryLedger {
    let mut ledger = InMemoryLedger::new(debt_manager());
    ledger.list_token(usdc(), stable(collateral(8_000)));
    ledger.list_token(usdt(), stable(None));
    ledger.list_token(
        weth(),
        TokenListing {
            decimals: 18,
            price_usd: 3_000 * USD,
            collateral: collateral(5_000),
            borrowable: false,
        },
    );
    ledger.supply_liquidity(&usdc(), 1_000_000 * USD);
    ledger.supply_liquidity(&usdt(), 1_000_000 * USD);
    ledger
}

#[derive(Clone)]
pub struct World {
    pub module: CashModule,
    pub ledger: InMemoryLedger,
    pub safe: Address,
    /// Starts at `T0`, when the safe is set up
    pub clock: Clock,
}

impl World {
    /// Registered safe with a $1,000 daily / $10,000 monthly limit
    pub fn new(withdrawal_delay: u64, spend_limit_delay: u64, mode_delay: u64) -> Self {
        let mut module = CashModule::new(CashModuleConfig {
            controller: controller(),
            settlement_dispatcher: dispatcher(),
            withdrawal_delay,
            spend_limit_delay,
            mode_delay,
        })
        .unwrap();
        let safe = Address::new("0xsafe");
        module
            .setup_safe(&safe, 1_000 * USD, 10_000 * USD, 0, T0)
            .unwrap();

        Self {
            module,
            ledger: ledger(),
            safe,
            clock: Clock::new(T0),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn no_delays() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn fund(&mut self, token: &Address, amount: u128) {
        self.ledger.mint(&self.safe, token, amount);
    }

    pub fn balance(&self, holder: &Address, token: &Address) -> u128 {
        use safe_cash_core_rs::SafeAccounts;
        self.ledger.balance_of(holder, token)
    }

    pub fn safe_balance(&self, token: &Address) -> u128 {
        self.balance(&self.safe, token)
    }
}

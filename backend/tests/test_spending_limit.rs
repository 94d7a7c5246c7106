// Tests for spending limits as enforced through the cash module

mod common;

use common::*;
use proptest::prelude::*;
use safe_cash_core_rs::cash_module::{CashError, CashModule, CashModuleConfig};
use safe_cash_core_rs::models::{SpendingLimit, SpendingLimitError};
use safe_cash_core_rs::Address;

const LIMIT_DELAY: u64 = 3_600;

#[test]
fn test_lowered_limit_waits_for_delay() {
    let mut w = World::new(0, LIMIT_DELAY, 0);
    w.fund(&usdc(), 5_000 * USD);

    w.module
        .update_spending_limit(&w.safe, 100 * USD, 1_000 * USD, T0)
        .unwrap();

    // Old $1,000 daily limit still applies
    w.module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-1"),
            &usdc(),
            300 * USD,
            T0 + 10,
        )
        .unwrap();

    let err = w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-2"),
            &usdc(),
            10 * USD,
            T0 + LIMIT_DELAY,
        )
        .unwrap_err();
    assert_eq!(
        err,
        CashError::SpendingLimit(SpendingLimitError::DailyLimitExceeded {
            requested: 10 * USD,
            available: 0,
        })
    );

    let limit = w.module.get_data(&w.safe).unwrap().spending_limit();
    assert_eq!(
        limit.pending_update().map(|u| u.effective_time),
        Some(T0 + LIMIT_DELAY)
    );
}

#[test]
fn test_raised_limit_waits_for_delay_too() {
    let mut w = World::new(0, LIMIT_DELAY, 0);
    w.fund(&usdc(), 5_000 * USD);

    w.module
        .update_spending_limit(&w.safe, 2_000 * USD, 10_000 * USD, T0)
        .unwrap();
    assert!(w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-1"),
            &usdc(),
            1_500 * USD,
            T0 + 1,
        )
        .is_err());
    w.module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-2"),
            &usdc(),
            1_500 * USD,
            T0 + LIMIT_DELAY,
        )
        .unwrap();
}

#[test]
fn test_daily_above_monthly_rejected() {
    let mut w = World::no_delays();
    let err = w
        .module
        .update_spending_limit(&w.safe, 2_000 * USD, 1_000 * USD, T0)
        .unwrap_err();
    assert_eq!(
        err,
        CashError::SpendingLimit(SpendingLimitError::DailyLimitExceedsMonthly {
            daily: 2_000 * USD,
            monthly: 1_000 * USD,
        })
    );
    assert!(w
        .module
        .events()
        .events_of_type("SpendingLimitChanged")
        .is_empty());
}

#[test]
fn test_setup_validates_limits_and_timezone() {
    let mut module = CashModule::new(CashModuleConfig {
        controller: controller(),
        settlement_dispatcher: dispatcher(),
        withdrawal_delay: 0,
        spend_limit_delay: 0,
        mode_delay: 0,
    })
    .unwrap();
    let safe = Address::new("0xsafe");

    assert_eq!(
        module.setup_safe(&safe, 10, 5, 0, T0),
        Err(CashError::SpendingLimit(
            SpendingLimitError::DailyLimitExceedsMonthly {
                daily: 10,
                monthly: 5
            }
        ))
    );
    assert_eq!(
        module.setup_safe(&safe, 5, 10, 15 * 3_600, T0),
        Err(CashError::SpendingLimit(
            SpendingLimitError::InvalidTimezoneOffset(15 * 3_600)
        ))
    );
    assert_eq!(module.state().num_safes(), 0);
}

#[test]
fn test_monthly_limit_across_days() {
    let mut w = World::no_delays();
    w.fund(&usdc(), 20_000 * USD);

    for day in 0..10u64 {
        w.module
            .spend(
                &mut w.ledger,
                &w.safe,
                &tx(&format!("tx-{}", day)),
                &usdc(),
                1_000 * USD,
                T0 + day * DAY,
            )
            .unwrap();
    }

    // Still November: the monthly $10,000 is exhausted
    let err = w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-10"),
            &usdc(),
            USD,
            T0 + 10 * DAY,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CashError::SpendingLimit(SpendingLimitError::MonthlyLimitExceeded { .. })
    ));

    // 2023-12-01 00:00:00 UTC
    w.module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-11"),
            &usdc(),
            USD,
            1_701_388_800,
        )
        .unwrap();
}

#[test]
fn test_timezone_shifts_daily_boundary() {
    let mut module = CashModule::new(CashModuleConfig {
        controller: controller(),
        settlement_dispatcher: dispatcher(),
        withdrawal_delay: 0,
        spend_limit_delay: 0,
        mode_delay: 0,
    })
    .unwrap();
    let mut ledger = ledger();
    let safe = Address::new("0xsafe");
    ledger.mint(&safe, &usdc(), 1_000 * USD);

    // UTC+2: local midnight falls at 22:00 UTC
    module
        .setup_safe(&safe, 100 * USD, 1_000 * USD, 7_200, T0)
        .unwrap();
    module
        .spend(&mut ledger, &safe, &tx("tx-1"), &usdc(), 100 * USD, T0)
        .unwrap();

    let local_midnight = T0 + DAY - 7_200;
    assert!(module
        .spend(
            &mut ledger,
            &safe,
            &tx("tx-2"),
            &usdc(),
            USD,
            local_midnight - 1,
        )
        .is_err());
    module
        .spend(
            &mut ledger,
            &safe,
            &tx("tx-3"),
            &usdc(),
            USD,
            local_midnight,
        )
        .unwrap();
}

proptest! {
    #[test]
    fn prop_counters_renew_once_per_day(
        mut offsets in prop::collection::vec(0..DAY, 1..20),
        amounts in prop::collection::vec(1..=10 * USD, 20),
        next_day_amount in 1..=10 * USD,
    ) {
        offsets.sort_unstable();
        let mut limit = SpendingLimit::initialize(1_000 * USD, 10_000 * USD, 0, T0).unwrap();

        let mut total: u128 = 0;
        for (offset, amount) in offsets.iter().zip(&amounts) {
            limit.can_spend(*amount, T0 + offset).unwrap();
            limit.spend(*amount, T0 + offset).unwrap();
            total += amount;
        }
        prop_assert_eq!(limit.spent_today(), total);
        prop_assert_eq!(limit.daily_renewal_timestamp(), T0 + DAY);

        limit.spend(next_day_amount, T0 + DAY).unwrap();
        prop_assert_eq!(limit.spent_today(), next_day_amount);
        prop_assert_eq!(limit.spent_this_month(), total + next_day_amount);
        prop_assert_eq!(limit.daily_renewal_timestamp(), T0 + 2 * DAY);
    }
}

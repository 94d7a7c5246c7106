// Tests for Debit/Credit mode transitions
//
// A switch to Credit activates after the mode delay; the first mutating
// call at or after the activation time applies it.

mod common;

use common::*;
use safe_cash_core_rs::cash_module::{CashError, ErrorKind};
use safe_cash_core_rs::models::{Event, Mode};

const MODE_DELAY: u64 = 600;

#[test]
fn test_credit_activates_exactly_at_delay() {
    let mut w = World::new(0, 0, MODE_DELAY);
    w.fund(&usdc(), 100 * USD);

    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();
    assert_eq!(w.module.incoming_mode_start_time(&w.safe), T0 + MODE_DELAY);

    // One second early: still Debit, spends move the safe's own funds
    assert_eq!(
        w.module.get_mode(&w.safe, T0 + MODE_DELAY - 1).unwrap(),
        Mode::Debit
    );
    let receipt = w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-1"),
            &usdc(),
            10 * USD,
            T0 + MODE_DELAY - 1,
        )
        .unwrap();
    assert_eq!(receipt.mode, Mode::Debit);
    assert_eq!(w.safe_balance(&usdc()), 90 * USD);

    // At the boundary: Credit
    assert_eq!(
        w.module.get_mode(&w.safe, T0 + MODE_DELAY).unwrap(),
        Mode::Credit
    );
    let receipt = w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-2"),
            &usdc(),
            10 * USD,
            T0 + MODE_DELAY,
        )
        .unwrap();
    assert_eq!(receipt.mode, Mode::Credit);
    assert_eq!(w.safe_balance(&usdc()), 90 * USD);
    assert_eq!(w.ledger.debt_of(&w.safe, &usdc()), 10 * USD);
}

#[test]
fn test_stored_mode_changes_only_on_mutation() {
    let mut w = World::new(0, 0, MODE_DELAY);
    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();

    let later = T0 + 2 * MODE_DELAY;
    assert_eq!(w.module.get_mode(&w.safe, later).unwrap(), Mode::Credit);
    assert_eq!(
        w.module.get_data(&w.safe).unwrap().stored_mode(),
        Mode::Debit
    );

    w.module
        .update_spending_limit(&w.safe, 500 * USD, 5_000 * USD, later)
        .unwrap();
    let config = w.module.get_data(&w.safe).unwrap();
    assert_eq!(config.stored_mode(), Mode::Credit);
    assert_eq!(config.incoming_mode(), None);
    assert_eq!(config.incoming_mode_start_time(), 0);
}

#[test]
fn test_switch_to_debit_is_immediate() {
    let mut w = World::new(0, 0, MODE_DELAY);
    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();
    w.module
        .set_mode(&w.safe, Mode::Debit, T0 + MODE_DELAY)
        .unwrap();

    assert_eq!(
        w.module.get_mode(&w.safe, T0 + MODE_DELAY).unwrap(),
        Mode::Debit
    );
    assert_eq!(w.module.incoming_mode_start_time(&w.safe), 0);

    let modes: Vec<(Mode, u64)> = w
        .module
        .events()
        .events_of_type("ModeSet")
        .into_iter()
        .filter_map(|e| match e {
            Event::ModeSet {
                new_mode,
                effective_time,
                ..
            } => Some((*new_mode, *effective_time)),
            _ => None,
        })
        .collect();
    assert_eq!(
        modes,
        vec![(Mode::Credit, T0 + MODE_DELAY), (Mode::Debit, T0 + MODE_DELAY)]
    );
}

#[test]
fn test_debit_aborts_pending_credit() {
    let mut w = World::new(0, 0, MODE_DELAY);
    w.fund(&usdc(), 100 * USD);
    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();

    w.module.set_mode(&w.safe, Mode::Debit, T0 + 10).unwrap();
    assert_eq!(w.module.incoming_mode_start_time(&w.safe), 0);
    assert_eq!(
        w.module.get_mode(&w.safe, T0 + MODE_DELAY).unwrap(),
        Mode::Debit
    );

    let receipt = w
        .module
        .spend(
            &mut w.ledger,
            &w.safe,
            &tx("tx-1"),
            &usdc(),
            10 * USD,
            T0 + MODE_DELAY,
        )
        .unwrap();
    assert_eq!(receipt.mode, Mode::Debit);
    assert_eq!(w.safe_balance(&usdc()), 90 * USD);

    let mode_events = w.module.events().events_of_type("ModeSet");
    match mode_events.last() {
        Some(Event::ModeSet {
            previous_mode,
            new_mode,
            effective_time,
            ..
        }) => {
            assert_eq!(*previous_mode, Mode::Debit);
            assert_eq!(*new_mode, Mode::Debit);
            assert_eq!(*effective_time, T0 + 10);
        }
        other => panic!("expected ModeSet, got {:?}", other),
    }
}

#[test]
fn test_setting_current_mode_rejected() {
    let mut w = World::new(0, 0, MODE_DELAY);

    let err = w.module.set_mode(&w.safe, Mode::Debit, T0).unwrap_err();
    assert_eq!(err, CashError::ModeAlreadySet(Mode::Debit));
    assert_eq!(err.kind(), ErrorKind::ModeConflict);
    assert!(w.module.events().events_of_type("ModeSet").is_empty());
}

#[test]
fn test_rescheduling_credit_pushes_activation() {
    let mut w = World::new(0, 0, MODE_DELAY);
    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();
    w.module.set_mode(&w.safe, Mode::Credit, T0 + 100).unwrap();

    assert_eq!(
        w.module.incoming_mode_start_time(&w.safe),
        T0 + 100 + MODE_DELAY
    );
    assert_eq!(
        w.module.get_mode(&w.safe, T0 + MODE_DELAY).unwrap(),
        Mode::Debit
    );
}

#[test]
fn test_zero_delay_switches_immediately() {
    let mut w = World::no_delays();
    w.module.set_mode(&w.safe, Mode::Credit, T0).unwrap();
    assert_eq!(
        w.module.get_data(&w.safe).unwrap().stored_mode(),
        Mode::Credit
    );
}

//! Lock lifecycle scenarios driven through the service.

use veledger_core::constants::{EPOCH, TOKEN};
use veledger_core::error::{EscrowError, LedgerError};
use veledger_core::traits::BlockOracle;
use veledger_core::types::{Lock, LockState};
use veledger_tests::helpers::{account, tokens, Harness, GENESIS};

// ------------------------------------------------------------------
// Decay
// ------------------------------------------------------------------

#[test]
fn two_epoch_lock_decays_to_half_then_zero() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(1_000));
    h.service.create_lock(a, tokens(1_000), GENESIS + 2 * EPOCH).unwrap();

    // Floor division: slope magnitude is amount / duration rounded down.
    let slope = tokens(1_000) / u128::from(2 * EPOCH);
    assert!(slope > 0);

    h.chain.advance(EPOCH);
    let half = h.service.balance_of(&a).unwrap();
    assert_eq!(half, slope * u128::from(EPOCH));
    assert!(half <= 500 * TOKEN);
    assert!(500 * TOKEN - half < u128::from(EPOCH));

    h.chain.advance(EPOCH);
    assert_eq!(h.service.balance_of(&a).unwrap(), 0);
    assert_eq!(h.service.total_supply().unwrap(), 0);
    assert_eq!(h.service.lock_state(&a), LockState::Expired);
}

#[test]
fn identical_locks_track_each_other_until_expiry() {
    let h = Harness::default();
    let (a, b) = (account(0), account(1));
    h.fund(&[a, b], tokens(500));
    h.service.create_lock(a, tokens(500), GENESIS + 3 * EPOCH).unwrap();
    h.service.create_lock(b, tokens(500), GENESIS + 3 * EPOCH).unwrap();

    let mut blocks = vec![h.chain.current_block()];
    for _ in 0..30 {
        blocks.push(h.chain.advance(EPOCH / 9));
    }

    for block in blocks {
        let ba = h.service.balance_of_at(&a, block).unwrap();
        let bb = h.service.balance_of_at(&b, block).unwrap();
        assert_eq!(ba, bb, "block {block}");
        assert_eq!(h.service.total_supply_at(block).unwrap(), ba + bb, "block {block}");
    }
}

#[test]
fn balance_never_increases_without_mutation() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(77));
    h.service.create_lock(a, tokens(77), GENESIS + 10 * EPOCH).unwrap();

    let mut previous = h.service.balance_of(&a).unwrap();
    for _ in 0..25 {
        h.chain.advance(EPOCH / 2);
        let current = h.service.balance_of(&a).unwrap();
        assert!(current <= previous);
        previous = current;
    }
    assert_eq!(previous, 0);
}

// ------------------------------------------------------------------
// Mutations
// ------------------------------------------------------------------

#[test]
fn increase_amount_by_zero_is_rejected() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(10));
    h.service.create_lock(a, tokens(10), GENESIS + 2 * EPOCH).unwrap();
    let before = h.service.balance_of(&a).unwrap();

    let err = h.service.increase_amount(a, 0).unwrap_err();
    assert!(matches!(err, LedgerError::Escrow(EscrowError::ZeroAmount)));
    assert_eq!(h.service.balance_of(&a).unwrap(), before);
    assert_eq!(h.service.read(|e| e.user_point_epoch(&a)), 1);
}

#[test]
fn extension_raises_balance_and_moves_expiry() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(100));
    h.service.create_lock(a, tokens(100), GENESIS + 2 * EPOCH).unwrap();
    let block_before = h.chain.advance(EPOCH);
    let before = h.service.balance_of(&a).unwrap();

    h.chain.mine();
    h.service.increase_unlock_time(a, GENESIS + 20 * EPOCH).unwrap();
    assert!(h.service.balance_of(&a).unwrap() > before);

    // History stays put.
    assert_eq!(h.service.balance_of_at(&a, block_before).unwrap(), before);

    h.chain.advance_to(GENESIS + 2 * EPOCH);
    assert!(h.service.balance_of(&a).unwrap() > 0);
    h.chain.advance_to(GENESIS + 20 * EPOCH);
    assert_eq!(h.service.balance_of(&a).unwrap(), 0);
}

#[test]
fn unlock_time_cannot_move_backwards() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(1));
    h.service.create_lock(a, tokens(1), GENESIS + 10 * EPOCH).unwrap();
    let err = h.service.increase_unlock_time(a, GENESIS + 5 * EPOCH).unwrap_err();
    assert!(matches!(err, LedgerError::Escrow(EscrowError::InvalidLockModification(_))));
}

#[test]
fn withdraw_round_trip_leaves_others_untouched() {
    let h = Harness::default();
    let (a, b) = (account(0), account(1));
    h.fund(&[a, b], tokens(100));
    h.service.create_lock(a, tokens(40), GENESIS + EPOCH).unwrap();
    h.service.create_lock(b, tokens(60), GENESIS + 8 * EPOCH).unwrap();
    let probe = h.chain.advance(EPOCH / 2);
    let b_at_probe = h.service.balance_of_at(&b, probe).unwrap();

    h.chain.advance_to(GENESIS + EPOCH);
    assert_eq!(h.service.withdraw(a).unwrap(), tokens(40));

    assert_eq!(h.service.balance_of(&a).unwrap(), 0);
    assert_eq!(h.service.locked(&a), Lock::EMPTY);
    assert_eq!(h.custody.balance(&a), tokens(100));
    assert_eq!(h.service.balance_of_at(&b, probe).unwrap(), b_at_probe);
    assert_eq!(h.service.total_supply().unwrap(), h.service.balance_of(&b).unwrap());
    assert_eq!(h.service.total_locked(), tokens(60));
}

#[test]
fn relock_after_expiry_without_withdraw() {
    let h = Harness::default();
    let a = account(0);
    h.fund(&[a], tokens(30));
    h.service.create_lock(a, tokens(20), GENESIS + EPOCH).unwrap();
    h.chain.advance_to(GENESIS + 3 * EPOCH);

    let event = h.service.create_lock(a, tokens(10), GENESIS + 6 * EPOCH).unwrap();
    assert_eq!(event.lock.amount, tokens(30));
    assert_eq!(event.transferred, tokens(10));
    assert_eq!(h.custody.held(), tokens(30));
    assert_eq!(h.service.total_supply().unwrap(), h.service.balance_of(&a).unwrap());
}

#[test]
fn early_withdraw_then_expiry() {
    let h = Harness::with_early_withdraw();
    let (a, b) = (account(0), account(1));
    h.fund(&[a, b], tokens(100));
    h.service.create_lock(a, tokens(100), GENESIS + 4 * EPOCH).unwrap();
    h.service.create_lock(b, tokens(100), GENESIS + 4 * EPOCH).unwrap();
    h.chain.advance(EPOCH);

    assert_eq!(h.service.early_withdraw(a, tokens(25)).unwrap(), tokens(25));
    assert!(h.service.balance_of(&a).unwrap() < h.service.balance_of(&b).unwrap());
    let total = h.service.total_supply().unwrap();
    assert_eq!(total, h.service.balance_of(&a).unwrap() + h.service.balance_of(&b).unwrap());

    h.chain.advance_to(GENESIS + 4 * EPOCH);
    let err = h.service.early_withdraw(a, tokens(1)).unwrap_err();
    assert!(matches!(err, LedgerError::Escrow(EscrowError::LockExpired { .. })));
    assert_eq!(h.service.withdraw(a).unwrap(), tokens(75));
    assert_eq!(h.custody.balance(&a), tokens(100));
}

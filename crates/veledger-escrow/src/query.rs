//! Read-only queries over the engine.
//!
//! A balance at time `t` is the bounding checkpoint at or before `t`
//! carried forward through the matching schedule. Nothing here mutates
//! state or depends on how recently the engine was written to.

use veledger_core::error::EscrowError;
use veledger_core::params::EscrowParams;
use veledger_core::traits::BlockOracle;
use veledger_core::types::{AccountId, Lock, LockState, Point, Timestamp};

use crate::history::PointHistory;
use crate::ledger::Engine;
use crate::schedule::ScheduleStore;

/// Evaluate a curve at `target`, starting from the given bounding checkpoint.
fn evaluate(schedule: &ScheduleStore, point: Point, target: Timestamp) -> Result<u128, EscrowError> {
    if point.is_zero() {
        return Ok(0);
    }
    let (bias, _) = schedule.extrapolate(&point, target)?;
    Ok(bias.max(0).unsigned_abs())
}

/// Timestamp of `block`, rejecting blocks the oracle has not produced yet.
fn block_timestamp(oracle: &dyn BlockOracle, block: u64) -> Result<Timestamp, EscrowError> {
    let current = oracle.current_block();
    if block > current {
        return Err(EscrowError::BlockInFuture { block, current });
    }
    oracle.timestamp_of_block(block).ok_or(EscrowError::UnknownBlock(block))
}

impl Engine {
    // --- balances ---

    /// Voting power of `account` at time `t`.
    pub fn balance_of(&self, account: &AccountId, t: Timestamp) -> Result<u128, EscrowError> {
        let Some(history) = self.account_histories.get(account) else {
            return Ok(0);
        };
        evaluate(self.account_schedule(account), history.find_by_timestamp(t), t)
    }

    /// Voting power of `account` as of `block`.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::BlockInFuture`] if `block` is after the oracle's current block
    /// - [`EscrowError::UnknownBlock`] if the oracle has no timestamp for `block`
    pub fn balance_of_at(
        &self,
        account: &AccountId,
        block: u64,
        oracle: &dyn BlockOracle,
    ) -> Result<u128, EscrowError> {
        let ts = block_timestamp(oracle, block)?;
        let Some(history) = self.account_histories.get(account) else {
            return Ok(0);
        };
        evaluate(self.account_schedule(account), history.find_by_block(block), ts)
    }

    /// Total voting power at time `t`.
    pub fn total_supply(&self, t: Timestamp) -> Result<u128, EscrowError> {
        evaluate(&self.global_schedule, self.global_history.find_by_timestamp(t), t)
    }

    /// Total voting power as of `block`. Same errors as [`balance_of_at`](Self::balance_of_at).
    pub fn total_supply_at(&self, block: u64, oracle: &dyn BlockOracle) -> Result<u128, EscrowError> {
        let ts = block_timestamp(oracle, block)?;
        evaluate(&self.global_schedule, self.global_history.find_by_block(block), ts)
    }

    fn account_schedule(&self, account: &AccountId) -> &ScheduleStore {
        static EMPTY: ScheduleStore = ScheduleStore::new();
        self.account_schedules.get(account).unwrap_or(&EMPTY)
    }

    // --- introspection ---

    pub fn params(&self) -> &EscrowParams {
        &self.params
    }

    /// The account's lock, [`Lock::EMPTY`] if none.
    pub fn locked(&self, account: &AccountId) -> Lock {
        self.locks.get(account).copied().unwrap_or(Lock::EMPTY)
    }

    pub fn lock_state(&self, account: &AccountId, now: Timestamp) -> LockState {
        self.locked(account).state(now)
    }

    /// Number of checkpoints recorded for `account`.
    pub fn user_point_epoch(&self, account: &AccountId) -> usize {
        self.account_histories.get(account).map_or(0, PointHistory::epoch)
    }

    /// The account's checkpoint at `epoch` (1-based; 0 is the zero point).
    pub fn user_point_history(&self, account: &AccountId, epoch: usize) -> Option<Point> {
        match self.account_histories.get(account) {
            Some(history) => history.get(epoch),
            None if epoch == 0 => Some(Point::ZERO),
            None => None,
        }
    }

    /// Number of global checkpoints.
    pub fn epoch(&self) -> usize {
        self.global_history.epoch()
    }

    pub fn point_history(&self, epoch: usize) -> Option<Point> {
        self.global_history.get(epoch)
    }

    /// Sum of all locked amounts, expired-but-unwithdrawn included.
    pub fn total_locked(&self) -> u128 {
        self.total_locked
    }

    /// Every account with at least one checkpoint, sorted.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<_> = self.account_histories.keys().copied().collect();
        accounts.sort();
        accounts
    }

    /// Scheduled global slope change at `boundary`.
    pub fn global_slope_change(&self, boundary: Timestamp) -> i128 {
        self.global_schedule.slope_change(boundary)
    }

    /// Scheduled slope change at `boundary` for `account`.
    pub fn account_slope_change(&self, account: &AccountId, boundary: Timestamp) -> i128 {
        self.account_schedule(account).slope_change(boundary)
    }
}

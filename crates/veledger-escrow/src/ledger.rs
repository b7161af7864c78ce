//! The lock ledger: per-account locks and the curves they feed.
//!
//! Every mutation is two-phase. A `plan_*` method validates the request and
//! computes the complete [`Transition`] against `&self`; [`Engine::commit`]
//! applies it. Planning never touches state, and committing cannot fail
//! halfway: all arithmetic has already been done. Callers that perform a
//! side effect between the two (an asset transfer) hold a lock across
//! plan and commit so the transition cannot go stale; if it does,
//! [`commit`](Engine::commit) rejects it with [`EscrowError::StaleTransition`].
//!
//! The plain mutators ([`create_lock`](Engine::create_lock) and friends) are
//! plan followed immediately by commit.

use std::collections::HashMap;

use tracing::debug;

use veledger_core::error::{ConfigError, EscrowError};
use veledger_core::math::round_to_epoch;
use veledger_core::params::EscrowParams;
use veledger_core::types::{AccountId, CheckpointEvent, Lock, LockAction, Timestamp};

use crate::checkpoint::{plan_checkpoint, Checkpoint, CheckpointRequest, Curves};
use crate::history::PointHistory;
use crate::schedule::ScheduleStore;

/// A validated, fully computed lock mutation awaiting [`Engine::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    account: AccountId,
    action: LockAction,
    old_lock: Lock,
    new_lock: Lock,
    checkpoint: Checkpoint,
    /// Amount the caller must pull into custody before committing.
    deposit: u128,
    /// Amount the caller must pay out after committing.
    payout: u128,
    total_locked: u128,
    base_epoch: usize,
}

impl Transition {
    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn action(&self) -> LockAction {
        self.action
    }

    pub fn old_lock(&self) -> Lock {
        self.old_lock
    }

    /// The lock as it will be stored after commit.
    pub fn new_lock(&self) -> Lock {
        self.new_lock
    }

    pub fn deposit(&self) -> u128 {
        self.deposit
    }

    pub fn payout(&self) -> u128 {
        self.payout
    }

    pub fn timestamp(&self) -> Timestamp {
        self.checkpoint.account_point.timestamp
    }

    pub fn block(&self) -> u64 {
        self.checkpoint.account_point.block
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// The event published once this transition is committed.
    pub fn event(&self) -> CheckpointEvent {
        CheckpointEvent {
            account: self.account,
            action: self.action,
            old_bias: self.checkpoint.old_bias,
            new_bias: self.checkpoint.new_bias,
            old_slope: self.checkpoint.old_slope,
            new_slope: self.checkpoint.new_slope,
            timestamp: self.timestamp(),
            block: self.block(),
            lock: self.new_lock,
            transferred: self.deposit.max(self.payout),
        }
    }
}

/// Vote-escrow engine state.
///
/// Owns every lock, every account's point history and schedule, and the
/// global point history and schedule. Not internally synchronized; wrap it
/// in a lock to share it (see `veledger-node`).
#[derive(Debug, Clone)]
pub struct Engine {
    pub(crate) params: EscrowParams,
    pub(crate) locks: HashMap<AccountId, Lock>,
    pub(crate) account_histories: HashMap<AccountId, PointHistory>,
    pub(crate) account_schedules: HashMap<AccountId, ScheduleStore>,
    pub(crate) global_history: PointHistory,
    pub(crate) global_schedule: ScheduleStore,
    pub(crate) total_locked: u128,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_valid_params(EscrowParams::default())
    }
}

impl Engine {
    /// Create an empty engine.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] if `params` fail validation.
    pub fn new(params: EscrowParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self::with_valid_params(params))
    }

    /// Empty engine with the default protocol parameters.
    pub fn with_defaults() -> Self {
        Self::default()
    }

    fn with_valid_params(params: EscrowParams) -> Self {
        Self {
            params,
            locks: HashMap::new(),
            account_histories: HashMap::new(),
            account_schedules: HashMap::new(),
            global_history: PointHistory::new(),
            global_schedule: ScheduleStore::new(),
            total_locked: 0,
        }
    }

    // --- planning ---

    /// Plan a new lock of `amount` until `end` (rounded down to the epoch).
    ///
    /// An expired lock that was never withdrawn is rolled into the new one:
    /// its amount stays in custody and only `amount` is deposited.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::AlreadyLocked`] if the account holds an active lock
    /// - [`EscrowError::ZeroAmount`] if `amount` is zero
    /// - [`EscrowError::LockDurationOutOfRange`] if the rounded end is too near or too far
    /// - [`EscrowError::AmountTooLarge`] if the resulting lock exceeds the per-account limit
    pub fn plan_create_lock(
        &self,
        account: AccountId,
        amount: u128,
        end: Timestamp,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        let old_lock = self.locked(&account);
        if old_lock.is_active(now) {
            return Err(EscrowError::AlreadyLocked);
        }
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        let end = self.validate_end(end, now)?;
        let total = self.checked_lock_amount(old_lock.amount, amount)?;

        let new_lock = Lock { amount: total, end, start: now };
        self.plan(account, LockAction::CreateLock, old_lock, new_lock, amount, 0, now, block)
    }

    /// Plan adding `extra` to an active lock. The end is unchanged.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::ZeroAmount`] if `extra` is zero
    /// - [`EscrowError::NoActiveLock`] / [`EscrowError::LockExpired`] without an active lock
    /// - [`EscrowError::AmountTooLarge`] if the resulting lock exceeds the per-account limit
    pub fn plan_increase_amount(
        &self,
        account: AccountId,
        extra: u128,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        if extra == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        let old_lock = self.active_lock(&account, now)?;
        let total = self.checked_lock_amount(old_lock.amount, extra)?;

        let new_lock = Lock { amount: total, end: old_lock.end, start: now };
        self.plan(account, LockAction::IncreaseAmount, old_lock, new_lock, extra, 0, now, block)
    }

    /// Plan moving an active lock's end to `new_end` (rounded down to the epoch).
    ///
    /// # Errors
    ///
    /// - [`EscrowError::NoActiveLock`] / [`EscrowError::LockExpired`] without an active lock
    /// - [`EscrowError::InvalidLockModification`] if the rounded end is not later than the current end
    /// - [`EscrowError::LockDurationOutOfRange`] if the rounded end is beyond the maximum duration
    pub fn plan_increase_unlock_time(
        &self,
        account: AccountId,
        new_end: Timestamp,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        let old_lock = self.active_lock(&account, now)?;
        let rounded = round_to_epoch(new_end, self.params.epoch);
        if rounded <= old_lock.end {
            return Err(EscrowError::InvalidLockModification(format!(
                "new end {rounded} does not extend current end {}",
                old_lock.end
            )));
        }
        let end = self.validate_end(new_end, now)?;

        let new_lock = Lock { amount: old_lock.amount, end, start: now };
        self.plan(account, LockAction::IncreaseUnlockTime, old_lock, new_lock, 0, 0, now, block)
    }

    /// Plan releasing an expired lock in full.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::NoActiveLock`] if the account holds nothing
    /// - [`EscrowError::LockNotExpired`] if `now` is before the lock's end
    pub fn plan_withdraw(
        &self,
        account: AccountId,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        let old_lock = self.locked(&account);
        if old_lock.is_empty() {
            return Err(EscrowError::NoActiveLock);
        }
        if now < old_lock.end {
            return Err(EscrowError::LockNotExpired { end: old_lock.end, now });
        }
        self.plan(account, LockAction::Withdraw, old_lock, Lock::EMPTY, 0, old_lock.amount, now, block)
    }

    /// Plan releasing `amount` from an active lock before its end.
    ///
    /// The remainder keeps its end and its line is re-based at `now`.
    /// Releasing everything clears the lock. Penalties are the caller's
    /// business: the full `amount` is returned for payout.
    ///
    /// # Errors
    ///
    /// - [`EscrowError::EarlyWithdrawDisabled`] unless enabled in the parameters
    /// - [`EscrowError::ZeroAmount`] if `amount` is zero
    /// - [`EscrowError::NoActiveLock`] / [`EscrowError::LockExpired`] without an active lock
    /// - [`EscrowError::InsufficientLockedAmount`] if `amount` exceeds the locked amount
    pub fn plan_early_withdraw(
        &self,
        account: AccountId,
        amount: u128,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        if !self.params.early_withdraw_enabled {
            return Err(EscrowError::EarlyWithdrawDisabled);
        }
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        let old_lock = self.active_lock(&account, now)?;
        if amount > old_lock.amount {
            return Err(EscrowError::InsufficientLockedAmount {
                locked: old_lock.amount,
                requested: amount,
            });
        }

        let remaining = old_lock.amount - amount;
        let new_lock = if remaining == 0 {
            Lock::EMPTY
        } else {
            Lock { amount: remaining, end: old_lock.end, start: now }
        };
        self.plan(account, LockAction::EarlyWithdraw, old_lock, new_lock, 0, amount, now, block)
    }

    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        account: AccountId,
        action: LockAction,
        old_lock: Lock,
        new_lock: Lock,
        deposit: u128,
        payout: u128,
        now: Timestamp,
        block: u64,
    ) -> Result<Transition, EscrowError> {
        let curves = Curves {
            account_history: self.account_histories.get(&account),
            account_schedule: self.account_schedules.get(&account),
            global_history: &self.global_history,
            global_schedule: &self.global_schedule,
        };
        let checkpoint = plan_checkpoint(
            curves,
            CheckpointRequest { account, old_lock, new_lock, now, block },
        )?;

        let total_locked = self
            .total_locked
            .checked_add(deposit)
            .and_then(|t| t.checked_sub(payout))
            .ok_or(EscrowError::ArithmeticOverflow)?;

        Ok(Transition {
            account,
            action,
            old_lock,
            new_lock,
            checkpoint,
            deposit,
            payout,
            total_locked,
            base_epoch: self.global_history.epoch(),
        })
    }

    /// Round `end` down to the epoch and check it against the duration bounds.
    fn validate_end(&self, end: Timestamp, now: Timestamp) -> Result<Timestamp, EscrowError> {
        let rounded = round_to_epoch(end, self.params.epoch);
        let out_of_range = || EscrowError::LockDurationOutOfRange {
            end: rounded,
            now,
            min: self.params.min_lock_duration,
            max: self.params.max_lock_duration,
        };
        let earliest = now.checked_add(self.params.min_lock_duration).ok_or_else(out_of_range)?;
        let latest = now.saturating_add(self.params.max_lock_duration);
        if rounded < earliest || rounded > latest {
            return Err(out_of_range());
        }
        Ok(rounded)
    }

    fn checked_lock_amount(&self, current: u128, extra: u128) -> Result<u128, EscrowError> {
        let total = current.checked_add(extra).ok_or(EscrowError::ArithmeticOverflow)?;
        let max = self.params.max_lock_amount();
        if total > max {
            return Err(EscrowError::AmountTooLarge { amount: total, max });
        }
        Ok(total)
    }

    fn active_lock(&self, account: &AccountId, now: Timestamp) -> Result<Lock, EscrowError> {
        let lock = self.locked(account);
        if lock.is_empty() {
            return Err(EscrowError::NoActiveLock);
        }
        if !lock.is_active(now) {
            return Err(EscrowError::LockExpired { end: lock.end });
        }
        Ok(lock)
    }

    // --- commit ---

    /// Apply a planned transition.
    ///
    /// # Errors
    ///
    /// [`EscrowError::StaleTransition`] if any other transition was committed
    /// since this one was planned. State is unchanged in that case.
    pub fn commit(&mut self, transition: Transition) -> Result<CheckpointEvent, EscrowError> {
        let current = self.global_history.epoch();
        if transition.base_epoch != current {
            return Err(EscrowError::StaleTransition { planned: transition.base_epoch, current });
        }
        let event = transition.event();
        let Transition { account, new_lock, checkpoint, total_locked, .. } = transition;

        let account_epoch = self
            .account_histories
            .entry(account)
            .or_default()
            .push(checkpoint.account_point);
        let global_epoch = self.global_history.push(checkpoint.global_point);

        let schedule = self.account_schedules.entry(account).or_default();
        for (boundary, value) in checkpoint.account_schedule {
            schedule.set(boundary, value);
        }
        for (boundary, value) in checkpoint.global_schedule {
            self.global_schedule.set(boundary, value);
        }

        if new_lock.is_empty() {
            self.locks.remove(&account);
        } else {
            self.locks.insert(account, new_lock);
        }
        self.total_locked = total_locked;

        debug!(
            %account,
            action = %event.action,
            account_epoch,
            global_epoch,
            old_bias = %event.old_bias,
            new_bias = %event.new_bias,
            old_slope = %event.old_slope,
            new_slope = %event.new_slope,
            "committed checkpoint"
        );
        Ok(event)
    }

    // --- plan + commit ---

    pub fn create_lock(
        &mut self,
        account: AccountId,
        amount: u128,
        end: Timestamp,
        now: Timestamp,
        block: u64,
    ) -> Result<CheckpointEvent, EscrowError> {
        let transition = self.plan_create_lock(account, amount, end, now, block)?;
        self.commit(transition)
    }

    pub fn increase_amount(
        &mut self,
        account: AccountId,
        extra: u128,
        now: Timestamp,
        block: u64,
    ) -> Result<CheckpointEvent, EscrowError> {
        let transition = self.plan_increase_amount(account, extra, now, block)?;
        self.commit(transition)
    }

    pub fn increase_unlock_time(
        &mut self,
        account: AccountId,
        new_end: Timestamp,
        now: Timestamp,
        block: u64,
    ) -> Result<CheckpointEvent, EscrowError> {
        let transition = self.plan_increase_unlock_time(account, new_end, now, block)?;
        self.commit(transition)
    }

    /// Release an expired lock. Returns the amount to pay out.
    pub fn withdraw(&mut self, account: AccountId, now: Timestamp, block: u64) -> Result<u128, EscrowError> {
        let transition = self.plan_withdraw(account, now, block)?;
        let amount = transition.payout();
        self.commit(transition)?;
        Ok(amount)
    }

    /// Release part or all of an active lock. Returns the amount to pay out.
    pub fn early_withdraw(
        &mut self,
        account: AccountId,
        amount: u128,
        now: Timestamp,
        block: u64,
    ) -> Result<u128, EscrowError> {
        let transition = self.plan_early_withdraw(account, amount, now, block)?;
        let amount = transition.payout();
        self.commit(transition)?;
        Ok(amount)
    }
}

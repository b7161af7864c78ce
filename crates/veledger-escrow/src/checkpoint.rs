//! Checkpoint computation: the decay invariant enforcer.
//!
//! Given an account's lock before and after a mutation, [`plan_checkpoint`]
//! computes, without touching any state:
//!
//! 1. the account's current (decayed) bias and slope under the old lock,
//! 2. the bias and slope of the new lock's line starting at `now`,
//! 3. the new account checkpoint,
//! 4. the global curve decayed to `now` with the account's delta folded in,
//! 5. the resulting values of every schedule entry the mutation touches.
//!
//! Every new line satisfies `bias == -slope * (end - now)`, so it reaches zero
//! exactly at `end`, where its scheduled slope change cancels it. The global
//! curve is therefore the exact sum of all account curves at every instant,
//! not only at checkpoint times.
//!
//! Only entries strictly after `now` are modified. Entries at or before `now`
//! have already been crossed by the global curve and are replayed by
//! historical queries, so they must not change.

use std::collections::BTreeMap;

use veledger_core::error::EscrowError;
use veledger_core::math::{bias_until, checked_add, checked_sub, compute_slope};
use veledger_core::types::{AccountId, Lock, Point, Timestamp};

use crate::history::PointHistory;
use crate::schedule::ScheduleStore;

/// Read-only view of the curves a checkpoint folds into.
#[derive(Clone, Copy)]
pub struct Curves<'a> {
    pub account_history: Option<&'a PointHistory>,
    pub account_schedule: Option<&'a ScheduleStore>,
    pub global_history: &'a PointHistory,
    pub global_schedule: &'a ScheduleStore,
}

/// A lock change to checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointRequest {
    pub account: AccountId,
    pub old_lock: Lock,
    pub new_lock: Lock,
    pub now: Timestamp,
    pub block: u64,
}

/// Everything a checkpoint writes, precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub old_bias: i128,
    pub old_slope: i128,
    pub new_bias: i128,
    pub new_slope: i128,
    pub account_point: Point,
    pub global_point: Point,
    /// Resulting values `(boundary, value)` for the account's schedule.
    pub account_schedule: Vec<(Timestamp, i128)>,
    /// Resulting values `(boundary, value)` for the global schedule.
    pub global_schedule: Vec<(Timestamp, i128)>,
}

/// Current bias and slope of an account's line under `lock`.
///
/// Replays the account's latest checkpoint forward through its own schedule.
/// An inactive lock (empty or expired) contributes nothing.
pub fn account_line(
    lock: &Lock,
    history: Option<&PointHistory>,
    schedule: Option<&ScheduleStore>,
    now: Timestamp,
) -> Result<(i128, i128), EscrowError> {
    if !lock.is_active(now) {
        return Ok((0, 0));
    }
    let Some(history) = history else {
        return Ok((0, 0));
    };
    let last = history.latest();
    match schedule {
        Some(schedule) => schedule.extrapolate(&last, now),
        None => ScheduleStore::new().extrapolate(&last, now),
    }
}

/// Bias and slope of a fresh line for `lock` starting at `now`.
pub fn lock_line(lock: &Lock, now: Timestamp) -> Result<(i128, i128), EscrowError> {
    if !lock.is_active(now) {
        return Ok((0, 0));
    }
    let slope = compute_slope(lock.amount, lock.end - now)?;
    let bias = bias_until(slope, lock.end, now)?;
    Ok((bias, slope))
}

/// Compute a checkpoint for `request` against `curves`.
///
/// # Errors
///
/// - [`EscrowError::NonMonotonicCheckpoint`] if `now`/`block` precede the
///   latest global or account checkpoint
/// - [`EscrowError::ArithmeticOverflow`] if any intermediate value overflows
/// - [`EscrowError::GlobalCurveDrift`] if folding the account's delta would
///   push the global bias below zero or its slope above zero
pub fn plan_checkpoint(curves: Curves<'_>, request: CheckpointRequest) -> Result<Checkpoint, EscrowError> {
    let CheckpointRequest { old_lock, new_lock, now, block, .. } = request;

    curves.global_history.check_next(now, block)?;
    if let Some(history) = curves.account_history {
        history.check_next(now, block)?;
    }

    let (old_bias, old_slope) =
        account_line(&old_lock, curves.account_history, curves.account_schedule, now)?;
    let (new_bias, new_slope) = lock_line(&new_lock, now)?;

    let delta_bias = checked_sub(new_bias, old_bias)?;
    let delta_slope = checked_sub(new_slope, old_slope)?;

    let account_point = Point { bias: new_bias, slope: new_slope, timestamp: now, block };

    let (global_bias, global_slope) = curves
        .global_schedule
        .extrapolate(&curves.global_history.latest(), now)?;
    let bias = checked_add(global_bias, delta_bias)?;
    let slope = checked_add(global_slope, delta_slope)?;
    // The global curve is the sum of the account curves, so it can never
    // leave the decaying half-plane.
    if bias < 0 || slope > 0 {
        return Err(EscrowError::GlobalCurveDrift { bias, slope });
    }
    let global_point = Point { bias, slope, timestamp: now, block };

    // Cancel the old expiry and schedule the new one. When both land on the
    // same boundary the two deltas merge into one entry.
    let mut deltas: BTreeMap<Timestamp, i128> = BTreeMap::new();
    if old_lock.is_active(now) {
        let d = deltas.entry(old_lock.end).or_default();
        *d = checked_add(*d, old_slope)?;
    }
    if new_lock.is_active(now) {
        let d = deltas.entry(new_lock.end).or_default();
        *d = checked_sub(*d, new_slope)?;
    }

    let empty = ScheduleStore::new();
    let account_schedule_view = curves.account_schedule.unwrap_or(&empty);
    let mut account_schedule = Vec::with_capacity(deltas.len());
    let mut global_schedule = Vec::with_capacity(deltas.len());
    for (&boundary, &delta) in &deltas {
        account_schedule.push((boundary, account_schedule_view.accumulated(boundary, delta)?));
        global_schedule.push((boundary, curves.global_schedule.accumulated(boundary, delta)?));
    }

    Ok(Checkpoint {
        old_bias,
        old_slope,
        new_bias,
        new_slope,
        account_point,
        global_point,
        account_schedule,
        global_schedule,
    })
}

//! Scheduled slope changes at epoch boundaries.
//!
//! A [`ScheduleStore`] maps a boundary timestamp to the signed amount added
//! to the running slope when a decay line is extrapolated across it. Locks
//! expiring at the same boundary accumulate into one entry. Entries are read
//! during extrapolation, never removed: entries at or before the latest
//! checkpoint are history that past queries replay.

use std::collections::BTreeMap;
use std::ops::Bound;

use veledger_core::error::EscrowError;
use veledger_core::math::{checked_add, compute_bias};
use veledger_core::types::{Point, Timestamp};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleStore {
    changes: BTreeMap<Timestamp, i128>,
}

impl ScheduleStore {
    pub const fn new() -> Self {
        Self { changes: BTreeMap::new() }
    }

    /// Accumulate `delta` into the entry at `boundary`, creating it if absent.
    ///
    /// # Errors
    ///
    /// [`EscrowError::ArithmeticOverflow`] if the accumulated value does not
    /// fit; the store is left unchanged.
    pub fn add_slope_change(&mut self, boundary: Timestamp, delta: i128) -> Result<(), EscrowError> {
        let value = self.accumulated(boundary, delta)?;
        self.changes.insert(boundary, value);
        Ok(())
    }

    /// Scheduled change at `boundary`, zero if nothing is scheduled.
    pub fn slope_change(&self, boundary: Timestamp) -> i128 {
        self.changes.get(&boundary).copied().unwrap_or(0)
    }

    /// Value the entry at `boundary` would hold after adding `delta`.
    pub(crate) fn accumulated(&self, boundary: Timestamp, delta: i128) -> Result<i128, EscrowError> {
        checked_add(self.slope_change(boundary), delta)
    }

    /// Overwrite an entry with a value computed by [`accumulated`](Self::accumulated).
    pub(crate) fn set(&mut self, boundary: Timestamp, value: i128) {
        self.changes.insert(boundary, value);
    }

    /// Entries with `after < boundary <= until`, in boundary order.
    pub fn changes_between(
        &self,
        after: Timestamp,
        until: Timestamp,
    ) -> impl Iterator<Item = (Timestamp, i128)> + '_ {
        let until = until.max(after);
        self.changes
            .range((Bound::Excluded(after), Bound::Included(until)))
            .map(|(t, d)| (*t, *d))
    }

    /// Number of distinct boundaries with an entry.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Carry a checkpoint forward to `target`, applying every scheduled change
    /// crossed on the way.
    ///
    /// Returns `(bias, slope)` at `target`. Bias is clamped at zero and slope
    /// at zero from above after every segment. The walk visits only boundaries
    /// that carry an entry, so its cost is bounded by the number of distinct
    /// expiries between the checkpoint and `target`, not by the number of
    /// accounts. A `target` before the checkpoint returns the checkpoint as is.
    pub fn extrapolate(&self, from: &Point, target: Timestamp) -> Result<(i128, i128), EscrowError> {
        if target <= from.timestamp {
            return Ok((from.bias, from.slope));
        }

        let mut bias = from.bias;
        let mut slope = from.slope;
        let mut t = from.timestamp;

        for (boundary, delta) in self.changes_between(from.timestamp, target) {
            bias = compute_bias(bias, slope, boundary - t)?;
            slope = checked_add(slope, delta)?.min(0);
            t = boundary;
        }

        bias = compute_bias(bias, slope, target - t)?;
        Ok((bias, slope))
    }
}

//! Append-only checkpoint sequences.
//!
//! Epochs are 1-based: the first appended point is epoch 1 and epoch 0 is the
//! implicit [`Point::ZERO`] that precedes all history. Timestamps and block
//! numbers never decrease along the sequence, which is what lets
//! [`find_by_block`](PointHistory::find_by_block) and
//! [`find_by_timestamp`](PointHistory::find_by_timestamp) binary-search it.

use veledger_core::error::EscrowError;
use veledger_core::types::{Point, Timestamp};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointHistory {
    points: Vec<Point>,
}

impl PointHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a checkpoint and return its epoch.
    ///
    /// # Errors
    ///
    /// [`EscrowError::NonMonotonicCheckpoint`] if `point` is earlier (by
    /// timestamp or block) than the latest checkpoint.
    pub fn append(&mut self, point: Point) -> Result<usize, EscrowError> {
        self.check_next(point.timestamp, point.block)?;
        Ok(self.push(point))
    }

    /// Verify that a checkpoint at `(timestamp, block)` may follow the latest one.
    pub fn check_next(&self, timestamp: Timestamp, block: u64) -> Result<(), EscrowError> {
        match self.points.last() {
            Some(last) if timestamp < last.timestamp || block < last.block => {
                Err(EscrowError::NonMonotonicCheckpoint {
                    last_timestamp: last.timestamp,
                    last_block: last.block,
                    timestamp,
                    block,
                })
            }
            _ => Ok(()),
        }
    }

    /// Append a point already validated with [`check_next`](Self::check_next).
    pub(crate) fn push(&mut self, point: Point) -> usize {
        self.points.push(point);
        self.points.len()
    }

    /// The latest checkpoint, or [`Point::ZERO`] if none exists yet.
    pub fn latest(&self) -> Point {
        self.points.last().copied().unwrap_or(Point::ZERO)
    }

    /// Epoch of the latest checkpoint (0 when empty).
    pub fn epoch(&self) -> usize {
        self.points.len()
    }

    /// Checkpoint at `epoch`. Epoch 0 is [`Point::ZERO`]; beyond the latest is `None`.
    pub fn get(&self, epoch: usize) -> Option<Point> {
        match epoch {
            0 => Some(Point::ZERO),
            e => self.points.get(e - 1).copied(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Point> {
        self.points.iter()
    }

    /// Epoch of the last checkpoint with `block <= target`, or 0 if none.
    pub fn epoch_at_block(&self, target: u64) -> usize {
        self.points.partition_point(|p| p.block <= target)
    }

    /// Epoch of the last checkpoint with `timestamp <= target`, or 0 if none.
    pub fn epoch_at_timestamp(&self, target: Timestamp) -> usize {
        self.points.partition_point(|p| p.timestamp <= target)
    }

    /// The checkpoint bounding `target` from below.
    ///
    /// - Before the first checkpoint: [`Point::ZERO`].
    /// - After the last: the last checkpoint (callers extrapolate forward).
    /// - Several checkpoints in the same block: the last of them.
    pub fn find_by_block(&self, target: u64) -> Point {
        self.get(self.epoch_at_block(target)).unwrap_or(Point::ZERO)
    }

    /// Same contract as [`find_by_block`](Self::find_by_block), keyed by timestamp.
    pub fn find_by_timestamp(&self, target: Timestamp) -> Point {
        self.get(self.epoch_at_timestamp(target)).unwrap_or(Point::ZERO)
    }
}

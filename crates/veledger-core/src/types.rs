//! Core ledger types: accounts, locks, checkpoints and checkpoint events.
//!
//! Amounts are `u128` base units. Bias and slope are signed `i128` so that
//! deltas between two decay lines can be expressed directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix time in seconds.
pub type Timestamp = u64;

/// A 32-byte account identity.
///
/// The engine does not interpret it: an end user, a delegate or a proxy
/// account are all just `AccountId`s here.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an account id from a human-readable label (BLAKE3 of the UTF-8 bytes).
    ///
    /// # Examples
    ///
    /// ```
    /// use veledger_core::types::AccountId;
    /// assert_eq!(AccountId::from_label("alice"), AccountId::from_label("alice"));
    /// assert_ne!(AccountId::from_label("alice"), AccountId::from_label("bob"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        Self(blake3::hash(label.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// An account's escrowed balance.
///
/// `start` is the effective start of the current decay line: the time of the
/// last mutation that re-based it. The line's slope is
/// `-(amount / (end - start))`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Lock {
    pub amount: u128,
    /// Expiry, always a multiple of the epoch width. Zero when there is no lock.
    pub end: Timestamp,
    pub start: Timestamp,
}

impl Lock {
    pub const EMPTY: Self = Self { amount: 0, end: 0, start: 0 };

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    /// Whether the lock still carries voting power at `now`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.amount > 0 && self.end > now
    }

    pub fn state(&self, now: Timestamp) -> LockState {
        if self.amount == 0 {
            LockState::NoLock
        } else if self.end > now {
            LockState::Locked
        } else {
            LockState::Expired
        }
    }
}

/// Read-time view of a lock. `Expired` is never stored; it is derived from the clock.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    NoLock,
    Locked,
    Expired,
}

/// An immutable checkpoint of a decay line.
///
/// `bias` is the voting power at `timestamp`; `slope` is the signed change of
/// bias per second (never positive).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Point {
    pub bias: i128,
    pub slope: i128,
    pub timestamp: Timestamp,
    pub block: u64,
}

impl Point {
    /// The base point used before any checkpoint exists.
    pub const ZERO: Self = Self { bias: 0, slope: 0, timestamp: 0, block: 0 };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// The lock operation that produced a checkpoint.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    CreateLock,
    IncreaseAmount,
    IncreaseUnlockTime,
    Withdraw,
    EarlyWithdraw,
}

impl fmt::Display for LockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateLock => "create_lock",
            Self::IncreaseAmount => "increase_amount",
            Self::IncreaseUnlockTime => "increase_unlock_time",
            Self::Withdraw => "withdraw",
            Self::EarlyWithdraw => "early_withdraw",
        };
        f.write_str(name)
    }
}

/// Notification emitted after every committed checkpoint.
///
/// Downstream consumers (boost recalculation, indexers) use it to learn that
/// an account's voting power changed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckpointEvent {
    pub account: AccountId,
    pub action: LockAction,
    pub old_bias: i128,
    pub new_bias: i128,
    pub old_slope: i128,
    pub new_slope: i128,
    pub timestamp: Timestamp,
    pub block: u64,
    /// The lock as persisted by this checkpoint.
    pub lock: Lock,
    /// Amount moved into custody (create/increase) or out of it (withdraw).
    pub transferred: u128,
}

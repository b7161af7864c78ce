//! Protocol constants. All amounts are in base units (1 token = 10^18 units).

/// Base units per whole token.
pub const TOKEN: u128 = 1_000_000_000_000_000_000;

pub const DAY: u64 = 86_400;
pub const WEEK: u64 = 7 * DAY;
pub const YEAR: u64 = 365 * DAY;

/// Width of a decay epoch. Every lock expiry is rounded down to a multiple of this.
///
/// # Examples
///
/// ```
/// use veledger_core::constants::{EPOCH, WEEK};
/// assert_eq!(EPOCH, WEEK);
/// assert_eq!(EPOCH, 604_800);
/// ```
pub const EPOCH: u64 = WEEK;

/// Shortest allowed distance between `now` and a rounded lock end.
pub const MIN_LOCK_DURATION: u64 = EPOCH;

/// Longest allowed distance between `now` and a rounded lock end (~4 years).
///
/// One second short of 209 weeks, so a request for "four years and a few weeks"
/// is rejected even after the end is rounded down to an epoch boundary.
///
/// # Examples
///
/// ```
/// use veledger_core::constants::{MAX_LOCK_DURATION, WEEK, YEAR};
/// assert!(MAX_LOCK_DURATION > 4 * YEAR);
/// assert!(MAX_LOCK_DURATION < 4 * YEAR + 3 * WEEK);
/// ```
pub const MAX_LOCK_DURATION: u64 = 209 * WEEK - 1;

/// Upper bound on a single account's locked amount.
///
/// Bounding the amount (together with [`MAX_LOCK_DURATION`]) keeps every
/// `slope * duration` product and every aggregated bias comfortably inside `i128`.
pub const MAX_LOCK_AMOUNT: u128 = 1_000_000_000_000 * TOKEN;

/// Default buffer size of the checkpoint event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

//! Deterministic integer arithmetic for decay lines.
//!
//! All division rounds toward zero on non-negative operands (floor), and every
//! product is checked: overflow is reported as [`EscrowError::ArithmeticOverflow`]
//! instead of wrapping.

use crate::error::EscrowError;
use crate::types::Timestamp;

/// Signed per-second slope of a lock of `amount` decaying to zero over `duration` seconds.
///
/// The magnitude is `floor(amount / duration)`, so the resulting line never
/// exceeds `amount`. A zero duration is treated as one second.
///
/// # Examples
///
/// ```
/// use veledger_core::math::compute_slope;
/// assert_eq!(compute_slope(1_000, 10).unwrap(), -100);
/// assert_eq!(compute_slope(1_000, 1_209_600).unwrap(), 0);
/// ```
pub fn compute_slope(amount: u128, duration: u64) -> Result<i128, EscrowError> {
    let magnitude = amount / duration.max(1) as u128;
    let magnitude = i128::try_from(magnitude).map_err(|_| EscrowError::ArithmeticOverflow)?;
    Ok(-magnitude)
}

/// Bias of a line `elapsed` seconds after it had value `bias0`, clamped at zero.
///
/// # Examples
///
/// ```
/// use veledger_core::math::compute_bias;
/// assert_eq!(compute_bias(1_000, -10, 30).unwrap(), 700);
/// assert_eq!(compute_bias(1_000, -10, 500).unwrap(), 0);
/// ```
pub fn compute_bias(bias0: i128, slope: i128, elapsed: u64) -> Result<i128, EscrowError> {
    let delta = slope
        .checked_mul(elapsed as i128)
        .ok_or(EscrowError::ArithmeticOverflow)?;
    let bias = bias0
        .checked_add(delta)
        .ok_or(EscrowError::ArithmeticOverflow)?;
    Ok(bias.max(0))
}

/// Bias at `now` of a line with `slope` that reaches zero exactly at `end`.
///
/// Returns zero once `now >= end`.
pub fn bias_until(slope: i128, end: Timestamp, now: Timestamp) -> Result<i128, EscrowError> {
    if now >= end {
        return Ok(0);
    }
    let remaining = (end - now) as i128;
    slope
        .checked_neg()
        .and_then(|s| s.checked_mul(remaining))
        .ok_or(EscrowError::ArithmeticOverflow)
}

/// Round a timestamp down to a multiple of `epoch`.
///
/// # Examples
///
/// ```
/// use veledger_core::math::round_to_epoch;
/// assert_eq!(round_to_epoch(1_209_700, 604_800), 1_209_600);
/// assert_eq!(round_to_epoch(604_800, 604_800), 604_800);
/// ```
pub fn round_to_epoch(ts: Timestamp, epoch: u64) -> Timestamp {
    let epoch = epoch.max(1);
    ts / epoch * epoch
}

/// Checked signed addition used when folding deltas into running totals.
pub fn checked_add(a: i128, b: i128) -> Result<i128, EscrowError> {
    a.checked_add(b).ok_or(EscrowError::ArithmeticOverflow)
}

/// Checked signed subtraction.
pub fn checked_sub(a: i128, b: i128) -> Result<i128, EscrowError> {
    a.checked_sub(b).ok_or(EscrowError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{EPOCH, MAX_LOCK_AMOUNT, MAX_LOCK_DURATION, TOKEN};
    use proptest::prelude::*;

    // --- compute_slope ---

    #[test]
    fn slope_floors_small_amounts_to_zero() {
        // 1000 base units over two epochs decays at less than one unit per second.
        assert_eq!(compute_slope(1_000, 2 * EPOCH).unwrap(), 0);
    }

    #[test]
    fn slope_for_token_scaled_amount() {
        let slope = compute_slope(1_000 * TOKEN, 2 * EPOCH).unwrap();
        assert_eq!(slope, -((1_000 * TOKEN / (2 * EPOCH as u128)) as i128));
        assert!(slope < 0);
    }

    #[test]
    fn slope_zero_duration_treated_as_one() {
        assert_eq!(compute_slope(42, 0).unwrap(), -42);
    }

    #[test]
    fn slope_rejects_unrepresentable_magnitude() {
        assert_eq!(
            compute_slope(u128::MAX, 1).unwrap_err(),
            EscrowError::ArithmeticOverflow
        );
    }

    // --- compute_bias ---

    #[test]
    fn bias_never_negative() {
        assert_eq!(compute_bias(10, -1, 11).unwrap(), 0);
        assert_eq!(compute_bias(0, -5, 1).unwrap(), 0);
    }

    #[test]
    fn bias_zero_elapsed_is_identity() {
        assert_eq!(compute_bias(123, -7, 0).unwrap(), 123);
    }

    #[test]
    fn bias_overflow_is_reported() {
        assert_eq!(
            compute_bias(0, i128::MIN, 2).unwrap_err(),
            EscrowError::ArithmeticOverflow
        );
    }

    // --- bias_until ---

    #[test]
    fn bias_until_hits_zero_at_end() {
        assert_eq!(bias_until(-3, 100, 90).unwrap(), 30);
        assert_eq!(bias_until(-3, 100, 100).unwrap(), 0);
        assert_eq!(bias_until(-3, 100, 1_000).unwrap(), 0);
    }

    // --- round_to_epoch ---

    #[test]
    fn round_is_idempotent_on_boundaries() {
        for k in 0..10u64 {
            assert_eq!(round_to_epoch(k * EPOCH, EPOCH), k * EPOCH);
            assert_eq!(round_to_epoch(k * EPOCH + EPOCH - 1, EPOCH), k * EPOCH);
        }
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn line_never_exceeds_amount(
            amount in 1u128..=MAX_LOCK_AMOUNT,
            duration in 1u64..=MAX_LOCK_DURATION,
        ) {
            let slope = compute_slope(amount, duration).unwrap();
            let bias = bias_until(slope, duration, 0).unwrap();
            prop_assert!(bias >= 0);
            prop_assert!(bias as u128 <= amount);
            // Floor division loses strictly less than one unit per second of duration.
            prop_assert!(amount - (bias as u128) < duration as u128);
        }

        #[test]
        fn bias_monotone_in_elapsed(
            bias0 in 0i128..=(MAX_LOCK_AMOUNT as i128),
            slope in -(TOKEN as i128)..=0i128,
            a in 0u64..=MAX_LOCK_DURATION,
            b in 0u64..=MAX_LOCK_DURATION,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let x = compute_bias(bias0, slope, lo).unwrap();
            let y = compute_bias(bias0, slope, hi).unwrap();
            prop_assert!(x >= y, "bias increased: f({})={} < f({})={}", lo, x, hi, y);
        }

        #[test]
        fn rounded_end_is_boundary_and_not_later(ts in 0u64..=u64::MAX / 2) {
            let r = round_to_epoch(ts, EPOCH);
            prop_assert_eq!(r % EPOCH, 0);
            prop_assert!(r <= ts);
            prop_assert!(ts - r < EPOCH);
        }
    }
}

//! Tunable escrow policy.
//!
//! [`EscrowParams`] carries the epoch width and the lock-duration and amount
//! bounds the ledger enforces. Defaults come from [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{EPOCH, MAX_LOCK_AMOUNT, MAX_LOCK_DURATION, MIN_LOCK_DURATION, TOKEN};
use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct EscrowParams {
    /// Epoch width in seconds; lock ends are rounded down to multiples of it.
    pub epoch: u64,
    /// Minimum `rounded_end - now` in seconds.
    pub min_lock_duration: u64,
    /// Maximum `rounded_end - now` in seconds.
    pub max_lock_duration: u64,
    /// Largest amount a single account may hold in escrow, in whole tokens.
    pub max_lock_tokens: u64,
    /// Whether partial or full withdrawal before expiry is allowed.
    pub early_withdraw_enabled: bool,
}

impl Default for EscrowParams {
    fn default() -> Self {
        Self {
            epoch: EPOCH,
            min_lock_duration: MIN_LOCK_DURATION,
            max_lock_duration: MAX_LOCK_DURATION,
            max_lock_tokens: (MAX_LOCK_AMOUNT / TOKEN) as u64,
            early_withdraw_enabled: false,
        }
    }
}

impl EscrowParams {
    /// Check internal consistency of the parameters.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidParameter`] for a zero epoch, a zero or inverted
    /// duration range, a maximum shorter than one epoch, or an amount bound
    /// whose `amount * max_lock_duration` product does not fit in `i128`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch == 0 {
            return Err(ConfigError::InvalidParameter("epoch must be non-zero".into()));
        }
        if self.min_lock_duration == 0 {
            return Err(ConfigError::InvalidParameter(
                "min_lock_duration must be non-zero".into(),
            ));
        }
        if self.min_lock_duration > self.max_lock_duration {
            return Err(ConfigError::InvalidParameter(format!(
                "min_lock_duration {} exceeds max_lock_duration {}",
                self.min_lock_duration, self.max_lock_duration
            )));
        }
        if self.max_lock_duration < self.epoch {
            return Err(ConfigError::InvalidParameter(format!(
                "max_lock_duration {} is shorter than one epoch ({})",
                self.max_lock_duration, self.epoch
            )));
        }
        if self.max_lock_tokens == 0 {
            return Err(ConfigError::InvalidParameter("max_lock_tokens must be non-zero".into()));
        }
        let fits = (self.max_lock_tokens as u128)
            .checked_mul(TOKEN)
            .and_then(|amount| amount.checked_mul(self.max_lock_duration as u128))
            .is_some_and(|p| p <= i128::MAX as u128);
        if !fits {
            return Err(ConfigError::InvalidParameter(format!(
                "max_lock_tokens {} is too large for signed bias arithmetic",
                self.max_lock_tokens
            )));
        }
        Ok(())
    }

    /// Per-account amount bound in base units.
    pub fn max_lock_amount(&self) -> u128 {
        (self.max_lock_tokens as u128).saturating_mul(TOKEN)
    }

    /// Parameters with early withdrawal switched on.
    pub fn with_early_withdraw(self) -> Self {
        Self {
            early_withdraw_enabled: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EscrowParams::default().validate().is_ok());
        assert!(!EscrowParams::default().early_withdraw_enabled);
    }

    #[test]
    fn zero_epoch_rejected() {
        let p = EscrowParams { epoch: 0, ..EscrowParams::default() };
        assert!(matches!(p.validate(), Err(ConfigError::InvalidParameter(_))));
    }

    #[test]
    fn inverted_range_rejected() {
        let p = EscrowParams {
            min_lock_duration: 10 * EPOCH,
            max_lock_duration: 5 * EPOCH,
            ..EscrowParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn max_shorter_than_epoch_rejected() {
        let p = EscrowParams {
            min_lock_duration: 1,
            max_lock_duration: EPOCH - 1,
            ..EscrowParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn oversized_amount_rejected() {
        let p = EscrowParams {
            max_lock_tokens: u64::MAX,
            ..EscrowParams::default()
        };
        assert!(p.validate().is_err());
    }

    #[test]
    fn default_amount_bound_matches_constant() {
        assert_eq!(EscrowParams::default().max_lock_amount(), MAX_LOCK_AMOUNT);
    }

    #[test]
    fn with_early_withdraw_only_flips_switch() {
        let p = EscrowParams::default().with_early_withdraw();
        assert!(p.early_withdraw_enabled);
        assert_eq!(p.epoch, EPOCH);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let p: EscrowParams = serde_json::from_str(r#"{"early_withdraw_enabled": true}"#).unwrap();
        assert_eq!(p.max_lock_duration, MAX_LOCK_DURATION);
        assert!(p.early_withdraw_enabled);
    }
}

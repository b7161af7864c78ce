//! Error types for the veledger engine and its collaborators.
use thiserror::Error;

use crate::types::Timestamp;

/// Precondition and arithmetic failures raised by the lock ledger.
///
/// None of these leave partial state behind: every mutation validates and
/// computes before it touches a history or a schedule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("invalid lock modification: {0}")] InvalidLockModification(String),
    #[error("lock duration out of range: end {end}, now {now}, allowed ({min}..={max}) seconds")]
    LockDurationOutOfRange { end: Timestamp, now: Timestamp, min: u64, max: u64 },
    #[error("account already has an active lock")] AlreadyLocked,
    #[error("account has no active lock")] NoActiveLock,
    #[error("lock expired at {end}")] LockExpired { end: Timestamp },
    #[error("lock not expired: ends at {end}, now {now}")] LockNotExpired { end: Timestamp, now: Timestamp },
    #[error("amount must be greater than zero")] ZeroAmount,
    #[error("arithmetic overflow")] ArithmeticOverflow,
    #[error("amount {amount} exceeds the per-account limit {max}")] AmountTooLarge { amount: u128, max: u128 },
    #[error("checkpoint at (ts {timestamp}, block {block}) precedes latest (ts {last_timestamp}, block {last_block})")]
    NonMonotonicCheckpoint { last_timestamp: Timestamp, last_block: u64, timestamp: Timestamp, block: u64 },
    #[error("early withdraw is disabled")] EarlyWithdrawDisabled,
    #[error("insufficient locked amount: locked {locked}, requested {requested}")]
    InsufficientLockedAmount { locked: u128, requested: u128 },
    #[error("unknown block: {0}")] UnknownBlock(u64),
    #[error("block {block} is ahead of current block {current}")] BlockInFuture { block: u64, current: u64 },
    #[error("transition planned at global epoch {planned}, ledger is at {current}")]
    StaleTransition { planned: usize, current: usize },
    #[error("global curve out of range after checkpoint: bias {bias}, slope {slope}")]
    GlobalCurveDrift { bias: i128, slope: i128 },
}

/// Failures of the underlying asset transfer collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u128, need: u128 },
    #[error("insufficient custody: held {held}, need {need}")] InsufficientCustody { held: u128, need: u128 },
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid parameter: {0}")] InvalidParameter(String),
    #[error("load: {0}")] Load(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)] Escrow(#[from] EscrowError),
    #[error(transparent)] Custody(#[from] CustodyError),
    #[error(transparent)] Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escrow_error_messages() {
        assert_eq!(EscrowError::ZeroAmount.to_string(), "amount must be greater than zero");
        assert_eq!(
            EscrowError::LockNotExpired { end: 10, now: 5 }.to_string(),
            "lock not expired: ends at 10, now 5"
        );
    }

    #[test]
    fn ledger_error_is_transparent() {
        let err: LedgerError = EscrowError::AlreadyLocked.into();
        assert_eq!(err.to_string(), "account already has an active lock");

        let err: LedgerError = CustodyError::InsufficientFunds { have: 1, need: 2 }.into();
        assert!(matches!(err, LedgerError::Custody(_)));
    }
}

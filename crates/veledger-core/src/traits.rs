//! Collaborator interfaces consumed by the escrow engine's service layer.
//!
//! - [`BlockOracle`]: wall clock, current block, block to timestamp mapping
//! - [`AssetCustody`]: movement of the underlying locked asset
//!
//! The engine itself never calls these; it takes `now` and `block` as
//! arguments. The service layer (veledger-node) reads them and performs the
//! transfers around each checkpoint.

use crate::error::CustodyError;
use crate::types::{AccountId, Timestamp};

/// Source of time and block numbers.
pub trait BlockOracle: Send + Sync {
    /// Current timestamp in seconds.
    fn now(&self) -> Timestamp;

    /// Number of the block currently being processed.
    fn current_block(&self) -> u64;

    /// Current block and its timestamp, read together.
    ///
    /// Implementations whose head can move between two calls should override
    /// this so the pair always belongs to the same block.
    fn head(&self) -> (u64, Timestamp) {
        (self.current_block(), self.now())
    }

    /// Timestamp of a past (or the current) block. `None` if the block is unknown.
    fn timestamp_of_block(&self, block: u64) -> Option<Timestamp>;
}

/// Custody of the underlying asset.
///
/// Both transfers are all-or-nothing: an `Err` means no balance moved.
pub trait AssetCustody: Send + Sync {
    /// Pull `amount` from `account` into custody.
    fn deposit(&self, account: &AccountId, amount: u128) -> Result<(), CustodyError>;

    /// Push `amount` from custody back to `account`.
    fn payout(&self, account: &AccountId, amount: u128) -> Result<(), CustodyError>;
}

//! # veledger-escrow: checkpointed linear-decay voting power.
//!
//! Locked balances earn voting power that decays linearly to zero at the
//! lock's end. Every lock mutation appends one checkpoint to the account's
//! history and one to the global history, and records the slope changes the
//! lock's expiry will cause. Queries binary-search the histories and replay
//! scheduled changes forward, so no operation ever iterates over accounts.
//!
//! - [`schedule`]: slope changes keyed by epoch boundary
//! - [`history`]: append-only checkpoint sequences with O(log n) lookup
//! - [`checkpoint`]: folding a lock change into the account and global curves
//! - [`ledger`]: the [`Engine`] and its plan/commit lock operations
//! - [`query`]: balances, supply and introspection

pub mod checkpoint;
pub mod history;
pub mod ledger;
pub mod query;
pub mod schedule;

pub use checkpoint::{plan_checkpoint, Checkpoint, CheckpointRequest, Curves};
pub use history::PointHistory;
pub use ledger::{Engine, Transition};
pub use schedule::ScheduleStore;

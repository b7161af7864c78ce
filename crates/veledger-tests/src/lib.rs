//! Integration and property tests for the veledger workspace.
//!
//! The tests under `tests/` drive the engine and the service end to end and
//! check the ledger-wide invariants: supply conservation at every recorded
//! block, decay monotonicity, and all-or-nothing custody.

pub mod helpers;

//! # veledger-core
//! Foundation types, constants, math and collaborator traits for the
//! veledger vote-escrow engine.

pub mod constants;
pub mod error;
pub mod math;
pub mod params;
pub mod traits;
pub mod types;

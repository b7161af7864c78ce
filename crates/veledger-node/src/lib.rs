//! # veledger-node: escrow service composition.
//!
//! Wraps the [`veledger_escrow::Engine`] in a thread-safe [`EscrowService`],
//! provides in-memory collaborator adapters ([`SimulatedChain`],
//! [`MemoryCustody`]) and loads [`NodeConfig`].

pub mod config;
pub mod custody;
pub mod oracle;
pub mod service;

pub use config::{default_config_path, NodeConfig};
pub use custody::MemoryCustody;
pub use oracle::SimulatedChain;
pub use service::{next_event, EscrowService};

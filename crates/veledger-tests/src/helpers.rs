//! Shared fixtures for the integration tests.

use std::sync::Arc;

use veledger_core::constants::{EPOCH, TOKEN};
use veledger_core::types::{AccountId, Timestamp};
use veledger_node::{EscrowService, MemoryCustody, NodeConfig, SimulatedChain};

/// An epoch-aligned genesis time far from zero.
pub const GENESIS: Timestamp = 2_700 * EPOCH;

/// Default spacing between simulated blocks.
pub const BLOCK_TIME: u64 = 12;

/// Deterministic account for index `i`.
pub fn account(i: usize) -> AccountId {
    AccountId::from_label(&format!("account-{i}"))
}

/// `n` whole tokens in base units.
pub fn tokens(n: u64) -> u128 {
    u128::from(n) * TOKEN
}

/// A service over a fresh simulated chain and custody.
pub struct Harness {
    pub chain: Arc<SimulatedChain>,
    pub custody: Arc<MemoryCustody>,
    pub service: EscrowService,
}

impl Harness {
    pub fn new(config: NodeConfig) -> Self {
        let chain = Arc::new(SimulatedChain::new(GENESIS, BLOCK_TIME));
        let custody = Arc::new(MemoryCustody::new());
        let service = EscrowService::new(config, chain.clone(), custody.clone())
            .expect("default config is valid");
        Self { chain, custody, service }
    }

    /// Harness with early withdrawal enabled.
    pub fn with_early_withdraw() -> Self {
        let mut config = NodeConfig::default();
        config.escrow.early_withdraw_enabled = true;
        Self::new(config)
    }

    /// Give each of `accounts` a wallet balance of `amount`.
    pub fn fund(&self, accounts: &[AccountId], amount: u128) {
        for a in accounts {
            self.custody.fund(a, amount);
        }
    }

    /// Sum of `balance_of_at` over `accounts` at `block`.
    pub fn sum_balances_at(&self, accounts: &[AccountId], block: u64) -> u128 {
        accounts
            .iter()
            .map(|a| self.service.balance_of_at(a, block).expect("block is known"))
            .sum()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}

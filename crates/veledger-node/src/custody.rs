//! In-memory asset custody.
//!
//! [`MemoryCustody`] keeps per-account wallet balances and a single vault
//! holding everything currently escrowed. Transfers move value between a
//! wallet and the vault and are all-or-nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use veledger_core::error::CustodyError;
use veledger_core::traits::AssetCustody;
use veledger_core::types::AccountId;

#[derive(Debug, Default)]
struct Balances {
    wallets: HashMap<AccountId, u128>,
    vault: u128,
}

#[derive(Debug, Default)]
pub struct MemoryCustody {
    balances: Mutex<Balances>,
    reject: AtomicBool,
}

impl MemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to an account's wallet out of thin air.
    pub fn fund(&self, account: &AccountId, amount: u128) {
        let mut balances = self.balances.lock();
        let wallet = balances.wallets.entry(*account).or_default();
        *wallet = wallet.saturating_add(amount);
    }

    /// Wallet balance of `account` (not counting anything escrowed).
    pub fn balance(&self, account: &AccountId) -> u128 {
        self.balances.lock().wallets.get(account).copied().unwrap_or(0)
    }

    /// Total held in the vault.
    pub fn held(&self) -> u128 {
        self.balances.lock().vault
    }

    /// Make every subsequent transfer fail with [`CustodyError::Rejected`].
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    fn check_enabled(&self) -> Result<(), CustodyError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(CustodyError::Rejected("custody is rejecting transfers".into()));
        }
        Ok(())
    }
}

impl AssetCustody for MemoryCustody {
    fn deposit(&self, account: &AccountId, amount: u128) -> Result<(), CustodyError> {
        self.check_enabled()?;
        let mut balances = self.balances.lock();
        let have = balances.wallets.get(account).copied().unwrap_or(0);
        if have < amount {
            return Err(CustodyError::InsufficientFunds { have, need: amount });
        }
        let vault = balances
            .vault
            .checked_add(amount)
            .ok_or_else(|| CustodyError::Rejected("vault overflow".into()))?;
        balances.wallets.insert(*account, have - amount);
        balances.vault = vault;
        Ok(())
    }

    fn payout(&self, account: &AccountId, amount: u128) -> Result<(), CustodyError> {
        self.check_enabled()?;
        let mut balances = self.balances.lock();
        if balances.vault < amount {
            return Err(CustodyError::InsufficientCustody { held: balances.vault, need: amount });
        }
        balances.vault -= amount;
        let wallet = balances.wallets.entry(*account).or_default();
        *wallet = wallet.saturating_add(amount);
        Ok(())
    }
}

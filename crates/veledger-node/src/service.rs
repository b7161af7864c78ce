//! Escrow service composition.
//!
//! [`EscrowService`] wires the [`Engine`] to its collaborators: a
//! [`BlockOracle`] for time and block numbers and an [`AssetCustody`] for
//! moving the locked asset. Mutations are serialized behind a write lock held
//! across plan, transfer and commit, so a failed transfer leaves the engine
//! untouched and a successful one is always followed by its checkpoint.
//! Queries take a read lock and never wait on custody.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use veledger_core::error::{EscrowError, LedgerError};
use veledger_core::traits::{AssetCustody, BlockOracle};
use veledger_core::types::{AccountId, CheckpointEvent, Lock, LockAction, LockState, Timestamp};
use veledger_escrow::{Engine, Transition};

use crate::config::NodeConfig;

/// Thread-safe handle to a running escrow ledger. Cheap to clone.
#[derive(Clone)]
pub struct EscrowService {
    engine: Arc<RwLock<Engine>>,
    oracle: Arc<dyn BlockOracle>,
    custody: Arc<dyn AssetCustody>,
    events: broadcast::Sender<CheckpointEvent>,
    config: NodeConfig,
}

impl EscrowService {
    /// Build a service with an empty engine.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Config`] if `config` fails validation.
    pub fn new(
        config: NodeConfig,
        oracle: Arc<dyn BlockOracle>,
        custody: Arc<dyn AssetCustody>,
    ) -> Result<Self, LedgerError> {
        config.validate()?;
        let engine = Engine::new(config.escrow)?;
        let (events, _) = broadcast::channel(config.event_capacity);
        info!(
            epoch = config.escrow.epoch,
            max_lock_duration = config.escrow.max_lock_duration,
            early_withdraw = config.escrow.early_withdraw_enabled,
            "escrow service started"
        );
        Ok(Self {
            engine: Arc::new(RwLock::new(engine)),
            oracle,
            custody,
            events,
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Receive every checkpoint committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckpointEvent> {
        self.events.subscribe()
    }

    // --- mutators ---

    /// Lock `amount` until `end`, pulling it from the account's wallet.
    pub fn create_lock(
        &self,
        account: AccountId,
        amount: u128,
        end: Timestamp,
    ) -> Result<CheckpointEvent, LedgerError> {
        self.execute(|engine, now, block| engine.plan_create_lock(account, amount, end, now, block))
    }

    pub fn increase_amount(&self, account: AccountId, extra: u128) -> Result<CheckpointEvent, LedgerError> {
        self.execute(|engine, now, block| engine.plan_increase_amount(account, extra, now, block))
    }

    pub fn increase_unlock_time(
        &self,
        account: AccountId,
        new_end: Timestamp,
    ) -> Result<CheckpointEvent, LedgerError> {
        self.execute(|engine, now, block| engine.plan_increase_unlock_time(account, new_end, now, block))
    }

    /// Release an expired lock and pay it out. Returns the amount paid.
    pub fn withdraw(&self, account: AccountId) -> Result<u128, LedgerError> {
        let event = self.execute(|engine, now, block| engine.plan_withdraw(account, now, block))?;
        Ok(event.transferred)
    }

    /// Release `amount` of an active lock and pay it out. Returns the amount paid.
    pub fn early_withdraw(&self, account: AccountId, amount: u128) -> Result<u128, LedgerError> {
        let event =
            self.execute(|engine, now, block| engine.plan_early_withdraw(account, amount, now, block))?;
        Ok(event.transferred)
    }

    /// Plan under the write lock, move funds, then commit.
    fn execute<F>(&self, plan: F) -> Result<CheckpointEvent, LedgerError>
    where
        F: FnOnce(&Engine, Timestamp, u64) -> Result<Transition, EscrowError>,
    {
        // Read the head under the write lock so commits follow block order.
        let mut engine = self.engine.write();
        let (block, now) = self.oracle.head();
        let transition = plan(&*engine, now, block)?;
        let account = transition.account();
        let (deposit, payout) = (transition.deposit(), transition.payout());

        if deposit > 0 {
            if let Err(e) = self.custody.deposit(&account, deposit) {
                warn!(%account, amount = %deposit, "deposit rejected: {e}");
                return Err(e.into());
            }
        }
        if payout > 0 {
            if let Err(e) = self.custody.payout(&account, payout) {
                warn!(%account, amount = %payout, "payout rejected: {e}");
                return Err(e.into());
            }
        }

        let event = match engine.commit(transition) {
            Ok(event) => event,
            Err(e) => {
                self.reverse_transfer(&account, deposit, payout);
                return Err(e.into());
            }
        };
        drop(engine);

        log_lifecycle(&event);
        if self.events.send(event.clone()).is_err() {
            debug!("no checkpoint subscribers");
        }
        Ok(event)
    }

    /// Undo the transfers of a transition whose commit failed.
    fn reverse_transfer(&self, account: &AccountId, deposit: u128, payout: u128) {
        if deposit > 0 {
            if let Err(e) = self.custody.payout(account, deposit) {
                warn!(%account, amount = %deposit, "failed to return deposit: {e}");
            }
        }
        if payout > 0 {
            if let Err(e) = self.custody.deposit(account, payout) {
                warn!(%account, amount = %payout, "failed to reclaim payout: {e}");
            }
        }
    }

    // --- queries ---

    /// Current voting power of `account`.
    pub fn balance_of(&self, account: &AccountId) -> Result<u128, LedgerError> {
        let now = self.oracle.now();
        Ok(self.engine.read().balance_of(account, now)?)
    }

    /// Voting power of `account` at time `t`.
    pub fn balance_of_at_time(&self, account: &AccountId, t: Timestamp) -> Result<u128, LedgerError> {
        Ok(self.engine.read().balance_of(account, t)?)
    }

    /// Voting power of `account` as of `block`.
    pub fn balance_of_at(&self, account: &AccountId, block: u64) -> Result<u128, LedgerError> {
        Ok(self.engine.read().balance_of_at(account, block, self.oracle.as_ref())?)
    }

    pub fn total_supply(&self) -> Result<u128, LedgerError> {
        let now = self.oracle.now();
        Ok(self.engine.read().total_supply(now)?)
    }

    pub fn total_supply_at(&self, block: u64) -> Result<u128, LedgerError> {
        Ok(self.engine.read().total_supply_at(block, self.oracle.as_ref())?)
    }

    pub fn locked(&self, account: &AccountId) -> Lock {
        self.engine.read().locked(account)
    }

    pub fn lock_state(&self, account: &AccountId) -> LockState {
        let now = self.oracle.now();
        self.engine.read().lock_state(account, now)
    }

    pub fn total_locked(&self) -> u128 {
        self.engine.read().total_locked()
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        self.engine.read().accounts()
    }

    /// Run `f` against a read-locked view of the engine.
    pub fn read<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        f(&*self.engine.read())
    }
}

fn log_lifecycle(event: &CheckpointEvent) {
    let account = event.account;
    let amount = event.transferred;
    let end = event.lock.end;
    match event.action {
        LockAction::CreateLock => info!(%account, %amount, end, "lock created"),
        LockAction::IncreaseAmount => info!(%account, %amount, "lock amount increased"),
        LockAction::IncreaseUnlockTime => info!(%account, end, "lock extended"),
        LockAction::Withdraw => info!(%account, %amount, "lock withdrawn"),
        LockAction::EarlyWithdraw => info!(%account, %amount, remaining = %event.lock.amount, "lock withdrawn early"),
    }
}

/// Wait for the next checkpoint event, skipping over any missed while lagging.
///
/// Returns `None` once the service (every sender) has been dropped.
pub async fn next_event(rx: &mut broadcast::Receiver<CheckpointEvent>) -> Option<CheckpointEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "lagged behind on checkpoint events");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

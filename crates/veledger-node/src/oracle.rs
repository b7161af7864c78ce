//! In-memory block oracle.
//!
//! [`SimulatedChain`] records one `(block, timestamp)` pair per mined block.
//! Heights increase by one per block; timestamps never decrease. It backs the
//! CLI simulator and the integration tests.

use parking_lot::RwLock;

use veledger_core::traits::BlockOracle;
use veledger_core::types::Timestamp;

/// A chain that only moves when told to.
#[derive(Debug)]
pub struct SimulatedChain {
    block_time: u64,
    blocks: RwLock<Vec<(u64, Timestamp)>>,
}

impl SimulatedChain {
    /// Start a chain whose block 1 is at `genesis_time`.
    ///
    /// `block_time` is the spacing used by [`mine`](Self::mine); a zero
    /// spacing is treated as one second.
    pub fn new(genesis_time: Timestamp, block_time: u64) -> Self {
        Self {
            block_time: block_time.max(1),
            blocks: RwLock::new(vec![(1, genesis_time)]),
        }
    }

    /// Mine one block `block_time` seconds after the current one.
    pub fn mine(&self) -> u64 {
        self.advance(self.block_time)
    }

    /// Mine one block `secs` seconds after the current one. Returns its number.
    pub fn advance(&self, secs: u64) -> u64 {
        let mut blocks = self.blocks.write();
        let (block, ts) = blocks.last().copied().unwrap_or((0, 0));
        let next = (block + 1, ts.saturating_add(secs));
        blocks.push(next);
        next.0
    }

    /// Mine one block at `ts`, or at the current timestamp if `ts` is in the past.
    pub fn advance_to(&self, ts: Timestamp) -> u64 {
        let now = self.now();
        self.advance(ts.saturating_sub(now))
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }
}

impl BlockOracle for SimulatedChain {
    fn now(&self) -> Timestamp {
        self.blocks.read().last().map_or(0, |&(_, ts)| ts)
    }

    fn current_block(&self) -> u64 {
        self.blocks.read().last().map_or(0, |&(block, _)| block)
    }

    fn head(&self) -> (u64, Timestamp) {
        self.blocks.read().last().copied().unwrap_or((0, 0))
    }

    fn timestamp_of_block(&self, block: u64) -> Option<Timestamp> {
        let blocks = self.blocks.read();
        let idx = blocks.binary_search_by_key(&block, |&(b, _)| b).ok()?;
        Some(blocks[idx].1)
    }
}

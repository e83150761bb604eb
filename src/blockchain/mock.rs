//! Scriptable in-memory ledger used by tests.

use async_trait::async_trait;
use primitive_types::U256;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::blockchain::gateway::{LedgerGateway, LedgerTransaction};
use crate::blockchain::transaction::{BlockRef, Transaction};
use crate::error::{GatewayError, GatewayResult};

#[derive(Default)]
struct MockState {
    height: U256,
    balances: HashMap<String, U256>,
    canonical: HashMap<U256, String>,
    described: HashMap<String, LedgerTransaction>,
    next_hashes: VecDeque<String>,
    submitted: Vec<String>,
    block_exists_calls: usize,
    balance_calls: usize,
    fail_height: bool,
    fail_balance: bool,
    fail_submit: bool,
    fail_describe: bool,
    fail_block_exists: bool,
}

#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_height(&self, height: u64) {
        self.state.lock().height = U256::from(height);
    }

    pub fn set_balance(&self, address: &str, amount: u64) {
        self.state
            .lock()
            .balances
            .insert(address.to_string(), U256::from(amount));
    }

    /// Make `hash` the canonical block at `number`.
    pub fn add_block(&self, number: u64, hash: &str) {
        self.state
            .lock()
            .canonical
            .insert(U256::from(number), hash.to_string());
    }

    /// Swap the canonical block at `number`, as a reorg would.
    pub fn replace_block(&self, number: u64, hash: &str) {
        self.add_block(number, hash);
    }

    pub fn queue_hash(&self, hash: &str) {
        self.state.lock().next_hashes.push_back(hash.to_string());
    }

    /// Report `hash` as included in `block` (or known but pending when None).
    pub fn describe_as(&self, hash: &str, block: Option<(u64, &str)>) {
        let block = block.map(|(number, block_hash)| BlockRef::new(U256::from(number), block_hash));
        let mut state = self.state.lock();
        let entry = state
            .described
            .entry(hash.to_string())
            .or_insert_with(|| LedgerTransaction {
                hash: hash.to_string(),
                block: None,
                from: String::new(),
                to: String::new(),
                value: U256::default(),
            });
        entry.block = block;
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().submitted.clone()
    }

    pub fn block_exists_calls(&self) -> usize {
        self.state.lock().block_exists_calls
    }

    pub fn balance_calls(&self) -> usize {
        self.state.lock().balance_calls
    }

    pub fn fail_height(&self, fail: bool) {
        self.state.lock().fail_height = fail;
    }

    pub fn fail_balance(&self, fail: bool) {
        self.state.lock().fail_balance = fail;
    }

    pub fn fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    pub fn fail_describe(&self, fail: bool) {
        self.state.lock().fail_describe = fail;
    }

    pub fn fail_block_exists(&self, fail: bool) {
        self.state.lock().fail_block_exists = fail;
    }
}

fn unavailable() -> GatewayError {
    GatewayError::Transport("mock ledger unavailable".to_string())
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn current_height(&self) -> GatewayResult<U256> {
        let state = self.state.lock();
        if state.fail_height {
            return Err(unavailable());
        }
        Ok(state.height)
    }

    async fn balance(&self, address: &str) -> GatewayResult<U256> {
        let mut state = self.state.lock();
        state.balance_calls += 1;
        if state.fail_balance {
            return Err(unavailable());
        }
        Ok(state.balances.get(address).cloned().unwrap_or_default())
    }

    async fn submit(&self, transaction: &Transaction) -> GatewayResult<String> {
        let mut state = self.state.lock();
        if state.fail_submit {
            return Err(unavailable());
        }
        let hash = state
            .next_hashes
            .pop_front()
            .unwrap_or_else(|| format!("0x{:064x}", state.submitted.len() + 1));
        state.submitted.push(hash.clone());

        // keep a block scripted through describe_as before submission
        let block = state.described.get(&hash).and_then(|known| known.block.clone());
        state.described.insert(
            hash.clone(),
            LedgerTransaction {
                hash: hash.clone(),
                block,
                from: transaction.sender(),
                to: transaction.recipient(),
                value: transaction.value(),
            },
        );
        Ok(hash)
    }

    async fn describe(&self, hash: &str) -> GatewayResult<Option<LedgerTransaction>> {
        let state = self.state.lock();
        if state.fail_describe {
            return Err(unavailable());
        }
        Ok(state.described.get(hash).cloned())
    }

    async fn block_exists(&self, block: &BlockRef) -> GatewayResult<bool> {
        let mut state = self.state.lock();
        state.block_exists_calls += 1;
        if state.fail_block_exists {
            return Err(unavailable());
        }
        Ok(state
            .canonical
            .get(&block.number)
            .is_some_and(|hash| hash == &block.hash))
    }
}

use async_trait::async_trait;
use primitive_types::U256;

use crate::blockchain::transaction::{BlockRef, Transaction};
use crate::error::GatewayResult;

/// Current on-ledger view of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub hash: String,
    /// None while the transaction is known but not yet included in a block
    pub block: Option<BlockRef>,
    pub from: String,
    pub to: String,
    pub value: U256,
}

/// Ledger gateway - the only way the service talks to the chain
///
/// Calls may fail with a `GatewayError`. Implementations do not retry;
/// callers defer to their next scheduled attempt.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Latest block number known to the ledger
    async fn current_height(&self) -> GatewayResult<U256>;

    /// Balance of an address as of the latest block
    async fn balance(&self, address: &str) -> GatewayResult<U256>;

    /// Broadcast a prepared transfer and return the ledger-assigned hash.
    /// Inclusion is observed later through `describe`.
    async fn submit(&self, transaction: &Transaction) -> GatewayResult<String>;

    /// Fetch the ledger's view of a transaction.
    /// `Ok(None)` means the ledger does not know the hash.
    async fn describe(&self, hash: &str) -> GatewayResult<Option<LedgerTransaction>>;

    /// True iff the canonical block at `block.number` has exactly `block.hash`.
    async fn block_exists(&self, block: &BlockRef) -> GatewayResult<bool>;
}

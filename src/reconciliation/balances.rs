use primitive_types::U256;
use std::sync::Arc;
use tracing::debug;

use crate::blockchain::{LedgerGateway, Transaction};
use crate::error::AppResult;
use crate::ledger::TransactionStore;

/// Mirrors ledger balances into storage
pub struct BalanceReconciler {
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<dyn TransactionStore>,
}

impl BalanceReconciler {
    pub fn new(gateway: Arc<dyn LedgerGateway>, store: Arc<dyn TransactionStore>) -> Self {
        Self { gateway, store }
    }

    /// Fetch the current balance of `address` and upsert it. Idempotent.
    pub async fn reconcile(&self, address: &str) -> AppResult<U256> {
        let balance = self.gateway.balance(address).await?;
        self.store.upsert_balance(address, &balance).await?;
        debug!("balance of {} is {}", address, balance);
        Ok(balance)
    }

    /// Reconcile sender and recipient. Both are attempted even when one fails;
    /// the first failure is returned.
    pub async fn reconcile_parties(&self, transaction: &Transaction) -> AppResult<()> {
        let sender = transaction.sender();
        let recipient = transaction.recipient();
        let (from, to) = futures::join!(self.reconcile(&sender), self.reconcile(&recipient));
        from?;
        to?;
        Ok(())
    }
}

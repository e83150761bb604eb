use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::blockchain::{LedgerGateway, Transaction};
use crate::error::AppResult;
use crate::ledger::{NewTransaction, TransactionStore};
use crate::reconciliation::balances::BalanceReconciler;
use crate::reconciliation::registry::Registry;

/// Submits transfers to the ledger and hands them over to reconciliation
pub struct Submitter {
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<dyn TransactionStore>,
    registry: Arc<Registry>,
    balances: Arc<BalanceReconciler>,
    reconcile_balances_on_submit: bool,
}

impl Submitter {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        store: Arc<dyn TransactionStore>,
        registry: Arc<Registry>,
        balances: Arc<BalanceReconciler>,
        reconcile_balances_on_submit: bool,
    ) -> Self {
        Self {
            gateway,
            store,
            registry,
            balances,
            reconcile_balances_on_submit,
        }
    }

    /// Submit, describe, persist, register.
    ///
    /// Failing to submit or describe aborts with the error. Failures after
    /// that are logged only: the transaction is on the ledger either way, so
    /// it is returned to the caller. It is registered for reconciliation
    /// only once a row exists for it.
    #[instrument(skip(self, transaction), fields(from = %transaction.sender(), to = %transaction.recipient()))]
    pub async fn submit(&self, transaction: Transaction) -> AppResult<Arc<Transaction>> {
        let hash = self.gateway.submit(&transaction).await?;
        transaction.assign_hash(hash.clone())?;
        info!("📤 Transaction {} submitted", hash);

        match self.gateway.describe(&hash).await? {
            Some(on_ledger) => {
                // created_at is fixed on inclusion, not on submission
                if let Some(block) = on_ledger.block {
                    transaction.set_block(block)?;
                    transaction.fix_created_at(Utc::now());
                }
            }
            None => warn!("⚠️  Transaction {} not yet visible on the ledger", hash),
        }

        let transaction = Arc::new(transaction);
        let persisted = self.persist(&transaction).await;

        if self.reconcile_balances_on_submit {
            if let Err(e) = self.balances.reconcile_parties(&transaction).await {
                error!("❌ Can't update balances for transaction {}: {}", hash, e);
            }
        }

        if persisted {
            self.registry.insert(transaction.clone());
        } else {
            error!(
                "❌ Transaction {} is on the ledger but will not be reconciled",
                hash
            );
        }

        Ok(transaction)
    }

    /// Write the entry row and the withdrawal copy. Returns whether the entry
    /// row, which reconciliation depends on, was written.
    async fn persist(&self, transaction: &Transaction) -> bool {
        let record = match NewTransaction::from_transaction(transaction) {
            Ok(record) => record,
            Err(e) => {
                error!("❌ Can't encode transaction {}: {}", transaction.hash(), e);
                return false;
            }
        };

        let persisted = match self.store.insert_transaction(&record).await {
            Ok(id) => {
                transaction.set_id(id);
                true
            }
            Err(e) => {
                error!("❌ Can't save transaction {}: {}", record.hash, e);
                false
            }
        };

        if let Err(e) = self.store.insert_withdrawal(&record).await {
            error!("❌ Can't save withdrawal {}: {}", record.hash, e);
        }

        persisted
    }
}

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::blockchain::{BlockRef, LedgerGateway, Transaction, TxStatus};
use crate::config::Config;
use crate::error::{AppError, AppResult, StorageError};
use crate::ledger::TransactionStore;
use crate::reconciliation::balances::BalanceReconciler;
use crate::reconciliation::cursor::HeightCursor;
use crate::reconciliation::registry::Registry;

/// Reconciler configuration
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Period of the confirmation sweep
    pub sweep_interval: Duration,
    /// Period of the height refresh
    pub height_interval: Duration,
    /// Success once confirmations are strictly above this
    pub success_confirmations: u64,
}

impl ReconcilerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sweep_interval: config.handler.transaction_interval(),
            height_interval: config.handler.cur_block_interval(),
            success_confirmations: config.confirmation.success_confirmations_amount,
        }
    }
}

/// Tally of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub confirmed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub awaiting_inclusion: usize,
    /// Transactions left untouched this tick because a step failed
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Unchanged,
    Confirmed,
    Succeeded,
    Failed,
    AwaitingInclusion,
}

/// Handles of the two background loops
pub struct ReconcilerHandle {
    pub height: JoinHandle<()>,
    pub sweep: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub fn abort(&self) {
        self.height.abort();
        self.sweep.abort();
    }
}

/// Reconciliation engine - drives pending transactions to Success or Fail
///
/// Two loops run for the lifetime of the process: a height refresh that
/// keeps the shared cursor current, and a confirmation sweep over a
/// snapshot of the registry. Every persisted change is written before the
/// in-memory entity is advanced, so a failed write leaves the transaction
/// as it was and the next tick retries it.
pub struct Reconciler {
    config: ReconcilerConfig,
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<dyn TransactionStore>,
    registry: Arc<Registry>,
    cursor: Arc<HeightCursor>,
    balances: Arc<BalanceReconciler>,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        gateway: Arc<dyn LedgerGateway>,
        store: Arc<dyn TransactionStore>,
        registry: Arc<Registry>,
        cursor: Arc<HeightCursor>,
        balances: Arc<BalanceReconciler>,
    ) -> Self {
        Self {
            config,
            gateway,
            store,
            registry,
            cursor,
            balances,
        }
    }

    /// Read the initial height and reload pending work. Both are fatal on
    /// failure: nothing is served before the cursor and registry are valid.
    pub async fn initialize(&self) -> AppResult<usize> {
        let height = self.gateway.current_height().await?;
        info!("⛓️  Ledger height at startup: {}", height);
        self.cursor.set(height);

        let pending = self
            .store
            .load_pending()
            .await?
            .into_iter()
            .map(|record| record.into_transaction().map(Arc::new))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let loaded = self.registry.extend(pending);
        info!("📥 Loaded {} pending transactions", loaded);
        Ok(loaded)
    }

    /// Spawn the height refresh and the confirmation sweep
    pub fn start(self: &Arc<Self>) -> ReconcilerHandle {
        let height = {
            let reconciler = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(reconciler.config.height_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // the first tick completes immediately; the startup height is already set
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    reconciler.refresh_height().await;
                }
            })
        };

        let sweep = {
            let reconciler = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(reconciler.config.sweep_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let report = reconciler.sweep().await;
                    if report.checked > 0 {
                        info!(
                            "🔄 Sweep checked {}: {} confirmed, {} succeeded, {} failed, {} awaiting inclusion, {} skipped",
                            report.checked,
                            report.confirmed,
                            report.succeeded,
                            report.failed,
                            report.awaiting_inclusion,
                            report.skipped
                        );
                    }
                }
            })
        };

        info!(
            "✓ Reconciler started (sweep every {:?}, height every {:?})",
            self.config.sweep_interval, self.config.height_interval
        );
        ReconcilerHandle { height, sweep }
    }

    /// Overwrite the cursor with the ledger height. On failure the cursor
    /// keeps its last value.
    pub async fn refresh_height(&self) -> bool {
        match self.gateway.current_height().await {
            Ok(height) => {
                debug!("ledger height {}", height);
                self.cursor.set(height);
                true
            }
            Err(e) => {
                error!("❌ Can't get ledger height: {}", e);
                false
            }
        }
    }

    /// One pass over a snapshot of the registry
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        if self.registry.is_empty() {
            return report;
        }
        let mut existing_blocks: HashMap<String, bool> = HashMap::new();

        for (hash, transaction) in self.registry.snapshot() {
            report.checked += 1;
            match self
                .reconcile(&hash, &transaction, &mut existing_blocks)
                .await
            {
                Ok(Outcome::Unchanged) => {}
                Ok(Outcome::Confirmed) => report.confirmed += 1,
                Ok(Outcome::Succeeded) => {
                    report.confirmed += 1;
                    report.succeeded += 1;
                }
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::AwaitingInclusion) => report.awaiting_inclusion += 1,
                Err(e) => {
                    error!("❌ Can't reconcile transaction {}: {}", hash, e);
                    report.skipped += 1;
                }
            }
        }

        report
    }

    async fn reconcile(
        &self,
        hash: &str,
        transaction: &Transaction,
        existing_blocks: &mut HashMap<String, bool>,
    ) -> AppResult<Outcome> {
        if transaction.status().is_terminal() {
            self.registry.remove(hash);
            return Ok(Outcome::Unchanged);
        }

        let id = transaction
            .id()
            .ok_or_else(|| AppError::Internal(format!("transaction {} was never persisted", hash)))?;

        let mut block = transaction.block();
        if block.is_empty() {
            match self.follow_inclusion(id, transaction).await? {
                Some(included) => block = included,
                None => return Ok(Outcome::AwaitingInclusion),
            }
        }

        let exists = match existing_blocks.get(&block.hash) {
            Some(exists) => *exists,
            None => {
                let exists = self.gateway.block_exists(&block).await?;
                existing_blocks.insert(block.hash.clone(), exists);
                exists
            }
        };

        if !exists {
            warn!(
                "⚠️  Block {} #{} of transaction {} left the canonical chain",
                block.hash, block.number, hash
            );
            self.finish(id, hash, transaction, TxStatus::Fail).await?;
            self.refresh_balances(transaction).await;
            return Ok(Outcome::Failed);
        }

        let confirmations = self.cursor.confirmations_since(&block.number);
        let mut outcome = Outcome::Unchanged;
        if confirmations != transaction.confirmations() {
            ensure_updated(self.store.update_confirmations(id, confirmations).await?, id)?;
            transaction.set_confirmations(confirmations);
            self.refresh_balances(transaction).await;
            outcome = Outcome::Confirmed;
        }

        if confirmations > self.config.success_confirmations {
            self.finish(id, hash, transaction, TxStatus::Success).await?;
            if outcome == Outcome::Unchanged {
                self.refresh_balances(transaction).await;
            }
            info!(
                "✅ Transaction {} confirmed with {} confirmations",
                hash, confirmations
            );
            return Ok(Outcome::Succeeded);
        }

        Ok(outcome)
    }

    /// Ask the ledger whether a not-yet-included transaction has landed.
    async fn follow_inclusion(
        &self,
        id: i64,
        transaction: &Transaction,
    ) -> AppResult<Option<BlockRef>> {
        let Some(on_ledger) = self.gateway.describe(&transaction.hash()).await? else {
            debug!("transaction {} unknown to the ledger", transaction.hash());
            return Ok(None);
        };
        let Some(block) = on_ledger.block else {
            return Ok(None);
        };

        let created_at = transaction.created_at().unwrap_or_else(Utc::now);
        ensure_updated(self.store.update_block(id, &block, created_at).await?, id)?;
        transaction.set_block(block.clone())?;
        transaction.fix_created_at(created_at);

        debug!(
            "transaction {} included in block {} #{}",
            transaction.hash(),
            block.hash,
            block.number
        );
        Ok(Some(block))
    }

    /// Persist a terminal status, then apply it and deregister.
    async fn finish(
        &self,
        id: i64,
        hash: &str,
        transaction: &Transaction,
        status: TxStatus,
    ) -> AppResult<()> {
        ensure_updated(self.store.update_status(id, status).await?, id)?;
        transaction.set_status(status)?;
        self.registry.remove(hash);
        Ok(())
    }

    async fn refresh_balances(&self, transaction: &Transaction) {
        if let Err(e) = self.balances.reconcile_parties(transaction).await {
            error!(
                "❌ Can't update balances for transaction {}: {}",
                transaction.hash(),
                e
            );
        }
    }
}

fn ensure_updated(updated: bool, id: i64) -> Result<(), StorageError> {
    if updated {
        Ok(())
    } else {
        Err(StorageError::MissingRow(id))
    }
}

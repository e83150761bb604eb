use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primitive_types::U256;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::models::*;
use super::repository::{confirmations_to_i64, TransactionStore};
use crate::blockchain::hex;
use crate::blockchain::transaction::{BlockRef, TxStatus};
use crate::error::{StorageError, StorageResult};

/// In-memory store with switchable failures, used by tests
pub struct MemoryStore {
    rows: RwLock<BTreeMap<i64, TransactionRecord>>,
    withdrawals: RwLock<Vec<NewTransaction>>,
    balances: RwLock<HashMap<String, String>>,
    balance_writes: RwLock<Vec<String>>,
    shown_pages: RwLock<Vec<Vec<i64>>>,
    page_size: usize,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            withdrawals: RwLock::new(Vec::new()),
            balances: RwLock::new(HashMap::new()),
            balance_writes: RwLock::new(Vec::new()),
            shown_pages: RwLock::new(Vec::new()),
            page_size,
            fail_inserts: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub async fn row(&self, id: i64) -> Option<TransactionRecord> {
        self.rows.read().await.get(&id).cloned()
    }

    pub async fn rows(&self) -> Vec<TransactionRecord> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn withdrawals(&self) -> Vec<NewTransaction> {
        self.withdrawals.read().await.clone()
    }

    pub async fn balance(&self, address: &str) -> Option<String> {
        self.balances.read().await.get(&address.to_lowercase()).cloned()
    }

    /// Addresses in the order their balances were written
    pub async fn balance_writes(&self) -> Vec<String> {
        self.balance_writes.read().await.clone()
    }

    pub async fn shown_pages(&self) -> Vec<Vec<i64>> {
        self.shown_pages.read().await.clone()
    }

    /// Seed a persisted row directly, as a previous process run would have left it.
    pub async fn seed(&self, record: TransactionRecord) {
        self.rows.write().await.insert(record.id, record);
    }

    fn check(&self, flag: &AtomicBool) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn update_row<F>(&self, id: i64, apply: F) -> StorageResult<bool>
    where
        F: FnOnce(&mut TransactionRecord) + Send,
    {
        self.check(&self.fail_updates)?;
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(row) => {
                apply(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, record: &NewTransaction) -> StorageResult<i64> {
        self.check(&self.fail_inserts)?;
        let mut rows = self.rows.write().await;
        let id = rows.keys().next_back().map_or(1, |last| last + 1);
        rows.insert(
            id,
            TransactionRecord {
                id,
                hash: record.hash.clone(),
                block_hash: record.block_hash.clone(),
                block_number: record.block_number.clone(),
                from_addr: record.from_addr.clone(),
                to_addr: record.to_addr.clone(),
                confirmations: 0,
                amount: record.amount.clone(),
                status: TxStatus::Pending,
                created_at: record.created_at,
                showed: false,
            },
        );
        Ok(id)
    }

    async fn insert_withdrawal(&self, record: &NewTransaction) -> StorageResult<()> {
        self.check(&self.fail_inserts)?;
        self.withdrawals.write().await.push(record.clone());
        Ok(())
    }

    async fn update_confirmations(&self, id: i64, confirmations: u64) -> StorageResult<bool> {
        let confirmations = confirmations_to_i64(confirmations)?;
        self.update_row(id, |row| row.confirmations = confirmations)
            .await
    }

    async fn update_status(&self, id: i64, status: TxStatus) -> StorageResult<bool> {
        self.update_row(id, |row| row.status = status).await
    }

    async fn update_block(
        &self,
        id: i64,
        block: &BlockRef,
        created_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let number = quantity_to_decimal(&block.number)?;
        let hash = block.hash.clone();
        self.update_row(id, |row| {
            row.block_hash = hash;
            row.block_number = number;
            row.created_at.get_or_insert(created_at);
        })
        .await
    }

    async fn upsert_balance(&self, address: &str, amount: &U256) -> StorageResult<()> {
        self.check(&self.fail_updates)?;
        let address = address.to_lowercase();
        self.balances
            .write()
            .await
            .insert(address.clone(), hex::quantity_to_hex(amount));
        self.balance_writes.write().await.push(address);
        Ok(())
    }

    async fn load_by_status(&self, status: TxStatus) -> StorageResult<Vec<TransactionRecord>> {
        self.check(&self.fail_loads)?;
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| row.status == status)
            .cloned()
            .collect())
    }

    async fn load_recent(&self, confirmations_below: u64) -> StorageResult<Vec<TransactionRecord>> {
        self.check(&self.fail_loads)?;
        let below = confirmations_to_i64(confirmations_below)?;
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|row| !row.showed || row.confirmations < below)
            .cloned()
            .collect())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn mark_shown_page(&self, ids: &[i64]) -> StorageResult<u64> {
        self.check(&self.fail_updates)?;
        self.shown_pages.write().await.push(ids.to_vec());
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                row.showed = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::BigDecimal;

    fn new_transaction(hash: &str) -> NewTransaction {
        NewTransaction {
            hash: hash.to_string(),
            block_hash: "0xbbb".to_string(),
            block_number: BigDecimal::from(50),
            from_addr: "0xa".to_string(),
            to_addr: "0xb".to_string(),
            amount: "0x64".to_string(),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_mark_shown_is_paginated() {
        let store = MemoryStore::new(2);
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.insert_transaction(&new_transaction(&format!("0x{}", i))).await.unwrap());
        }

        let updated = store.mark_shown(&ids).await.unwrap();
        assert_eq!(updated, 5);
        assert_eq!(store.shown_pages().await, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert!(store.rows().await.iter().all(|row| row.showed));
    }

    #[tokio::test]
    async fn test_load_recent_filters_shown_and_confirmed() {
        let store = MemoryStore::new(10);
        let fresh = store.insert_transaction(&new_transaction("0x1")).await.unwrap();
        let shallow = store.insert_transaction(&new_transaction("0x2")).await.unwrap();
        let deep = store.insert_transaction(&new_transaction("0x3")).await.unwrap();

        store.mark_shown(&[shallow, deep]).await.unwrap();
        store.update_confirmations(shallow, 1).await.unwrap();
        store.update_confirmations(deep, 9).await.unwrap();

        let recent: Vec<i64> = store.load_recent(3).await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(recent, vec![fresh, shallow]);
    }

    #[tokio::test]
    async fn test_updates_report_missing_rows() {
        let store = MemoryStore::new(10);
        assert!(!store.update_status(42, TxStatus::Fail).await.unwrap());
        assert!(!store.update_confirmations(42, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_balance_is_idempotent() {
        let store = MemoryStore::new(10);
        let amount = U256::from(255u32);
        store.upsert_balance("0xABC", &amount).await.unwrap();
        store.upsert_balance("0xabc", &amount).await.unwrap();

        assert_eq!(store.balance("0xabc").await, Some("0xff".to_string()));
        assert_eq!(store.balances.read().await.len(), 1);
    }
}

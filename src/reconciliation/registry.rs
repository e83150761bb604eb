use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::Transaction;

/// Pending transactions under reconciliation, keyed by hash.
///
/// Only pending transactions are admitted; the sweep removes an entry as
/// soon as its transaction reaches a terminal status.
#[derive(Default)]
pub struct Registry {
    transactions: RwLock<HashMap<String, Arc<Transaction>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `transaction`. Returns false for terminal transactions, which
    /// are never admitted.
    pub fn insert(&self, transaction: Arc<Transaction>) -> bool {
        if transaction.status().is_terminal() {
            return false;
        }
        self.transactions
            .write()
            .insert(transaction.hash(), transaction);
        true
    }

    /// Track every pending transaction of `transactions`, returning how many were admitted
    pub fn extend<I>(&self, transactions: I) -> usize
    where
        I: IntoIterator<Item = Arc<Transaction>>,
    {
        let mut map = self.transactions.write();
        let mut admitted = 0;
        for transaction in transactions {
            if transaction.status().is_terminal() {
                continue;
            }
            map.insert(transaction.hash(), transaction);
            admitted += 1;
        }
        admitted
    }

    pub fn remove(&self, hash: &str) -> Option<Arc<Transaction>> {
        self.transactions.write().remove(hash)
    }

    #[cfg(test)]
    pub fn get(&self, hash: &str) -> Option<Arc<Transaction>> {
        self.transactions.read().get(hash).cloned()
    }

    #[cfg(test)]
    pub fn contains(&self, hash: &str) -> bool {
        self.transactions.read().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// Copy of the current entries. Iterating the copy never holds the lock,
    /// so submissions can keep registering while a sweep is running.
    pub fn snapshot(&self) -> Vec<(String, Arc<Transaction>)> {
        self.transactions
            .read()
            .iter()
            .map(|(hash, tx)| (hash.clone(), tx.clone()))
            .collect()
    }
}

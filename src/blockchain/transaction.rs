use chrono::{DateTime, Utc};
use primitive_types::U256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;

use crate::blockchain::hex;
use crate::error::TransactionError;

/// Transaction lifecycle status
///
/// Pending → Success | Fail. Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Fail,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Fail => "fail",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to the block currently containing a transaction.
/// Empty (zero number, empty hash) until the ledger reports inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub number: U256,
    pub hash: String,
}

impl BlockRef {
    pub fn new(number: U256, hash: impl Into<String>) -> Self {
        Self {
            number,
            hash: hash.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_empty()
    }
}

/// Plain copy of every field of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSnapshot {
    pub id: Option<i64>,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: U256,
    pub block: BlockRef,
    pub confirmations: u64,
    pub status: TxStatus,
    pub created_at: Option<DateTime<Utc>>,
}

/// One value transfer and its lifecycle state.
///
/// Shared between the request path and the reconciliation tasks behind an
/// `Arc`. Every accessor takes the entity lock for the duration of that single
/// call only, so each field is read and written atomically. Sequences of calls
/// are not atomic; callers re-read instead of caching values across awaits.
#[derive(Debug)]
pub struct Transaction {
    state: RwLock<TransactionSnapshot>,
}

impl Transaction {
    /// Validate parties and amount and build a not yet submitted transaction.
    pub fn create(from: &str, to: &str, value: &str) -> Result<Self, TransactionError> {
        if !hex::is_hex_address(from) {
            return Err(TransactionError::InvalidAddress(from.to_string()));
        }
        if !hex::is_hex_address(to) {
            return Err(TransactionError::InvalidAddress(to.to_string()));
        }
        let value = hex::hex_to_quantity(value)
            .ok_or_else(|| TransactionError::InvalidAmount(value.to_string()))?;

        Ok(Self::restore(TransactionSnapshot {
            id: None,
            hash: String::new(),
            from: hex::normalize_address(from),
            to: hex::normalize_address(to),
            value,
            block: BlockRef::default(),
            confirmations: 0,
            status: TxStatus::Pending,
            created_at: None,
        }))
    }

    /// Rebuild an entity from previously persisted state.
    pub fn restore(snapshot: TransactionSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> TransactionSnapshot {
        self.state.read().clone()
    }

    pub fn id(&self) -> Option<i64> {
        self.state.read().id
    }

    pub fn set_id(&self, id: i64) {
        self.state.write().id = Some(id);
    }

    pub fn hash(&self) -> String {
        self.state.read().hash.clone()
    }

    /// Record the ledger-assigned hash. The hash never changes once set.
    pub fn assign_hash(&self, hash: impl Into<String>) -> Result<(), TransactionError> {
        let hash = hash.into();
        let mut state = self.state.write();
        if !state.hash.is_empty() && state.hash != hash {
            return Err(TransactionError::HashAlreadyAssigned(state.hash.clone()));
        }
        state.hash = hash;
        Ok(())
    }

    pub fn sender(&self) -> String {
        self.state.read().from.clone()
    }

    pub fn recipient(&self) -> String {
        self.state.read().to.clone()
    }

    pub fn value(&self) -> U256 {
        self.state.read().value
    }

    pub fn block(&self) -> BlockRef {
        self.state.read().block.clone()
    }

    /// Replace the containing block. Only allowed while pending.
    pub fn set_block(&self, block: BlockRef) -> Result<(), TransactionError> {
        let mut state = self.state.write();
        if state.status.is_terminal() {
            return Err(TransactionError::BlockFrozen(state.status));
        }
        state.block = block;
        Ok(())
    }

    pub fn confirmations(&self) -> u64 {
        self.state.read().confirmations
    }

    pub fn set_confirmations(&self, confirmations: u64) {
        self.state.write().confirmations = confirmations;
    }

    pub fn status(&self) -> TxStatus {
        self.state.read().status
    }

    /// Move the status forward. Any change out of a terminal status is refused.
    pub fn set_status(&self, status: TxStatus) -> Result<(), TransactionError> {
        let mut state = self.state.write();
        if state.status.is_terminal() && state.status != status {
            return Err(TransactionError::TerminalStatus(state.status));
        }
        state.status = status;
        Ok(())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().created_at
    }

    /// Fix the ledger-observed creation time. Returns false when it was
    /// already fixed, in which case nothing changes.
    pub fn fix_created_at(&self, at: DateTime<Utc>) -> bool {
        let mut state = self.state.write();
        if state.created_at.is_some() {
            return false;
        }
        state.created_at = Some(at);
        true
    }
}

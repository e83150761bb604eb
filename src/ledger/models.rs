use chrono::{DateTime, Utc};
use primitive_types::U256;
use sqlx::prelude::FromRow;
use sqlx::types::BigDecimal;
use std::str::FromStr;

use crate::blockchain::hex;
use crate::blockchain::transaction::{BlockRef, Transaction, TransactionSnapshot, TxStatus};
use crate::error::{StorageError, StorageResult};

/// Row of `transactions_entry`
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub hash: String,
    pub block_hash: String,
    pub block_number: BigDecimal,
    pub from_addr: String,
    pub to_addr: String,
    pub confirmations: i64,
    /// Hex quantity
    pub amount: String,
    pub status: TxStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub showed: bool,
}

impl TransactionRecord {
    /// Rebuild the in-memory entity, e.g. when reloading pending work at startup.
    pub fn into_transaction(self) -> StorageResult<Transaction> {
        let value = hex::hex_to_quantity(&self.amount).ok_or_else(|| {
            StorageError::Encoding(format!("can't parse amount `{}` of #{}", self.amount, self.id))
        })?;
        let confirmations = u64::try_from(self.confirmations).map_err(|_| {
            StorageError::Encoding(format!(
                "negative confirmations {} of #{}",
                self.confirmations, self.id
            ))
        })?;

        Ok(Transaction::restore(TransactionSnapshot {
            id: Some(self.id),
            hash: self.hash,
            from: self.from_addr,
            to: self.to_addr,
            value,
            block: BlockRef::new(decimal_to_quantity(&self.block_number)?, self.block_hash),
            confirmations,
            status: self.status,
            created_at: self.created_at,
        }))
    }
}

/// Values written when a transaction is first persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub hash: String,
    pub block_hash: String,
    pub block_number: BigDecimal,
    pub from_addr: String,
    pub to_addr: String,
    pub amount: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewTransaction {
    pub fn from_transaction(transaction: &Transaction) -> StorageResult<Self> {
        let snapshot = transaction.snapshot();
        Ok(Self {
            hash: snapshot.hash,
            block_hash: snapshot.block.hash,
            block_number: quantity_to_decimal(&snapshot.block.number)?,
            from_addr: snapshot.from,
            to_addr: snapshot.to,
            amount: hex::quantity_to_hex(&snapshot.value),
            created_at: snapshot.created_at,
        })
    }
}

pub fn quantity_to_decimal(value: &U256) -> StorageResult<BigDecimal> {
    BigDecimal::from_str(&value.to_string())
        .map_err(|e| StorageError::Encoding(format!("can't encode {}: {}", value, e)))
}

pub fn decimal_to_quantity(value: &BigDecimal) -> StorageResult<U256> {
    U256::from_dec_str(&value.with_scale(0).to_string())
        .map_err(|e| StorageError::Encoding(format!("can't decode {} as block number: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TransactionRecord {
        TransactionRecord {
            id: 7,
            hash: "0xh1".to_string(),
            block_hash: "0xbbb".to_string(),
            block_number: BigDecimal::from(50),
            from_addr: "0xa000000000000000000000000000000000000001".to_string(),
            to_addr: "0xb000000000000000000000000000000000000002".to_string(),
            confirmations: 3,
            amount: "0x64".to_string(),
            status: TxStatus::Pending,
            created_at: Some(Utc::now()),
            showed: false,
        }
    }

    #[test]
    fn test_record_into_transaction() {
        let tx = record().into_transaction().unwrap();
        assert_eq!(tx.id(), Some(7));
        assert_eq!(tx.hash(), "0xh1");
        assert_eq!(tx.block(), BlockRef::new(U256::from(50u32), "0xbbb"));
        assert_eq!(tx.value(), U256::from(100u32));
        assert_eq!(tx.confirmations(), 3);
        assert_eq!(tx.status(), TxStatus::Pending);
    }

    #[test]
    fn test_bad_rows_are_encoding_errors() {
        let mut bad_amount = record();
        bad_amount.amount = "lots".to_string();
        assert!(matches!(bad_amount.into_transaction(), Err(StorageError::Encoding(_))));

        let mut negative = record();
        negative.confirmations = -1;
        assert!(matches!(negative.into_transaction(), Err(StorageError::Encoding(_))));

        let mut negative_block = record();
        negative_block.block_number = BigDecimal::from(-5);
        assert!(matches!(negative_block.into_transaction(), Err(StorageError::Encoding(_))));
    }

    #[test]
    fn test_new_transaction_keeps_large_block_numbers() {
        let big = U256::from(u64::MAX) * U256::from(1000u32);
        let tx = record().into_transaction().unwrap();
        tx.set_block(BlockRef::new(big, "0xccc")).unwrap();

        let new = NewTransaction::from_transaction(&tx).unwrap();
        assert_eq!(new.amount, "0x64");
        assert_eq!(new.block_hash, "0xccc");
        assert_eq!(decimal_to_quantity(&new.block_number).unwrap(), big);
    }
}

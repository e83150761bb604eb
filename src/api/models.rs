use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::blockchain::hex;
use crate::ledger::TransactionRecord;

/// `created_at` layout of `/GetLast`, e.g. `Monday, 02-Jan-06 15:04:05 UTC`
const RFC850_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S UTC";

// ========== REQUEST MODELS ==========

/// Query of `GET /SendEth`
#[derive(Debug, Deserialize, Validate)]
pub struct SendEthQuery {
    #[serde(default)]
    #[validate(custom = "validate_address")]
    pub from: String,

    #[serde(default)]
    #[validate(custom = "validate_address")]
    pub to: String,

    /// Hex quantity in wei
    #[serde(default)]
    #[validate(custom = "validate_amount")]
    pub amount: String,
}

fn validate_address(address: &str) -> Result<(), ValidationError> {
    if hex::is_hex_address(address) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_address"))
    }
}

fn validate_amount(amount: &str) -> Result<(), ValidationError> {
    if hex::hex_to_quantity(amount).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_amount"))
    }
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Entry of `GET /GetLast`
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LastTransaction {
    pub date: String,
    /// Receiving address
    pub address: String,
    pub amount: String,
    pub confirmations: i64,
}

impl From<TransactionRecord> for LastTransaction {
    fn from(record: TransactionRecord) -> Self {
        Self {
            date: record.created_at.map(format_rfc850).unwrap_or_default(),
            address: record.to_addr,
            amount: record.amount,
            confirmations: record.confirmations,
        }
    }
}

pub fn format_rfc850(at: DateTime<Utc>) -> String {
    at.format(RFC850_FORMAT).to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Last observed ledger height, decimal
    pub height: String,
    pub pending_transactions: usize,
}

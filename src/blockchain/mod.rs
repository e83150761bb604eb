// Ledger access: entity, gateway contract and the JSON-RPC client
pub mod eth;
pub mod gateway;
pub mod hex;
pub mod transaction;

#[cfg(test)]
pub mod mock;

pub use eth::EthRpcClient;
pub use gateway::LedgerGateway;
pub use transaction::{BlockRef, Transaction, TxStatus};

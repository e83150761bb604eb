// Persistence of tracked transactions and balances
pub mod models;
pub mod repository;

#[cfg(test)]
pub mod memory;

pub use models::{NewTransaction, TransactionRecord};
pub use repository::{PgStore, TransactionStore};

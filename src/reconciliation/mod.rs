// Reconciliation engine: pending registry, height cursor, sweep and submission
pub mod balances;
pub mod cursor;
pub mod engine;
pub mod registry;
pub mod submission;

pub use balances::BalanceReconciler;
pub use cursor::HeightCursor;
pub use engine::{Reconciler, ReconcilerConfig};
pub use registry::Registry;
pub use submission::Submitter;

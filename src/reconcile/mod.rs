pub mod error;
#[cfg(test)]
pub mod fake;
pub mod log;
pub mod models;
pub mod sqlite;

pub use error::ReconcileLogError;
#[cfg(test)]
pub use fake::FakeReconciliationLog;
pub use log::ReconciliationLog;
pub use models::{InconsistencyKind, ReconciliationItem};
pub use sqlite::SqliteReconciliationLog;

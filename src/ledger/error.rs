//! Ledger error types.

use thiserror::Error;

/// A failure of the durable ledger.
///
/// Ledger errors are never swallowed: callers decide whether the failure
/// aborts a single candidate or a whole pass. A duplicate key is not an
/// error; see [`InsertOutcome`](super::InsertOutcome).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The database directory could not be prepared.
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite rejected an operation.
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored row could not be decoded.
    #[error("corrupt ledger row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },
}

impl LedgerError {
    pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::CorruptRow {
            table,
            reason: reason.into(),
        }
    }
}

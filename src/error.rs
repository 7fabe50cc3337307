//! Defines the crate level error type and its mapping from SQLite errors.

use rusqlite::ErrorCode;

use crate::cents::Cents;

/// The errors that may occur while operating on the ledger.
///
/// Every variant is recoverable at the ledger boundary: no operation
/// leaves the database or any cached balance in a partially updated
/// state.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty string was used to create an account name.
    #[error("account name cannot be empty")]
    EmptyAccountName,

    /// A non-positive (or overflowing) amount was requested for a deposit
    /// or withdrawal. The operation was rejected without touching the
    /// account.
    #[error("amount must be a positive number of cents, got {0}")]
    InvalidAmount(Cents),

    /// A withdrawal was requested for more than the account holds.
    ///
    /// Withdrawals are never allowed to drive a balance negative.
    #[error("cannot withdraw {requested} cents, only {available} cents available")]
    InsufficientFunds {
        /// The amount the caller asked to withdraw.
        requested: Cents,
        /// The committed balance at the time of the request.
        available: Cents,
    },

    /// An operation referenced an account name with no stored row.
    #[error("no account named \"{0}\"")]
    AccountNotFound(String),

    /// Recording an update kept colliding on its history key even after
    /// retrying with freshly generated timestamps.
    ///
    /// The update was rolled back in full and can be retried by the
    /// caller.
    #[error("could not record the update after repeated history key collisions")]
    StorageConflict,

    /// The database was busy or locked for longer than the busy timeout.
    #[error("the database is busy or locked")]
    StorageUnavailable,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(sql_error, _)
                if matches!(
                    sql_error.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Error::StorageUnavailable
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

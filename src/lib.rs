//! Passbook is a durable, single-database account ledger.
//!
//! It keeps named accounts with integer-cent balances and an append-only
//! transaction history in SQLite. Every balance change is committed
//! atomically with its history entry, so the committed balance always
//! equals the opening balance plus the sum of the recorded amounts — even
//! when an update fails partway through.
//!
//! [Ledger] is the entry point: construct one over an owned
//! [rusqlite::Connection], then open accounts and move money through it or
//! through the [AccountHandle]s it returns.

#![warn(missing_docs)]

mod account;
mod cents;
mod clock;
mod db;
mod error;
mod history;
mod ledger;

pub use account::{Account, AccountHandle, AccountName};
pub use cents::Cents;
pub use clock::Clock;
pub use db::initialize;
pub use error::Error;
pub use history::HistoryEntry;
pub use ledger::{Ledger, LedgerAudit};

//! Core history domain types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{account::AccountName, cents::Cents};

/// One committed balance change.
///
/// Entries are append-only and immutable: together they are the source of
/// truth for an account's balance. The amount is positive for a deposit
/// and negative for a withdrawal, and the pair `(timestamp, account)`
/// uniquely identifies an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The UTC instant the change was committed.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// The account the change applies to.
    pub account: AccountName,
    /// The signed change in minor units.
    pub amount: Cents,
}

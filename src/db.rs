//! Schema bootstrap for the ledger database.

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{account::create_accounts_table, error::Error, history::create_history_table};

/// Create the ledger tables if they do not exist.
///
/// Both tables are created within one exclusive transaction so concurrent
/// processes opening the same database file cannot observe a
/// half-initialized schema.
///
/// # Errors
/// Returns an error if the schema statements fail.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = Transaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_accounts_table(&transaction)?;
    create_history_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn creates_schema_in_memory() {
        let connection = Connection::open_in_memory().unwrap();

        assert_eq!(Ok(()), initialize(&connection));
    }

    #[test]
    fn is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert_eq!(Ok(()), initialize(&connection));
    }
}

//! Database operations for the append-only history relation.

use rusqlite::{Connection, Row};

use crate::{account::AccountName, cents::Cents, error::Error, history::HistoryEntry};

/// Initialize the history table and indexes.
///
/// Rows are only ever inserted. The composite primary key assumes at most
/// one event per account per timestamp; the ledger's update protocol
/// regenerates the timestamp when that assumption is violated.
pub fn create_history_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS history (
            timestamp TEXT NOT NULL,
            account_name TEXT NOT NULL,
            amount INTEGER NOT NULL,
            PRIMARY KEY (timestamp, account_name),
            FOREIGN KEY (account_name) REFERENCES accounts (name)
        );

        CREATE INDEX IF NOT EXISTS idx_history_account_name ON history (account_name);",
    )?;

    Ok(())
}

/// Append one history row.
///
/// Returns the raw SQLite error so callers can tell a history key
/// collision (see [is_timestamp_collision]) apart from other failures.
pub fn record_entry(entry: &HistoryEntry, connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO history (timestamp, account_name, amount) VALUES (?1, ?2, ?3);",
        (entry.timestamp, entry.account.as_ref(), entry.amount),
    )?;

    Ok(())
}

/// Whether `error` is a uniqueness violation on the history primary key.
///
/// Extended result code 1555 is a primary key constraint failure and 2067
/// a unique constraint failure; the description names the table columns.
pub fn is_timestamp_collision(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(sql_error, Some(desc))
            if (sql_error.extended_code == 1555 || sql_error.extended_code == 2067)
                && desc.contains("history.")
    )
}

/// Retrieve an account's history entries in commit order.
pub fn entries_for_account(
    name: &str,
    connection: &Connection,
) -> Result<Vec<HistoryEntry>, Error> {
    connection
        .prepare(
            "SELECT timestamp, account_name, amount FROM history
             WHERE account_name = ?1
             ORDER BY timestamp ASC;",
        )?
        .query_map([name], map_row)?
        .map(|maybe_entry| maybe_entry.map_err(|error| error.into()))
        .collect()
}

/// Sum an account's history amounts.
pub fn sum_for_account(name: &str, connection: &Connection) -> Result<Cents, Error> {
    let mut stmt = connection
        .prepare("SELECT COALESCE(SUM(amount), 0) FROM history WHERE account_name = ?1;")?;

    let total: Cents = stmt.query_row([name], |row| row.get(0))?;

    Ok(total)
}

/// Count an account's history entries.
pub fn count_for_account(name: &str, connection: &Connection) -> Result<u64, Error> {
    let mut stmt = connection.prepare("SELECT COUNT(*) FROM history WHERE account_name = ?1;")?;

    let count: i64 = stmt.query_row([name], |row| row.get(0))?;

    Ok(count as u64)
}

fn map_row(row: &Row) -> Result<HistoryEntry, rusqlite::Error> {
    let timestamp = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let amount = row.get(2)?;

    Ok(HistoryEntry {
        timestamp,
        account: AccountName::new_unchecked(&raw_name),
        amount,
    })
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_history_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_history_table(&connection));
    }
}

#[cfg(test)]
mod history_query_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{account::AccountName, history::HistoryEntry};

    use super::{
        count_for_account, create_history_table, entries_for_account, is_timestamp_collision,
        record_entry, sum_for_account,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        // These unit tests exercise the history layer in isolation, without
        // the accounts table the history foreign key references. The bundled
        // SQLite is compiled with SQLITE_DEFAULT_FOREIGN_KEYS=1, so disable
        // enforcement on this standalone connection (production connections,
        // which create both tables, keep it on).
        connection
            .execute_batch("PRAGMA foreign_keys = OFF;")
            .expect("Could not disable foreign key enforcement");
        create_history_table(&connection).expect("Could not create history table");
        connection
    }

    fn entry_at_minute(minute: u8, amount: i64) -> HistoryEntry {
        HistoryEntry {
            timestamp: datetime!(2024-08-07 12:00:00 UTC) + time::Duration::minutes(minute as i64),
            account: AccountName::new_unchecked("alice"),
            amount,
        }
    }

    #[test]
    fn record_and_list_round_trips_in_commit_order() {
        let connection = get_test_db_connection();
        let first = entry_at_minute(0, 2_500);
        let second = entry_at_minute(1, -1_000);

        record_entry(&first, &connection).unwrap();
        record_entry(&second, &connection).unwrap();

        let entries = entries_for_account("alice", &connection).unwrap();
        assert_eq!(entries, vec![first, second]);
    }

    #[test]
    fn list_is_empty_for_account_with_no_entries() {
        let connection = get_test_db_connection();

        let entries = entries_for_account("alice", &connection).unwrap();

        assert_eq!(entries, vec![]);
    }

    #[test]
    fn sum_adds_signed_amounts() {
        let connection = get_test_db_connection();
        record_entry(&entry_at_minute(0, 2_500), &connection).unwrap();
        record_entry(&entry_at_minute(1, -1_000), &connection).unwrap();

        assert_eq!(sum_for_account("alice", &connection), Ok(1_500));
    }

    #[test]
    fn sum_is_zero_for_account_with_no_entries() {
        let connection = get_test_db_connection();

        assert_eq!(sum_for_account("alice", &connection), Ok(0));
    }

    #[test]
    fn count_reports_number_of_entries() {
        let connection = get_test_db_connection();
        record_entry(&entry_at_minute(0, 100), &connection).unwrap();
        record_entry(&entry_at_minute(1, 100), &connection).unwrap();

        assert_eq!(count_for_account("alice", &connection), Ok(2));
    }

    #[test]
    fn duplicate_key_is_reported_as_timestamp_collision() {
        let connection = get_test_db_connection();
        let entry = entry_at_minute(0, 100);
        record_entry(&entry, &connection).unwrap();

        let error = record_entry(&entry, &connection).unwrap_err();

        assert!(
            is_timestamp_collision(&error),
            "expected a history key collision, got: {error}"
        );
    }

    #[test]
    fn same_timestamp_for_different_accounts_is_not_a_collision() {
        let connection = get_test_db_connection();
        let entry = entry_at_minute(0, 100);
        let other = HistoryEntry {
            account: AccountName::new_unchecked("bob"),
            ..entry.clone()
        };

        record_entry(&entry, &connection).unwrap();

        assert_eq!(record_entry(&other, &connection), Ok(()));
    }
}

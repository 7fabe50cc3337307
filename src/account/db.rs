//! Database operations for accounts.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    account::{Account, AccountName},
    cents::Cents,
    error::Error,
};

/// Initialize the accounts table.
pub fn create_accounts_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            name TEXT PRIMARY KEY NOT NULL,
            balance INTEGER NOT NULL
        );",
    )?;

    Ok(())
}

/// Insert a new account row and return it.
///
/// # Errors
/// Returns an error if the name already exists or on any other SQL error.
pub fn insert_account(
    name: &AccountName,
    opening_balance: Cents,
    connection: &Connection,
) -> Result<Account, Error> {
    connection.execute(
        "INSERT INTO accounts (name, balance) VALUES (?1, ?2);",
        (name.as_ref(), opening_balance),
    )?;

    Ok(Account {
        name: name.clone(),
        balance: opening_balance,
    })
}

/// Retrieve an account row by name, or `None` if the name has never been
/// opened.
pub fn get_account(name: &str, connection: &Connection) -> Result<Option<Account>, Error> {
    connection
        .prepare("SELECT name, balance FROM accounts WHERE name = ?1;")?
        .query_row([name], map_row)
        .optional()
        .map_err(|error| error.into())
}

/// Set an account's balance. Returns an error if the account doesn't exist.
pub fn update_balance(
    name: &str,
    new_balance: Cents,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE accounts SET balance = ?1 WHERE name = ?2;",
        (new_balance, name),
    )?;

    if rows_affected == 0 {
        return Err(Error::AccountNotFound(name.to_string()));
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let raw_name: String = row.get(0)?;
    let name = AccountName::new_unchecked(&raw_name);

    Ok(Account {
        name,
        balance: row.get(1)?,
    })
}

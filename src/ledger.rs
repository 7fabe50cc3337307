//! The ledger: sole owner of account creation, balance mutation, and
//! balance queries.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;

use crate::{
    account::{AccountHandle, AccountName, get_account, insert_account, update_balance},
    cents::Cents,
    clock::Clock,
    db::initialize,
    error::Error,
    history::{
        HistoryEntry, count_for_account, entries_for_account, is_timestamp_collision, record_entry,
        sum_for_account,
    },
};

/// How long a storage operation may wait on a busy database before failing
/// with [Error::StorageUnavailable].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// How many freshly generated timestamps to try when recording an update
/// collides on the history key.
const MAX_TIMESTAMP_RETRIES: u32 = 3;

/// The authoritative owner of account and history state.
///
/// Every balance change goes through the atomic update protocol: the
/// account row and its history row are written in one SQLite transaction,
/// and the new balance is only reported to callers after that transaction
/// commits. On any failure the transaction rolls back in full, so the
/// committed balance always equals the account's opening balance plus the
/// sum of its history amounts.
///
/// The ledger is cheap to clone; clones share one database connection and
/// one clock and may be used from multiple threads.
#[derive(Debug, Clone)]
pub struct Ledger {
    connection: Arc<Mutex<Connection>>,
    clock: Arc<Clock>,
}

impl Ledger {
    /// Create a ledger that owns `connection`.
    ///
    /// This installs the ledger schema (if missing) and a busy timeout so
    /// a database file locked by another process cannot block callers
    /// indefinitely.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be initialized.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        Self::with_clock(connection, Clock::new())
    }

    fn with_clock(connection: Connection, clock: Clock) -> Result<Self, Error> {
        connection.busy_timeout(BUSY_TIMEOUT)?;
        initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            clock: Arc::new(clock),
        })
    }

    /// Open the account `name`, creating it with `opening_balance` if it
    /// does not exist yet.
    ///
    /// Creation is idempotent by name: opening an existing account is a
    /// no-op that returns the stored account unchanged, with the flag set
    /// to `true` so front ends can report "already exists" instead of
    /// pretending a new account was created. A newly created account has
    /// no history.
    ///
    /// # Errors
    /// Returns [Error::EmptyAccountName] if `name` is empty or only
    /// whitespace.
    pub fn open_or_create(
        &self,
        name: &str,
        opening_balance: Cents,
    ) -> Result<(AccountHandle, bool), Error> {
        let name = AccountName::new(name)?;

        let (account, found) = {
            let connection = self.connection.lock().unwrap();
            let transaction = connection.unchecked_transaction()?;

            let (account, found) = match get_account(name.as_ref(), &transaction)? {
                Some(existing) => (existing, true),
                None => (insert_account(&name, opening_balance, &transaction)?, false),
            };

            transaction.commit()?;

            (account, found)
        };

        if found {
            tracing::debug!(
                "account \"{}\" already exists, returning the stored record",
                account.name
            );
        } else {
            tracing::info!(
                "opened account \"{}\" with balance {} cents",
                account.name,
                account.balance
            );
        }

        Ok((AccountHandle::new(self.clone(), account), found))
    }

    /// Add `amount` cents to the account and return the new committed
    /// balance.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if `amount` is not positive and
    /// [Error::AccountNotFound] if the account does not exist. The account
    /// is unchanged on any error.
    pub fn deposit(&self, name: &str, amount: Cents) -> Result<Cents, Error> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount));
        }

        self.apply_update(name, amount)
    }

    /// Withdraw `amount` cents from the account.
    ///
    /// Returns the amount withdrawn, not the resulting balance — an
    /// asymmetry with [Ledger::deposit] kept from the system this ledger
    /// replaces. Use [Ledger::balance_of] to read the balance afterwards.
    ///
    /// # Errors
    /// Returns [Error::InvalidAmount] if `amount` is not positive,
    /// [Error::InsufficientFunds] if `amount` exceeds the committed
    /// balance, and [Error::AccountNotFound] if the account does not
    /// exist. The account is unchanged on any error.
    pub fn withdraw(&self, name: &str, amount: Cents) -> Result<Cents, Error> {
        self.withdraw_with_balance(name, amount)
            .map(|(withdrawn, _)| withdrawn)
    }

    /// Withdraw `amount` cents and also report the new committed balance,
    /// for callers that maintain a cached view.
    pub(crate) fn withdraw_with_balance(
        &self,
        name: &str,
        amount: Cents,
    ) -> Result<(Cents, Cents), Error> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount));
        }

        let new_balance = self.apply_update(name, -amount)?;

        Ok((amount, new_balance))
    }

    /// The committed balance of the account, in cents.
    ///
    /// Reflects the most recently committed update; a partially applied
    /// update is never observable.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if the account does not exist.
    pub fn balance_of(&self, name: &str) -> Result<Cents, Error> {
        let connection = self.connection.lock().unwrap();

        let account = get_account(name, &connection)?
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))?;

        Ok(account.balance)
    }

    /// The account's committed history entries in commit order.
    ///
    /// An account with no transactions yields an empty list.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if the account does not exist.
    pub fn history_of(&self, name: &str) -> Result<Vec<HistoryEntry>, Error> {
        let connection = self.connection.lock().unwrap();

        if get_account(name, &connection)?.is_none() {
            return Err(Error::AccountNotFound(name.to_string()));
        }

        entries_for_account(name, &connection)
    }

    /// Read the account's balance and history rollup at one quiescent
    /// point, for reconciling the balance against its recorded changes.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if the account does not exist.
    pub fn audit(&self, name: &str) -> Result<LedgerAudit, Error> {
        let connection = self.connection.lock().unwrap();

        let account = get_account(name, &connection)?
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))?;
        let history_total = sum_for_account(name, &connection)?;
        let entries = count_for_account(name, &connection)?;

        Ok(LedgerAudit {
            balance: account.balance,
            history_total,
            entries,
        })
    }

    /// Apply a signed `delta` to the account's balance and append the
    /// matching history entry, atomically.
    ///
    /// The balance update and the history insert happen in one SQLite
    /// transaction. If either statement fails the transaction is dropped
    /// without committing, which rolls both back, and callers keep
    /// observing the pre-update balance. A collision on the
    /// `(timestamp, account)` history key is retried with a freshly
    /// generated timestamp up to [MAX_TIMESTAMP_RETRIES] times before
    /// surfacing [Error::StorageConflict].
    fn apply_update(&self, name: &str, delta: Cents) -> Result<Cents, Error> {
        let connection = self.connection.lock().unwrap();

        let account = get_account(name, &connection)?
            .ok_or_else(|| Error::AccountNotFound(name.to_string()))?;

        if delta < 0 && -delta > account.balance {
            return Err(Error::InsufficientFunds {
                requested: -delta,
                available: account.balance,
            });
        }

        let new_balance = account
            .balance
            .checked_add(delta)
            .ok_or(Error::InvalidAmount(delta))?;

        for attempt in 1..=MAX_TIMESTAMP_RETRIES {
            let entry = HistoryEntry {
                timestamp: self.clock.now(),
                account: account.name.clone(),
                amount: delta,
            };

            let transaction = connection.unchecked_transaction()?;

            update_balance(name, new_balance, &transaction)?;

            match record_entry(&entry, &transaction) {
                Ok(()) => {
                    transaction.commit()?;
                    tracing::debug!(
                        "recorded {} cent update for \"{}\", new balance {} cents",
                        delta,
                        name,
                        new_balance
                    );
                    return Ok(new_balance);
                }
                Err(error) if is_timestamp_collision(&error) => {
                    // Dropping the transaction rolls back the balance update.
                    drop(transaction);
                    tracing::debug!(
                        "history key collision for \"{}\" on attempt {}, retrying with a fresh timestamp",
                        name,
                        attempt
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        tracing::warn!(
            "giving up on update for \"{}\" after {} history key collisions",
            name,
            MAX_TIMESTAMP_RETRIES
        );

        Err(Error::StorageConflict)
    }
}

/// A consistent snapshot of an account's balance and history totals.
///
/// All fields are read inside one critical section, so the snapshot always
/// satisfies `balance == opening_balance() + history_total`.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerAudit {
    /// The committed balance, in cents.
    pub balance: Cents,
    /// The sum of all recorded history amounts, in cents.
    pub history_total: Cents,
    /// How many history entries the account has.
    pub entries: u64,
}

impl LedgerAudit {
    /// The balance the account must have been opened with, derived from
    /// the committed balance minus all recorded changes.
    pub fn opening_balance(&self) -> Cents {
        self.balance - self.history_total
    }
}





#[cfg(test)]
mod update_protocol_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{Error, Ledger, clock::Clock};

    fn get_test_ledger() -> Ledger {
        let connection = Connection::open_in_memory().unwrap();
        Ledger::new(connection).expect("Could not create ledger")
    }

    #[test]
    fn deposits_and_withdrawals_round_trip() {
        let ledger = get_test_ledger();
        ledger.open_or_create("bob", 0).unwrap();

        assert_eq!(ledger.deposit("bob", 2_500), Ok(2_500));
        assert_eq!(ledger.withdraw("bob", 1_000), Ok(1_000));
        assert_eq!(ledger.balance_of("bob"), Ok(1_500));

        let history = ledger.history_of("bob").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.iter().map(|entry| entry.amount).sum::<i64>(), 1_500);
    }

    #[test]
    fn balance_reconciles_with_history() {
        let ledger = get_test_ledger();
        ledger.open_or_create("carla", 750).unwrap();

        ledger.deposit("carla", 200).unwrap();
        ledger.deposit("carla", 125).unwrap();
        ledger.withdraw("carla", 300).unwrap();

        let audit = ledger.audit("carla").unwrap();
        assert_eq!(audit.balance, 775);
        assert_eq!(audit.history_total, 25);
        assert_eq!(audit.entries, 3);
        assert_eq!(audit.opening_balance(), 750);
        assert_eq!(audit.balance, audit.opening_balance() + audit.history_total);
    }

    #[test]
    fn failed_update_rolls_back_balance_and_history() {
        // A frozen clock makes every generated timestamp identical, so the
        // second update keeps colliding on the history key: the balance
        // row write must be rolled back on each attempt.
        let connection = Connection::open_in_memory().unwrap();
        let clock = Clock::frozen_at(datetime!(2024-08-07 12:00:00 UTC));
        let ledger = Ledger::with_clock(connection, clock).unwrap();
        ledger.open_or_create("dana", 0).unwrap();
        assert_eq!(ledger.deposit("dana", 400), Ok(400));

        assert_eq!(ledger.deposit("dana", 100), Err(Error::StorageConflict));

        assert_eq!(ledger.balance_of("dana"), Ok(400));
        assert_eq!(ledger.history_of("dana").unwrap().len(), 1);
    }

    #[test]
    fn colliding_timestamps_on_different_accounts_do_not_conflict() {
        let connection = Connection::open_in_memory().unwrap();
        let clock = Clock::frozen_at(datetime!(2024-08-07 12:00:00 UTC));
        let ledger = Ledger::with_clock(connection, clock).unwrap();
        ledger.open_or_create("dana", 0).unwrap();
        ledger.open_or_create("erik", 0).unwrap();

        assert_eq!(ledger.deposit("dana", 400), Ok(400));
        assert_eq!(ledger.deposit("erik", 300), Ok(300));
    }
}

#[cfg(test)]
mod concurrency_tests {
    use std::thread;

    use rusqlite::Connection;

    use crate::Ledger;

    #[test]
    fn concurrent_deposits_are_all_recorded() {
        const DEPOSITS: usize = 100;

        let ledger = Ledger::new(Connection::open_in_memory().unwrap()).unwrap();
        ledger.open_or_create("carl", 0).unwrap();

        thread::scope(|scope| {
            for _ in 0..DEPOSITS {
                let ledger = ledger.clone();
                scope.spawn(move || ledger.deposit("carl", 1).unwrap());
            }
        });

        assert_eq!(ledger.balance_of("carl"), Ok(DEPOSITS as i64));
        assert_eq!(ledger.history_of("carl").unwrap().len(), DEPOSITS);
    }
}

//! The caller-facing cached view of one account.

use crate::{
    account::{Account, AccountName},
    cents::Cents,
    error::Error,
    ledger::Ledger,
};

/// A cached view of one ledger account.
///
/// The handle holds the account name and the balance as of the last
/// operation made through it. It is safe to discard at any time and
/// re-derive with [Ledger::open_or_create]: it holds no exclusive
/// resource, and the cache exists for display convenience only. The cache
/// may be stale relative to updates made through other handles until
/// [AccountHandle::refresh] is called.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    ledger: Ledger,
    name: AccountName,
    balance: Cents,
}

impl AccountHandle {
    pub(crate) fn new(ledger: Ledger, account: Account) -> Self {
        Self {
            ledger,
            name: account.name,
            balance: account.balance,
        }
    }

    /// The name the account was opened under.
    pub fn name(&self) -> &AccountName {
        &self.name
    }

    /// The cached balance in cents, as of the last operation made through
    /// this handle.
    pub fn balance(&self) -> Cents {
        self.balance
    }

    /// Deposit `amount` cents and return the new committed balance.
    ///
    /// The cache only advances once the ledger reports a committed update.
    ///
    /// # Errors
    /// Delegates to [Ledger::deposit]; the cache is unchanged on error.
    pub fn deposit(&mut self, amount: Cents) -> Result<Cents, Error> {
        let new_balance = self.ledger.deposit(self.name.as_ref(), amount)?;
        self.balance = new_balance;

        Ok(new_balance)
    }

    /// Withdraw `amount` cents and return the amount withdrawn.
    ///
    /// # Errors
    /// Delegates to [Ledger::withdraw]; the cache is unchanged on error.
    pub fn withdraw(&mut self, amount: Cents) -> Result<Cents, Error> {
        let (withdrawn, new_balance) = self
            .ledger
            .withdraw_with_balance(self.name.as_ref(), amount)?;
        self.balance = new_balance;

        Ok(withdrawn)
    }

    /// Re-read the committed balance into the cache and return it.
    ///
    /// # Errors
    /// Returns [Error::AccountNotFound] if the account row is gone, which
    /// only happens if the database file was replaced underneath the
    /// ledger.
    pub fn refresh(&mut self) -> Result<Cents, Error> {
        self.balance = self.ledger.balance_of(self.name.as_ref())?;

        Ok(self.balance)
    }
}

#[cfg(test)]
mod account_handle_tests {
    use rusqlite::Connection;

    use crate::{Error, Ledger};

    fn get_test_ledger() -> Ledger {
        let connection = Connection::open_in_memory().unwrap();
        Ledger::new(connection).expect("Could not create ledger")
    }

    #[test]
    fn deposit_updates_cached_balance() {
        let ledger = get_test_ledger();
        let (mut handle, _) = ledger.open_or_create("alice", 0).unwrap();

        assert_eq!(handle.deposit(2_500), Ok(2_500));
        assert_eq!(handle.balance(), 2_500);
    }

    #[test]
    fn withdraw_returns_amount_and_updates_cache() {
        let ledger = get_test_ledger();
        let (mut handle, _) = ledger.open_or_create("alice", 2_500).unwrap();

        assert_eq!(handle.withdraw(1_000), Ok(1_000));
        assert_eq!(handle.balance(), 1_500);
    }

    #[test]
    fn failed_withdraw_leaves_cache_unchanged() {
        let ledger = get_test_ledger();
        let (mut handle, _) = ledger.open_or_create("alice", 1_000).unwrap();

        assert_eq!(
            handle.withdraw(1_001),
            Err(Error::InsufficientFunds {
                requested: 1_001,
                available: 1_000
            })
        );
        assert_eq!(handle.balance(), 1_000);
    }

    #[test]
    fn stale_handle_refreshes_to_committed_balance() {
        let ledger = get_test_ledger();
        let (mut first, _) = ledger.open_or_create("alice", 0).unwrap();
        let (mut second, found) = ledger.open_or_create("alice", 0).unwrap();
        assert!(found);

        second.deposit(300).unwrap();

        assert_eq!(first.balance(), 0);
        assert_eq!(first.refresh(), Ok(300));
        assert_eq!(first.balance(), 300);
    }

    #[test]
    fn handle_is_rederivable_after_discard() {
        let ledger = get_test_ledger();
        let (mut handle, _) = ledger.open_or_create("alice", 0).unwrap();
        handle.deposit(750).unwrap();
        drop(handle);

        let (handle, found) = ledger.open_or_create("alice", 0).unwrap();

        assert!(found);
        assert_eq!(handle.balance(), 750);
    }
}

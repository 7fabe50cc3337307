mod db;
mod domain;
mod handle;

pub use db::{create_accounts_table, get_account, insert_account, update_balance};
pub use domain::{Account, AccountName};
pub use handle::AccountHandle;

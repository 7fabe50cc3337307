mod db;
mod domain;

pub use db::{
    count_for_account, create_history_table, entries_for_account, is_timestamp_collision,
    record_entry, sum_for_account,
};
pub use domain::HistoryEntry;

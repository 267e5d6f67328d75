mod notify_change_feed;
mod polling_change_feed;
mod sqlite_counter_store;

pub use notify_change_feed::NotifyChangeFeed;
pub use polling_change_feed::PollingChangeFeed;
pub use sqlite_counter_store::SqliteCounterStore;

mod change_feed;
mod counter_store;

pub use change_feed::{ChangeFeed, ChangeFeedError};
pub use counter_store::CounterStore;

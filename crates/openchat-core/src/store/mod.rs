pub mod merge;
pub mod user_cache;

pub use merge::{compare_chats, initial_state, merge_updates, sort_chats, MergedUpdates};
pub use user_cache::{CacheError, UserCache};

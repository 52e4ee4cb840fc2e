//! Application-wide constants
//!
//! Centralized location for timeouts, limits and protocol strings
//! shared between the bridge client and the worker.

use std::time::Duration;

/// How long the bridge waits for the worker to answer a request.
pub const WORKER_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of timed-out requests remembered for late-reply diagnostics.
pub const UNRESOLVED_CAPACITY: usize = 256;

/// Capacity of the event broadcast channels (worker agent and bridge client).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Textual form of the anonymous principal; an identity with this principal
/// is treated as "not logged in".
pub const ANONYMOUS_PRINCIPAL: &str = "2vxsx-fae";

/// Default replica URL when none is configured
pub const DEFAULT_IC_URL: &str = "https://icp-api.io";

/// Keyring service name used for the stored identity
pub const KEYRING_SERVICE: &str = "com.openchat.client";

/// File name of the on-disk user cache inside the data directory
pub const USER_CACHE_FILE: &str = "user_cache.bin";

// Request kinds with special handling in the worker
pub mod kinds {
    /// Constructs the agent; gates every other request
    pub const INIT: &str = "init";
}

// Worker event subkinds
pub mod subkinds {
    pub const MESSAGES_READ_FROM_SERVER: &str = "messages_read_from_server";
    pub const STORAGE_UPDATED: &str = "storage_updated";
    pub const USERS_LOADED: &str = "users_loaded";
}

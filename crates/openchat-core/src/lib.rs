pub mod bridge;
pub mod config;
pub mod constants;
pub mod events;
pub mod models;
pub mod protocol;
pub mod runtime;
pub mod services;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::{BridgeClient, BridgeError, ReadyState};
pub use config::{AgentConfig, CoreConfig};
pub use events::AgentEvent;
pub use protocol::{Capability, Envelope, WorkerError};
pub use runtime::CoreRuntime;
pub use services::{HttpServiceCaller, ServiceCaller};
pub use store::merge::{merge_updates, MergedUpdates};
pub use worker::{IdentityProvider, KeyringIdentityProvider, StaticIdentityProvider};

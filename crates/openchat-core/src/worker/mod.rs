//! The worker side of the bridge: identity resolution, the agent that talks
//! to the remote services, and the dispatcher that routes request envelopes
//! to it.

pub mod agent;
pub mod dispatch_table;
pub mod dispatcher;
pub mod identity;

pub use agent::OpenChatAgent;
pub use dispatch_table::DispatchTable;
pub use dispatcher::WorkerDispatcher;
pub use identity::{
    resolve_identity, Identity, IdentityError, IdentityProvider, KeyringIdentityProvider,
    StaticIdentityProvider,
};

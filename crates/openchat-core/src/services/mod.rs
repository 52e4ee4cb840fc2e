//! Typed clients for the remote canister services.
//!
//! The actual encoding and transport of a call sit behind [`ServiceCaller`];
//! the clients here only know method names and argument/response shapes.

pub mod http;
pub mod online;
pub mod user;
pub mod user_index;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use http::HttpServiceCaller;
pub use online::OnlineClient;
pub use user::UserClient;
pub use user_index::UserIndexClient;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{canister}.{method} was rejected ({code}): {message}")]
    Rejected {
        canister: String,
        method: String,
        code: String,
        message: String,
    },
    #[error("Transport error calling {method}: {message}")]
    Transport { method: String, message: String },
    #[error("Could not decode response of {method}: {message}")]
    Decode { method: String, message: String },
    #[error("No canister configured for the {service} service")]
    MissingCanister { service: &'static str },
}

/// The remote-call layer: given a canister, a method name and JSON
/// arguments, returns the decoded JSON response or a structured error.
pub trait ServiceCaller: Send + Sync {
    fn call<'a>(
        &'a self,
        canister_id: &'a str,
        method: &'a str,
        args: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, ServiceError>>;
}

/// Encode `args`, call `method` and decode the response as `R`.
pub(crate) async fn call_typed<A, R>(
    caller: &dyn ServiceCaller,
    canister_id: &str,
    method: &str,
    args: &A,
) -> Result<R, ServiceError>
where
    A: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let args = serde_json::to_value(args).map_err(|e| ServiceError::Transport {
        method: method.to_string(),
        message: format!("Failed to encode arguments: {}", e),
    })?;
    let value = caller.call(canister_id, method, args).await?;
    serde_json::from_value(value).map_err(|e| ServiceError::Decode {
        method: method.to_string(),
        message: e.to_string(),
    })
}

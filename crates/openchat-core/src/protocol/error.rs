use serde::{Deserialize, Serialize};

use crate::services::ServiceError;

/// Error produced inside the worker and carried back in an `error` envelope.
///
/// Service failures are forwarded as-is so the caller sees what the remote
/// service said.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerError {
    #[error("{canister}.{method} was rejected ({code}): {message}")]
    Service {
        canister: String,
        method: String,
        code: String,
        message: String,
    },
    #[error("Transport error calling {method}: {message}")]
    Transport { method: String, message: String },
    #[error("Could not decode response of {method}: {message}")]
    Decode { method: String, message: String },
    #[error("Invalid payload for {request_kind}: {message}")]
    InvalidPayload {
        request_kind: String,
        message: String,
    },
    #[error("Agent not initialized")]
    AgentNotInitialized,
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<ServiceError> for WorkerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Rejected {
                canister,
                method,
                code,
                message,
            } => WorkerError::Service {
                canister,
                method,
                code,
                message,
            },
            ServiceError::Transport { method, message } => {
                WorkerError::Transport { method, message }
            }
            ServiceError::Decode { method, message } => WorkerError::Decode { method, message },
            ServiceError::MissingCanister { service } => WorkerError::Internal {
                message: format!("No canister configured for the {} service", service),
            },
        }
    }
}

//! Caller side of the request/response bridge to the worker.

mod client;

pub use client::{BridgeClient, BridgeError, ReadyState};

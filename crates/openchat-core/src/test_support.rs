//! In-memory stand-ins shared by the worker, bridge and runtime tests.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::services::{ServiceCaller, ServiceError};

/// Answers calls by method name from canned responses and records every
/// call it receives.
#[derive(Default)]
pub struct FakeServiceCaller {
    responses: Mutex<HashMap<String, Result<Value, ServiceError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<(String, String, Value)>>,
}

impl FakeServiceCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, method: &str, response: Value) -> Self {
        self.responses
            .lock()
            .insert(method.to_string(), Ok(response));
        self
    }

    pub fn reject(self, method: &str, code: &str, message: &str) -> Self {
        self.responses.lock().insert(
            method.to_string(),
            Err(ServiceError::Rejected {
                canister: "fake".to_string(),
                method: method.to_string(),
                code: code.to_string(),
                message: message.to_string(),
            }),
        );
        self
    }

    /// Hold the answer to `method` back for `delay`.
    pub fn delay(self, method: &str, delay: Duration) -> Self {
        self.delays.lock().insert(method.to_string(), delay);
        self
    }

    /// `(canister_id, method, args)` for every call so far, in call order.
    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|(_, m, _)| m == method).count()
    }
}

impl ServiceCaller for FakeServiceCaller {
    fn call<'a>(
        &'a self,
        canister_id: &'a str,
        method: &'a str,
        args: Value,
    ) -> BoxFuture<'a, Result<Value, ServiceError>> {
        self.calls
            .lock()
            .push((canister_id.to_string(), method.to_string(), args));
        let response = self
            .responses
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| {
                Err(ServiceError::Rejected {
                    canister: canister_id.to_string(),
                    method: method.to_string(),
                    code: "not_found".to_string(),
                    message: "no canned response".to_string(),
                })
            });
        let delay = self.delays.lock().get(method).copied();

        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        }
        .boxed()
    }
}

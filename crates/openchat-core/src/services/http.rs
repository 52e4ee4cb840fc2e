use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

use super::{ServiceCaller, ServiceError};

/// Body returned by the gateway when a call is rejected.
#[derive(Debug, Deserialize)]
struct RejectBody {
    code: Option<String>,
    message: Option<String>,
}

/// `ServiceCaller` that posts JSON to an HTTP gateway in front of the
/// canisters: `POST {base_url}/canister/{canister_id}/{method}`.
pub struct HttpServiceCaller {
    base_url: String,
    principal: Option<String>,
    client: reqwest::Client,
}

impl HttpServiceCaller {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            principal: None,
            client: reqwest::Client::new(),
        }
    }

    /// Sign every call as `principal`.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    pub fn endpoint(&self, canister_id: &str, method: &str) -> String {
        format!("{}/canister/{}/{}", self.base_url, canister_id, method)
    }

    async fn post(
        &self,
        canister_id: &str,
        method: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        let url = self.endpoint(canister_id, method);
        tracing::debug!("service call {} -> {}", method, url);

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&args);
        if let Some(principal) = &self.principal {
            request = request.header("Authorization", format!("Bearer {}", principal));
        }

        let response = request.send().await.map_err(|e| ServiceError::Transport {
            method: method.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: Option<RejectBody> = serde_json::from_str(&text).ok();
            let (code, message) = match body {
                Some(body) => (
                    body.code.unwrap_or_else(|| status.as_u16().to_string()),
                    body.message.unwrap_or(text),
                ),
                None => (status.as_u16().to_string(), text),
            };
            return Err(ServiceError::Rejected {
                canister: canister_id.to_string(),
                method: method.to_string(),
                code,
                message,
            });
        }

        response.json().await.map_err(|e| ServiceError::Decode {
            method: method.to_string(),
            message: e.to_string(),
        })
    }
}

impl ServiceCaller for HttpServiceCaller {
    fn call<'a>(
        &'a self,
        canister_id: &'a str,
        method: &'a str,
        args: serde_json::Value,
    ) -> BoxFuture<'a, Result<serde_json::Value, ServiceError>> {
        self.post(canister_id, method, args).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let caller = HttpServiceCaller::new("http://localhost:8080/");
        assert_eq!(
            caller.endpoint("abc-cai", "updates"),
            "http://localhost:8080/canister/abc-cai/updates"
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let caller = HttpServiceCaller::new("http://127.0.0.1:9");
        let err = caller
            .call("abc-cai", "updates", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport { .. }));
    }
}

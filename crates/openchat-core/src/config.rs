use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_IC_URL, WORKER_TIMEOUT};

/// Agent configuration, sent to the worker as the `init` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub ic_url: String,
    pub user_index_canister: String,
    pub online_canister: String,
    #[serde(default)]
    pub group_index_canister: String,
    #[serde(default)]
    pub notifications_canister: String,
    /// The current user's own canister. Resolved through `getCurrentUser`
    /// when not known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_canister: Option<String>,
    #[serde(default)]
    pub blob_url_pattern: String,
    #[serde(default)]
    pub website_version: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ic_url: DEFAULT_IC_URL.to_string(),
            user_index_canister: "4bkt6-4aaaa-aaaaf-aaaiq-cai".to_string(),
            online_canister: "3vlw6-fiaaa-aaaaf-aaa3a-cai".to_string(),
            group_index_canister: "4ijyc-kiaaa-aaaaf-aaaja-cai".to_string(),
            notifications_canister: "4glvk-ryaaa-aaaaf-aaaia-cai".to_string(),
            user_canister: None,
            blob_url_pattern: "{canisterId}/blobs/{blobId}".to_string(),
            website_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub agent: AgentConfig,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            request_timeout: WORKER_TIMEOUT,
            agent: AgentConfig::default(),
        }
    }

    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .map(|dir| dir.join("openchat"))
            .unwrap_or_else(|| PathBuf::from("openchat_data"));
        Self::new(data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config_camel_case_roundtrip() {
        let json = r#"{
            "icUrl": "http://127.0.0.1:8080",
            "userIndexCanister": "uidx",
            "onlineCanister": "online",
            "userCanister": "me"
        }"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ic_url, "http://127.0.0.1:8080");
        assert_eq!(config.user_canister.as_deref(), Some("me"));
        assert!(config.group_index_canister.is_empty());

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["userIndexCanister"], "uidx");
    }

    #[test]
    fn test_core_config_builders() {
        let config = CoreConfig::new("/tmp/openchat-test")
            .with_request_timeout(Duration::from_millis(250));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/openchat-test"));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert_eq!(config.agent, AgentConfig::default());
    }
}

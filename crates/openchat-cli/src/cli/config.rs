use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use openchat_core::{AgentConfig, CoreConfig};
use serde::{Deserialize, Serialize};

/// CLI configuration that can be loaded from a JSON file. Missing fields fall
/// back to the production defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ic_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_index_canister: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_canister: Option<String>,

    /// Skips the `current_user` lookup when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_canister: Option<String>,

    /// Where the user cache lives
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Principal to act as. Falls back to the one stored in the keyring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    pub fn agent_config(&self) -> AgentConfig {
        let mut agent = AgentConfig::default();
        if let Some(ic_url) = &self.ic_url {
            agent.ic_url = ic_url.clone();
        }
        if let Some(canister) = &self.user_index_canister {
            agent.user_index_canister = canister.clone();
        }
        if let Some(canister) = &self.online_canister {
            agent.online_canister = canister.clone();
        }
        agent.user_canister = self.user_canister.clone();
        agent
    }

    pub fn core_config(&self) -> CoreConfig {
        let mut config = match &self.data_dir {
            Some(dir) => CoreConfig::new(dir),
            None => CoreConfig::default(),
        };
        if let Some(secs) = self.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        config.with_agent(self.agent_config())
    }
}

use std::env;
use std::sync::Arc;

use edgeflags_lib::syncer::DriftPolicy;
use edgeflags_lib::{FlagsError, NotionClient, VercelEdgeConfig};
use serde::Deserialize;

/// Top-level edgeflags.toml configuration
#[derive(Debug, Deserialize, Default)]
pub struct CliConfig {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub vercel: VercelConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct NotionConfig {
    pub token: Option<String>,
    pub database_id: Option<String>,
    pub database_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct VercelConfig {
    /// EDGE_CONFIG connection string, e.g.
    /// https://edge-config.vercel.com/ecfg_abc?token=xxx
    pub connection: Option<String>,
    pub api_token: Option<String>,
    pub team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub drift_policy: DriftPolicy,
}

// ── Default value functions ──────────────────────────

fn default_namespace() -> String {
    "flag".to_string()
}

fn default_interval_ms() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            interval_ms: default_interval_ms(),
            drift_policy: DriftPolicy::default(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults if the
    /// file doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: failed to parse {}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    /// Environment variables win over the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("NOTION_TOKEN") {
            self.notion.token = Some(val);
        }
        if let Ok(val) = env::var("NOTION_FLAGS_DB") {
            self.notion.database_id = Some(val);
        }
        if let Ok(val) = env::var("NOTION_FLAGS_DB_NAME") {
            self.notion.database_name = Some(val);
        }
        if let Ok(val) = env::var("EDGE_CONFIG") {
            self.vercel.connection = Some(val);
        }
        if let Ok(val) = env::var("VERCEL_API_TOKEN") {
            self.vercel.api_token = Some(val);
        }
        if let Ok(val) = env::var("VERCEL_TEAM_ID") {
            self.vercel.team_id = Some(val);
        }
        if let Ok(val) = env::var("EDGEFLAGS_DRIFT_POLICY") {
            match val.parse::<DriftPolicy>() {
                Ok(policy) => self.sync.drift_policy = policy,
                Err(e) => eprintln!("Warning: {}", e),
            }
        }
    }

    pub fn notion_client(&self) -> Result<NotionClient, FlagsError> {
        let token = self
            .notion
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                FlagsError::Configuration(
                    "NOTION_TOKEN is not set (or [notion].token in edgeflags.toml)".into(),
                )
            })?;
        Ok(NotionClient::new(token)
            .with_database_id(self.notion.database_id.clone())
            .with_database_name(self.notion.database_name.clone()))
    }

    pub fn edge_store(&self) -> Result<Arc<VercelEdgeConfig>, FlagsError> {
        let connection = self
            .vercel
            .connection
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                FlagsError::Configuration(
                    "EDGE_CONFIG is not set (or [vercel].connection in edgeflags.toml)".into(),
                )
            })?;
        let store = VercelEdgeConfig::from_connection_string(
            connection,
            self.vercel.api_token.as_deref(),
        )?
        .with_team_id(self.vercel.team_id.clone());
        Ok(Arc::new(store))
    }
}

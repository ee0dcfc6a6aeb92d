use crate::error::{ProxyError, Result};
use crate::models::ModelAliases;
use crate::user_agent::UserAgentPool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_UPSTREAM_URL: &str = "https://api.deepinfra.com/v1/openai/chat/completions";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub user_agents: UserAgentConfig,
    /// Extra or overriding model aliases.
    #[serde(default)]
    pub models: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub url: String,
    #[serde(default = "default_provider_label")]
    pub provider_label: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum silence between two body chunks.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Deadline for buffered modes, from send to last byte.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_alias")]
    pub alias: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default)]
    pub jitter_versions: bool,
    /// Replaces the built-in pool when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<Vec<String>>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_provider_label() -> String {
    "DeepInfra (Proxied)".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    120
}

fn default_request_timeout() -> u64 {
    300
}

fn default_model() -> String {
    "deepseek-ai/DeepSeek-V3.1".to_string()
}

fn default_alias() -> String {
    "deepseek-v3".to_string()
}

fn default_system_prompt() -> String {
    "Be a helpful assistant".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: UpstreamConfig::default(),
            defaults: DefaultsConfig::default(),
            user_agents: UserAgentConfig::default(),
            models: HashMap::new(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            provider_label: default_provider_label(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            alias: default_alias(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ProxyConfig {
    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.upstream.url.starts_with("http://") && !self.upstream.url.starts_with("https://")
        {
            return Err(ProxyError::config(format!(
                "upstream.url must be an http(s) URL, got '{}'",
                self.upstream.url
            )));
        }
        if matches!(self.user_agents.pool, Some(ref pool) if pool.is_empty()) {
            return Err(ProxyError::config("user_agents.pool must not be empty"));
        }
        Ok(())
    }

    /// Alias table with this config's `[models]` layered over the built-ins.
    pub fn aliases(&self) -> ModelAliases {
        ModelAliases::with_overrides(&self.models)
    }

    /// User-Agent pool described by `[user_agents]`.
    pub fn user_agent_pool(&self) -> Result<UserAgentPool> {
        let pool = match self.user_agents.pool {
            Some(ref agents) => UserAgentPool::from_list(agents.clone())?,
            None => UserAgentPool::builtin(),
        };
        Ok(pool.with_version_jitter(self.user_agents.jitter_versions))
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("deepinfra-proxy.toml"));

    // XDG / platform config dir
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs_path() {
            paths.push(
                home.join("Library")
                    .join("Application Support")
                    .join("deepinfra-proxy")
                    .join("config.toml"),
            );
        }
    } else {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("deepinfra-proxy").join("config.toml"));
        }
        if let Some(home) = dirs_path() {
            paths.push(home.join(".config").join("deepinfra-proxy").join("config.toml"));
        }
    }

    // Home directory fallback
    if let Some(home) = dirs_path() {
        paths.push(home.join(".deepinfra-proxy.toml"));
    }

    paths
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

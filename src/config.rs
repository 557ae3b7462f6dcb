// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use crate::paths;
use crate::plugins::openai::{ResponsePolicy, DEFAULT_CHANCE};
use anyhow::{Context, Result};
use athenais_ai::OpenAiConfig;
use athenais_core::{RoomSet, StorageBackend};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub home_server: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    pub device_name: String,
    /// Rooms the bot should be in; anything else is left at startup
    pub rooms: Vec<String>,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            home_server: String::new(),
            user_id: String::new(),
            password: None,
            access_token: None,
            device_name: default_device_name(),
            rooms: Vec::new(),
        }
    }
}

// Custom Debug impl to redact sensitive fields
impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("home_server", &self.home_server)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("device_name", &self.device_name)
            .field("rooms", &self.rooms)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Sqlite,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown storage backend '{}' (expected sqlite or memory)", other),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageKind,
    /// Directory for the SQLite stores. Defaults to the XDG data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Passphrase encrypting the Matrix state and crypto store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickle_key: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("path", &self.path)
            .field("pickle_key", &self.pickle_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// System prompt; the built-in default is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Percent chance (0-100) of answering a text message
    pub chance: u8,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            prompt: None,
            model: None,
            base_url: None,
            chance: DEFAULT_CHANCE,
        }
    }
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("chance", &self.chance)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint; metrics are not exported when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

fn default_device_name() -> String {
    "athenais".to_string()
}

/// Expand tilde (~) to home directory in paths
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().join(stripped);
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    }
    PathBuf::from(path)
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. ATHENAIS_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/athenais/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("ATHENAIS_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from the first config file found, with environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`Config::load`], but an explicit `path` must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::find_config_file(),
        };

        let mut config = if let Some(config_path) = config_path {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        let matrix = &mut self.matrix;
        if let Ok(val) = std::env::var("MATRIX_HOMESERVER") {
            matrix.home_server = val;
        }
        if let Ok(val) = std::env::var("MATRIX_USER_ID") {
            matrix.user_id = val;
        }
        if let Ok(val) = std::env::var("MATRIX_PASSWORD") {
            matrix.password = Some(val);
        }
        if let Ok(val) = std::env::var("MATRIX_ACCESS_TOKEN") {
            matrix.access_token = Some(val);
        }
        if let Ok(val) = std::env::var("MATRIX_DEVICE_NAME") {
            matrix.device_name = val;
        }
        if let Ok(val) = std::env::var("MATRIX_ROOMS") {
            matrix.rooms = split_list(&val);
        }

        if let Ok(val) = std::env::var("STORAGE_BACKEND") {
            self.storage.backend = val.parse()?;
        }
        if let Ok(val) = std::env::var("DATABASE_DSN") {
            self.storage.path = Some(val);
        }
        if let Ok(val) = std::env::var("CRYPTO_PICKLE_KEY") {
            self.storage.pickle_key = Some(val);
            // Clear from environment to prevent exposure via /proc or ps
            std::env::remove_var("CRYPTO_PICKLE_KEY");
        }

        let openai = &mut self.openai;
        if let Ok(val) = std::env::var("OPEN_AI_KEY") {
            openai.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("OPENAI_PROMPT") {
            openai.prompt = Some(val);
        }
        if let Ok(val) = std::env::var("OPENAI_MODEL") {
            openai.model = Some(val);
        }
        if let Ok(val) = std::env::var("OPENAI_CHANCE") {
            openai.chance = val.trim().parse().with_context(|| {
                format!("OPENAI_CHANCE must be a number from 0 to 100, got: {}", val)
            })?;
        }

        if let Ok(val) = std::env::var("METRICS_LISTEN") {
            self.metrics.listen = Some(val);
        }

        Ok(())
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<()> {
        let matrix = &self.matrix;
        if matrix.home_server.trim().is_empty() {
            anyhow::bail!(
                "matrix.home_server is required (set in config.toml or MATRIX_HOMESERVER env var)"
            );
        }
        if matrix.user_id.trim().is_empty() {
            anyhow::bail!(
                "matrix.user_id is required (set in config.toml or MATRIX_USER_ID env var)"
            );
        }
        if !matrix.user_id.starts_with('@') || !matrix.user_id.contains(':') {
            anyhow::bail!("Invalid Matrix user ID: {}", matrix.user_id);
        }
        if matrix.password.is_none() && matrix.access_token.is_none() {
            anyhow::bail!("Either matrix.password or matrix.access_token is required");
        }
        for room in &matrix.rooms {
            if !room.starts_with('!') {
                anyhow::bail!(
                    "Invalid room ID in matrix.rooms: {} (room IDs start with '!'; aliases are not supported)",
                    room
                );
            }
        }
        if self.openai.chance > 100 {
            anyhow::bail!(
                "openai.chance must be between 0 and 100, got: {}",
                self.openai.chance
            );
        }
        self.metrics_listen()?;
        Ok(())
    }

    /// The deduplicated desired room set
    pub fn desired_rooms(&self) -> RoomSet {
        self.matrix
            .rooms
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    }

    pub fn storage_backend(&self) -> StorageBackend {
        match self.storage.backend {
            StorageKind::Memory => StorageBackend::Memory,
            StorageKind::Sqlite => StorageBackend::Sqlite {
                path: self
                    .storage
                    .path
                    .as_deref()
                    .map(expand_tilde)
                    .unwrap_or_else(paths::store_dir),
                passphrase: self.storage.pickle_key.clone(),
            },
        }
    }

    /// `None` when no API key is configured
    pub fn openai_config(&self) -> Option<OpenAiConfig> {
        let key = self.openai.api_key.as_deref()?.trim();
        if key.is_empty() {
            return None;
        }

        let mut config = OpenAiConfig::new(key);
        if let Some(prompt) = &self.openai.prompt {
            config = config.with_prompt(prompt.as_str());
        }
        if let Some(model) = &self.openai.model {
            config = config.with_model(model.as_str());
        }
        if let Some(base_url) = &self.openai.base_url {
            config = config.with_base_url(base_url.as_str());
        }
        Some(config)
    }

    /// The Prometheus listen address, if metrics export is enabled
    pub fn metrics_listen(&self) -> Result<Option<SocketAddr>> {
        let Some(listen) = self.metrics.listen.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if listen.is_empty() {
            return Ok(None);
        }
        listen
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid metrics.listen address: {}", listen))
    }

    pub fn response_policy(&self) -> ResponsePolicy {
        ResponsePolicy::from_percent(self.openai.chance)
    }
}

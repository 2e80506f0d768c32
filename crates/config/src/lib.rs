//! Configuration loading, validation, and management for Scriptorium.
//!
//! Loads configuration from `~/.scriptorium/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.scriptorium/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Note store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Analysis cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Prompt serialization configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Conflict detection configuration
    #[serde(default)]
    pub conflict: ConflictConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend: "sqlite", "file", or "in_memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Storage path. Defaults to notes.db / notes.jsonl under the config
    /// directory depending on backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// The resolved storage path for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => {
                let file = match self.backend.as_str() {
                    "file" => "notes.jsonl",
                    _ => "notes.db",
                };
                AppConfig::config_dir().join(file)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Max entries per cache instance
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Entry time-to-live in seconds
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

fn default_cache_capacity() -> usize {
    100
}
fn default_cache_ttl_seconds() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Overall token budget for a serialized bedside note block
    #[serde(default = "default_prompt_budget")]
    pub total_budget_tokens: usize,

    /// Default per-section token budget (individual sections can be tuned
    /// at the call site)
    #[serde(default = "default_section_budget")]
    pub section_budget_tokens: usize,

    /// Default max items per rendered section
    #[serde(default = "default_section_max_items")]
    pub section_max_items: usize,
}

fn default_prompt_budget() -> usize {
    1200
}
fn default_section_budget() -> usize {
    200
}
fn default_section_max_items() -> usize {
    5
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            total_budget_tokens: default_prompt_budget(),
            section_budget_tokens: default_section_budget(),
            section_max_items: default_section_max_items(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Whether the LLM-flavored strategy may consult the text generator.
    /// The heuristic strategy always runs regardless.
    #[serde(default)]
    pub llm_probe: bool,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self { llm_probe: false }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.scriptorium/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `SCRIPTORIUM_STORE_BACKEND`
    /// - `SCRIPTORIUM_STORE_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(backend) = std::env::var("SCRIPTORIUM_STORE_BACKEND") {
            config.store.backend = backend;
        }
        if let Ok(path) = std::env::var("SCRIPTORIUM_STORE_PATH") {
            config.store.path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scriptorium")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store.backend.as_str() {
            "sqlite" | "file" | "in_memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "store.backend must be sqlite, file, or in_memory (got {other:?})"
                )));
            }
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be at least 1".into(),
            ));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "cache.ttl_seconds must be at least 1".into(),
            ));
        }
        if self.prompt.section_budget_tokens > self.prompt.total_budget_tokens {
            return Err(ConfigError::ValidationError(
                "prompt.section_budget_tokens cannot exceed prompt.total_budget_tokens".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for first-run setup).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            prompt: PromptConfig::default(),
            conflict: ConflictConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

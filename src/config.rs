//! Configuration loading
//!
//! Settings live in `~/.config/tabpilot/config.toml`; every section and
//! field is optional and falls back to its default, so a missing file is
//! the same as an empty one.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::agent::{AgentLoopConfig, DEFAULT_MAX_ITERATIONS};

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Hard ceiling on tool iterations per user request
    pub max_iterations: usize,
    /// Seconds before an unanswered permission prompt reads as deny
    pub permission_timeout_secs: u64,
    /// Hours an "approve for this session" grant stays valid
    pub session_ttl_hours: i64,
    /// How many audit entries the in-memory sink retains
    pub audit_capacity: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            permission_timeout_secs: 30,
            session_ttl_hours: 12,
            audit_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible endpoint base URL
    pub base_url: String,
    pub model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl Config {
    /// Load from the default path, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
                return Ok(config);
            }
        }
        Ok(Config::default())
    }

    /// Get the config directory path (~/.config/tabpilot)
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("tabpilot"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    /// Loop knobs derived from the general section
    pub fn loop_config(&self) -> AgentLoopConfig {
        AgentLoopConfig {
            max_iterations: self.general.max_iterations,
            permission_timeout: Duration::from_secs(self.general.permission_timeout_secs),
            session_ttl: chrono::Duration::hours(self.general.session_ttl_hours),
        }
    }
}

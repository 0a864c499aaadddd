//! Engine configuration loaded from `~/.config/srcplug/config.toml`.
//!
//! ```toml
//! [script]
//! memory_limit = 33554432
//! max_stack_size = 1048576
//!
//! [http]
//! user_agent = "srcplug/0.1"
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! max_redirects = 10
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PluginError, Result};

/// Limits applied to each plugin's QuickJS runtime.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptConfig {
    /// Heap limit in bytes.
    pub memory_limit: usize,
    /// Stack limit in bytes.
    pub max_stack_size: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 1024 * 1024,
        }
    }
}

/// Settings for the default [`HttpFetch`](crate::http_client::HttpFetch).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("srcplug/{}", crate::VERSION),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_redirects: 10,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub script: ScriptConfig,
    pub http: HttpConfig,
}

impl EngineConfig {
    /// Load from the default location.
    ///
    /// Returns defaults if the file doesn't exist (configuration is optional).
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PluginError::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
            .map_err(|e| PluginError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("srcplug")
        .join("config.toml")
}

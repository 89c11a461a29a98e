//! Agent configuration.
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial file is fine. Command-line flags override what is loaded here.
//!
//! ```toml
//! base_url = "https://petstore.example.com/v2"
//! timeout_secs = 10
//! placeholder_policy = "strict"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::request::{PlaceholderPolicy, RequestOptions, DEFAULT_TIMEOUT};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "SWAGGER_AGENT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "swagger-agent.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Base URL calls are sent to when none is given on the command line.
    pub base_url: Option<String>,

    /// Per-call timeout.
    pub timeout_secs: u64,

    pub placeholder_policy: PlaceholderPolicy,

    pub user_agent: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            placeholder_policy: PlaceholderPolicy::default(),
            user_agent: concat!("swagger-agent/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// `$SWAGGER_AGENT_CONFIG`, or `swagger-agent.toml` in the working directory.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "base_url must start with http:// or https://, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions::default()
            .timeout(self.timeout())
            .placeholder_policy(self.placeholder_policy)
    }
}

//! Configuration loading.
//!
//! The configuration lives in `config.toml` inside the application home and is
//! entirely optional: every field has a default matching the production
//! upstream, so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// Environment variable for a custom config file path.
pub const ENOM_CONFIG_ENV: &str = "ENOM_CONFIG";

/// Desktop browser User-Agent sent with every upstream request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnomConfig {
    pub api: ApiConfig,
    pub dispatch: DispatchConfig,
    pub signing: SigningConfig,
    pub storage: StorageConfig,
}

/// Upstream hosts and fixed request identity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_base: String,
    pub www_base: String,
    pub passport_base: String,
    pub user_agent: String,
    pub referer: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.bilibili.com".to_string(),
            www_base: "https://www.bilibili.com".to_string(),
            passport_base: "https://passport.bilibili.com".to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            referer: "https://www.bilibili.com/".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Config with every base URL pointed at one host (mock servers in tests).
    pub fn single_host(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            www_base: base.clone(),
            passport_base: base,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Inter-request delay bounds of the request queue.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 500,
        }
    }
}

impl DispatchConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Signing key cache policy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Seconds fetched keys stay valid; 0 disables caching.
    pub key_cache_ttl_secs: u64,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_cache_ttl_secs: 600,
        }
    }
}

impl SigningConfig {
    pub fn key_cache_ttl(&self) -> Option<Duration> {
        (self.key_cache_ttl_secs > 0).then(|| Duration::from_secs(self.key_cache_ttl_secs))
    }
}

/// Where the at-rest encryption key for the credential comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Random key held in the OS keychain, machine key when the keychain is unavailable.
    #[default]
    Keyring,
    /// Key derived from machine-specific identifiers.
    Machine,
    /// Store the credential in plaintext.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub encryption: EncryptionMode,
}

impl EnomConfig {
    /// Load configuration from an explicit file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load configuration, honouring `ENOM_CONFIG` before the home default.
    pub fn load(default_path: &Path) -> Result<Self, ConfigError> {
        match std::env::var(ENOM_CONFIG_ENV) {
            Ok(val) if !val.is_empty() => {
                debug!(path = %val, "Using ENOM_CONFIG");
                Self::load_from(Path::new(&val))
            }
            _ => Self::load_from(default_path),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.min_delay_ms > self.dispatch.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "dispatch.min_delay_ms ({}) exceeds dispatch.max_delay_ms ({})",
                self.dispatch.min_delay_ms, self.dispatch.max_delay_ms
            )));
        }
        Ok(())
    }
}

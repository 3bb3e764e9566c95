//! Common utilities shared across enom crates.

pub mod config;
pub mod dirs;
pub mod http_client;

pub use config::{
    ApiConfig, BROWSER_USER_AGENT, ConfigError, DispatchConfig, ENOM_CONFIG_ENV, EncryptionMode,
    EnomConfig, SigningConfig, StorageConfig,
};
pub use dirs::{AppDirs, ENOM_HOME_ENV, get_enom_home};
pub use http_client::{HttpContext, POOL_IDLE_TIMEOUT, create_client};

//! Cross-platform application directories for enom.
//!
//! - Linux/macOS: `~/.enom`
//! - Windows: `%APPDATA%\enom`
//!
//! Can be overridden with the `ENOM_HOME` environment variable.

use std::path::PathBuf;

/// Application name for directory paths
pub const APP_NAME: &str = "enom";

/// Primary home directory name on Linux/macOS
pub const HOME_DIR_NAME: &str = ".enom";

/// Environment variable overriding the home directory.
pub const ENOM_HOME_ENV: &str = "ENOM_HOME";

/// Application directories structure
#[derive(Debug, Clone)]
pub struct AppDirs {
    /// Configuration directory (holds `config.toml`)
    pub config_dir: PathBuf,
    /// Data directory (holds the persisted credential)
    pub data_dir: PathBuf,
}

impl AppDirs {
    /// Get application directories, respecting `ENOM_HOME`.
    ///
    /// Relative paths in `ENOM_HOME` are resolved against the current
    /// directory so files never land somewhere unexpected.
    pub fn new() -> Option<Self> {
        if let Ok(home) = std::env::var(ENOM_HOME_ENV)
            && !home.is_empty()
        {
            let home = PathBuf::from(&home);
            let home = if home.is_relative() {
                match std::env::current_dir() {
                    Ok(cwd) => {
                        let resolved = cwd.join(&home);
                        resolved.canonicalize().unwrap_or(resolved)
                    }
                    Err(_) => {
                        tracing::warn!(
                            path = %home.display(),
                            "ENOM_HOME is relative but the current directory is unavailable, using default location"
                        );
                        return Self::platform_default();
                    }
                }
            } else {
                home
            };
            return Some(Self::rooted_at(home));
        }

        Self::platform_default()
    }

    /// Directories rooted at a single explicit path.
    pub fn rooted_at(home: PathBuf) -> Self {
        Self {
            config_dir: home.clone(),
            data_dir: home,
        }
    }

    fn platform_default() -> Option<Self> {
        #[cfg(target_os = "windows")]
        let home = dirs::config_dir()?.join(APP_NAME);

        #[cfg(not(target_os = "windows"))]
        let home = dirs::home_dir()?.join(HOME_DIR_NAME);

        Some(Self::rooted_at(home))
    }

    /// Get the primary config file path (config.toml)
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Ensure all directories exist with proper permissions
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
                }
            }
        }
        Ok(())
    }
}

/// Get the effective home directory for the application.
pub fn get_enom_home() -> Option<PathBuf> {
    AppDirs::new().map(|dirs| dirs.data_dir)
}

//! OS keychain access for enom.
//!
//! The credential itself lives in an encrypted file; the keychain only holds
//! the random data key that file is sealed with:
//! - Windows: Credential Manager
//! - macOS: Keychain
//! - Linux: kernel keyutils / Secret Service
//!
//! Callers are expected to treat [`KeyringError::Unavailable`] as "no
//! keychain on this machine" and fall back to another key source.

use thiserror::Error;
use tracing::{debug, warn};

/// Service name under which every enom secret is filed.
pub const DEFAULT_SERVICE: &str = "enom";

/// Account holding the base64 data key for the credential file.
pub const DATA_KEY_ACCOUNT: &str = "credential-key";

#[derive(Error, Debug)]
pub enum KeyringError {
    /// No usable keychain backend (headless session, locked store, sandbox).
    #[error("Keychain unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write keychain entry '{account}': {reason}")]
    WriteFailed { account: String, reason: String },

    #[error("Failed to delete keychain entry '{account}': {reason}")]
    DeleteFailed { account: String, reason: String },

    #[error("Keychain error: {0}")]
    Internal(String),
}

impl KeyringError {
    /// Whether the failure means the backend itself is missing, as opposed to
    /// an error on one entry.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, KeyringError::Unavailable(_))
    }
}

impl From<keyring::Error> for KeyringError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoStorageAccess(e) => KeyringError::Unavailable(e.to_string()),
            keyring::Error::PlatformFailure(e) => KeyringError::Unavailable(e.to_string()),
            other => KeyringError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeyringError>;

/// Keychain entries scoped to one service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
    detached: bool,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    /// Use a different service name, e.g. to isolate test runs.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            detached: false,
        }
    }

    /// A store with no backend: every operation reports
    /// [`KeyringError::Unavailable`], as on a headless machine.
    pub fn detached(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            detached: true,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry> {
        if self.detached {
            return Err(KeyringError::Unavailable(format!(
                "no keychain backend for service '{}'",
                self.service
            )));
        }
        keyring::Entry::new(&self.service, account).map_err(KeyringError::from)
    }

    pub fn set(&self, account: &str, secret: &str) -> Result<()> {
        self.entry(account)?.set_password(secret).map_err(|e| {
            warn!(service = %self.service, account, error = %e, "Keychain write failed");
            match KeyringError::from(e) {
                KeyringError::Internal(reason) => KeyringError::WriteFailed {
                    account: account.to_string(),
                    reason,
                },
                other => other,
            }
        })?;
        debug!(service = %self.service, account, "Stored keychain entry");
        Ok(())
    }

    /// Read an entry; a missing entry is `Ok(None)`.
    pub fn get(&self, account: &str) -> Result<Option<String>> {
        match self.entry(account)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeyringError::from(e)),
        }
    }

    /// Delete an entry. Returns whether anything was removed.
    pub fn delete(&self, account: &str) -> Result<bool> {
        match self.entry(account)?.delete_credential() {
            Ok(()) => {
                debug!(service = %self.service, account, "Deleted keychain entry");
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => match KeyringError::from(e) {
                KeyringError::Internal(reason) => Err(KeyringError::DeleteFailed {
                    account: account.to_string(),
                    reason,
                }),
                other => Err(other),
            },
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

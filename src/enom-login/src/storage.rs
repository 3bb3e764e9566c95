//! The process-wide credential store.
//!
//! One [`CredentialStore`] is shared (behind an `Arc`) by the request executor
//! and the login flow. Reads are snapshot clones; writes swap the whole value.
//! Persistence is best effort: failures are logged and the in-memory value
//! stays authoritative for the rest of the process.

use anyhow::{Context, Result};
use enom_common::{ApiConfig, HttpContext, StorageConfig};
use parking_lot::RwLock;
use reqwest::header::REFERER;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::constants::{CREDENTIAL_FILE, NAV_PATH};
use crate::cookie::capture_credential;
use crate::encrypted::{KeySource, open, seal};
use crate::error::LoginError;
use crate::handoff::parse_handoff;
use crate::legacy::{legacy_path, load_legacy};
use crate::types::Credential;
use crate::utils::{safe_format_key, secure_delete, set_file_permissions};

/// How [`CredentialStore::init`] ended up with its credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Read from the credential file.
    Restored,
    /// Converted from the legacy cookie file.
    Migrated,
    /// Handed out by the upstream to an anonymous visitor. Not persisted.
    Guest,
    /// Nothing found; requests go out unauthenticated.
    Empty,
}

/// How a credential was written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    Encrypted,
    Plaintext,
}

pub struct CredentialStore {
    home: PathBuf,
    keys: KeySource,
    current: RwLock<Option<Credential>>,
}

impl CredentialStore {
    pub fn new(home: impl Into<PathBuf>, keys: KeySource) -> Self {
        Self {
            home: home.into(),
            keys,
            current: RwLock::new(None),
        }
    }

    pub fn from_config(home: impl Into<PathBuf>, storage: &StorageConfig) -> Self {
        Self::new(home, KeySource::from_mode(storage.encryption))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn credential_path(&self) -> PathBuf {
        self.home.join(CREDENTIAL_FILE)
    }

    pub fn legacy_path(&self) -> PathBuf {
        legacy_path(&self.home)
    }

    /// Current credential, if any. Never blocks on I/O.
    pub fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    /// Replace the current credential and persist it.
    ///
    /// An empty credential is the same as [`clear`](Self::clear).
    pub fn set(&self, credential: Credential) {
        if credential.is_empty() {
            self.clear();
            return;
        }

        *self.current.write() = Some(credential.clone());
        match self.persist(&credential) {
            Ok(mode) => debug!(?mode, credential = %safe_format_key(credential.expose()), "Stored credential"),
            Err(e) => warn!(error = %e, "Failed to persist credential, keeping it in memory"),
        }
    }

    /// Load the credential at startup.
    ///
    /// Order: credential file, legacy cookie file (migrated on success),
    /// guest bootstrap against the nav endpoint. Never fails; the worst case
    /// is [`InitOutcome::Empty`].
    pub async fn init(&self, http: &HttpContext, api: &ApiConfig) -> InitOutcome {
        match self.load_persisted() {
            Ok(Some(credential)) => {
                *self.current.write() = Some(credential);
                info!("Restored stored credential");
                return InitOutcome::Restored;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Stored credential unreadable, ignoring it"),
        }

        match load_legacy(&self.home) {
            Ok(Some(credential)) => {
                self.migrate(credential);
                return InitOutcome::Migrated;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Legacy cookie file unreadable, ignoring it"),
        }

        match self.bootstrap_guest(http, api).await {
            Some(credential) => {
                *self.current.write() = Some(credential);
                info!("Using guest session");
                InitOutcome::Guest
            }
            None => {
                info!("No credential available, continuing unauthenticated");
                InitOutcome::Empty
            }
        }
    }

    /// Forget the credential in memory and on disk, legacy file included.
    pub fn clear(&self) {
        *self.current.write() = None;

        for path in [self.credential_path(), self.legacy_path()] {
            match secure_delete(&path) {
                Ok(true) => debug!(path = %path.display(), "Deleted credential file"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, path = %path.display(), "Failed to delete credential file"),
            }
        }
    }

    /// Apply an `eno-m://...?cookie=` hand-off URL.
    ///
    /// Returns whether a credential was applied.
    pub fn apply_handoff(&self, url: &str) -> Result<bool, LoginError> {
        match parse_handoff(url)? {
            Some(credential) => {
                self.set(credential);
                info!("Credential set from hand-off URL");
                Ok(true)
            }
            None => {
                debug!("Hand-off URL carried no credential");
                Ok(false)
            }
        }
    }

    fn migrate(&self, credential: Credential) {
        *self.current.write() = Some(credential.clone());
        match self.persist(&credential) {
            Ok(mode) => {
                if let Err(e) = secure_delete(&self.legacy_path()) {
                    warn!(error = %e, "Migrated credential but could not delete legacy file");
                }
                info!(?mode, "Migrated credential from legacy cookie file");
            }
            Err(e) => {
                // The legacy file stays so the next start can retry.
                warn!(error = %e, "Failed to persist migrated credential");
            }
        }
    }

    async fn bootstrap_guest(&self, http: &HttpContext, api: &ApiConfig) -> Option<Credential> {
        let url = match Url::parse(&format!("{}{}", api.api_base.trim_end_matches('/'), NAV_PATH)) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, base = %api.api_base, "Invalid API base for guest bootstrap");
                return None;
            }
        };

        let response = match http
            .client
            .get(url.clone())
            .header(REFERER, api.referer.as_str())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Guest bootstrap request failed");
                return None;
            }
        };

        debug!(status = %response.status(), "Guest bootstrap response");
        capture_credential(http, response.headers(), &url)
    }

    fn load_persisted(&self) -> Result<Option<Credential>> {
        let path = self.credential_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = Zeroizing::new(
            std::fs::read(&path)
                .with_context(|| format!("Failed to read credential file: {}", path.display()))?,
        );
        let text = Zeroizing::new(open(&data, &self.keys)?);
        let credential = Credential::new(text.as_str());
        Ok((!credential.is_empty()).then_some(credential))
    }

    fn persist(&self, credential: &Credential) -> Result<PersistMode> {
        std::fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create directory: {}", self.home.display()))?;

        let (bytes, mode) = match self.keys.key_for_write() {
            Some(key) => (seal(credential.expose(), &key)?, PersistMode::Encrypted),
            None => {
                warn!("No encryption key available, storing credential as plaintext");
                (credential.expose().as_bytes().to_vec(), PersistMode::Plaintext)
            }
        };

        let path = self.credential_path();
        std::fs::write(&path, Zeroizing::new(bytes).as_slice())
            .with_context(|| format!("Failed to write credential file: {}", path.display()))?;
        set_file_permissions(&path)?;
        Ok(mode)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("home", &self.home)
            .field("keys", &self.keys)
            .field("current", &self.current.read().as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

//! The session credential.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::constants::CSRF_COOKIE;

/// Opaque session token: `name=value` pairs joined by `; `, as sent in a
/// `Cookie` header.
///
/// Cloning is cheap and shares the underlying secret. `Debug` never prints
/// the value.
#[derive(Clone)]
pub struct Credential(Arc<SecretString>);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self(Arc::new(SecretString::from(value.trim().to_string())))
    }

    /// Join cookie pairs into one credential, skipping empty names.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let joined = pairs
            .into_iter()
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Self::new(joined)
    }

    /// The raw header value.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Iterate `(name, value)` pairs. Segments without `=` are skipped.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.expose()
            .split(';')
            .filter_map(|segment| segment.trim().split_once('='))
            .map(|(name, value)| (name.trim(), value.trim()))
            .filter(|(name, _)| !name.is_empty())
    }

    /// Value of the named pair, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// CSRF token required by write endpoints.
    pub fn csrf_token(&self) -> Option<&str> {
        self.get(CSRF_COOKIE).filter(|v| !v.is_empty())
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("pairs", &self.pairs().count())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

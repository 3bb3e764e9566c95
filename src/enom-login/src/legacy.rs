//! Cookie file left behind by the old desktop client (deprecated).
//!
//! Two shapes exist in the wild:
//! `{"cookie": "a=1; b=2"}` and `{"cookies": [{"name": "a", "value": "1"}]}`.
//! The file is only ever read for migration and then securely deleted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::LEGACY_COOKIE_FILE;
use crate::types::Credential;

#[derive(Debug, Deserialize)]
struct LegacyCookieFile {
    #[serde(default)]
    cookie: Option<String>,
    #[serde(default)]
    cookies: Option<Vec<LegacyCookie>>,
}

#[derive(Debug, Deserialize)]
struct LegacyCookie {
    name: String,
    #[serde(default)]
    value: String,
}

pub(crate) fn legacy_path(home: &Path) -> PathBuf {
    home.join(LEGACY_COOKIE_FILE)
}

/// Read the legacy file. `Ok(None)` when absent or holding no cookie.
pub(crate) fn load_legacy(home: &Path) -> Result<Option<Credential>> {
    let path = legacy_path(home);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read legacy cookie file: {}", path.display()))?;
    let parsed: LegacyCookieFile =
        serde_json::from_str(&content).context("Failed to parse legacy cookie file")?;

    let credential = match (parsed.cookie, parsed.cookies) {
        (Some(cookie), _) if !cookie.trim().is_empty() => Credential::new(cookie),
        (_, Some(cookies)) => Credential::from_pairs(
            cookies
                .iter()
                .map(|c| (c.name.as_str(), c.value.as_str())),
        ),
        _ => return Ok(None),
    };

    Ok((!credential.is_empty()).then_some(credential))
}

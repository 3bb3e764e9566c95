//! `eno-m://` hand-off URLs.
//!
//! A browser helper can pass a logged-in session to the app by opening
//! `eno-m://login?cookie=<url-encoded credential>`.

use url::Url;

use crate::constants::{HANDOFF_PARAM, HANDOFF_SCHEME};
use crate::error::LoginError;
use crate::types::Credential;

/// Extract the credential from a hand-off URL.
///
/// Returns `Ok(None)` for a well-formed hand-off URL without a `cookie`
/// parameter; any other scheme is an error.
pub fn parse_handoff(raw: &str) -> Result<Option<Credential>, LoginError> {
    let url = Url::parse(raw.trim()).map_err(|e| LoginError::InvalidHandoff(e.to_string()))?;
    if url.scheme() != HANDOFF_SCHEME {
        return Err(LoginError::InvalidHandoff(format!(
            "expected {HANDOFF_SCHEME}:// scheme, got {}://",
            url.scheme()
        )));
    }

    Ok(url
        .query_pairs()
        .find(|(key, _)| key == HANDOFF_PARAM)
        .map(|(_, value)| Credential::new(value.into_owned()))
        .filter(|credential| !credential.is_empty()))
}

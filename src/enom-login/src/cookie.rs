//! Capturing a credential from an upstream response.

use enom_common::HttpContext;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::debug;
use url::Url;

use crate::types::Credential;

/// Join the `name=value` part of every `Set-Cookie` header with `; `.
pub fn credential_from_set_cookie(headers: &HeaderMap) -> Option<Credential> {
    let joined = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect::<Vec<_>>()
        .join("; ");

    let credential = Credential::new(joined);
    (!credential.is_empty()).then_some(credential)
}

/// Cookies the shared jar would send to `url`.
pub fn credential_from_jar(jar: &Jar, url: &Url) -> Option<Credential> {
    let header = jar.cookies(url)?;
    let credential = Credential::new(header.to_str().ok()?);
    (!credential.is_empty()).then_some(credential)
}

/// Response headers first, jar second.
///
/// The headers are recorded into the jar as well, so a later fallback read
/// sees them.
pub(crate) fn capture_credential(http: &HttpContext, headers: &HeaderMap, url: &Url) -> Option<Credential> {
    http.record_cookies(headers, url);
    if let Some(credential) = credential_from_set_cookie(headers) {
        return Some(credential);
    }
    debug!(url = %url, "No Set-Cookie headers, reading cookie jar");
    credential_from_jar(&http.jar, url)
}

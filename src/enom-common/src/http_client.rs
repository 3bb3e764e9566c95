//! Centralized HTTP client factory.
//!
//! Every upstream call in the process goes through one `reqwest::Client`.
//! The client never attaches cookies on its own: the credential store is the
//! only source of the `Cookie` header. Responses that hand out cookies are
//! recorded into a side jar, which the QR login reads as a fallback.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Url;

use crate::config::ApiConfig;

/// Connection pool idle timeout so DNS is re-resolved periodically.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// An HTTP client together with the jar that records response cookies.
#[derive(Clone)]
pub struct HttpContext {
    pub client: Client,
    /// Read-only to the client; filled through [`HttpContext::record_cookies`].
    pub jar: Arc<Jar>,
}

impl HttpContext {
    /// Build a client and a fresh cookie jar from the API configuration.
    pub fn new(api: &ApiConfig) -> Result<Self, String> {
        Ok(Self {
            client: create_client(api)?,
            jar: Arc::new(Jar::default()),
        })
    }

    /// Store the `Set-Cookie` headers of a response received from `url`.
    pub fn record_cookies(&self, headers: &HeaderMap, url: &Url) {
        let mut cookies = headers.get_all(SET_COOKIE).iter().peekable();
        if cookies.peek().is_some() {
            self.jar.set_cookies(&mut cookies, url);
        }
    }
}

/// Creates the process HTTP client.
///
/// Includes: browser User-Agent, tcp_nodelay, the configured timeout and a
/// read timeout capped at 60s to prevent hangs on truncated bodies. No cookie
/// provider is installed.
pub fn create_client(api: &ApiConfig) -> Result<Client, String> {
    let timeout = api.timeout();
    let read_timeout = timeout.min(Duration::from_secs(60));

    Client::builder()
        .user_agent(api.user_agent.as_str())
        .timeout(timeout)
        .read_timeout(read_timeout)
        .tcp_nodelay(true)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .pool_max_idle_per_host(4)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))
}

//! WBI key discovery.
//!
//! Keys come from the nav endpoint's `data.wbi_img` image URLs. Fetching
//! never fails: any problem yields empty keys, which callers treat as
//! "send unsigned".

use std::time::Duration;

use enom_login::Credential;
use enom_wbi::WbiKeys;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::{COOKIE, REFERER};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

struct CachedKeys {
    keys: WbiKeys,
    credential: Option<Credential>,
    fetched_at: Instant,
}

pub struct KeyProvider {
    http: Client,
    nav_url: String,
    referer: String,
    ttl: Option<Duration>,
    cache: Mutex<Option<CachedKeys>>,
}

impl KeyProvider {
    /// `ttl` of `None` disables caching.
    pub fn new(
        http: Client,
        nav_url: impl Into<String>,
        referer: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            http,
            nav_url: nav_url.into(),
            referer: referer.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Keys for requests made with `credential`.
    ///
    /// Served from cache while fresh and fetched with the same credential.
    pub async fn fetch(&self, credential: Option<&Credential>) -> WbiKeys {
        if let Some(keys) = self.cached(credential) {
            debug!("WBI keys served from cache");
            return keys;
        }

        let keys = self.fetch_uncached(credential).await;
        if keys.is_usable() && self.ttl.is_some() {
            *self.cache.lock() = Some(CachedKeys {
                keys: keys.clone(),
                credential: credential.cloned(),
                fetched_at: Instant::now(),
            });
        }
        keys
    }

    /// Drop cached keys, e.g. after the upstream rejected a signature.
    pub fn invalidate(&self) {
        if self.cache.lock().take().is_some() {
            debug!("WBI key cache invalidated");
        }
    }

    fn cached(&self, credential: Option<&Credential>) -> Option<WbiKeys> {
        let ttl = self.ttl?;
        let cache = self.cache.lock();
        let entry = cache.as_ref()?;
        let fresh = entry.fetched_at.elapsed() < ttl;
        let same_session = entry.credential.as_ref() == credential;
        (fresh && same_session).then(|| entry.keys.clone())
    }

    async fn fetch_uncached(&self, credential: Option<&Credential>) -> WbiKeys {
        let mut request = self
            .http
            .get(&self.nav_url)
            .header(REFERER, self.referer.as_str());
        if let Some(credential) = credential {
            request = request.header(COOKIE, credential.expose());
        }

        let body: Value = match request.send().await {
            Ok(response) => match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Nav response unreadable, signing disabled for this call");
                    return WbiKeys::empty();
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to fetch WBI keys, signing disabled for this call");
                return WbiKeys::empty();
            }
        };

        // The nav reply carries wbi_img even for anonymous sessions (code -101).
        let wbi_img = &body["data"]["wbi_img"];
        match (wbi_img["img_url"].as_str(), wbi_img["sub_url"].as_str()) {
            (Some(img_url), Some(sub_url)) => {
                let keys = WbiKeys::from_urls(img_url, sub_url);
                if !keys.is_usable() {
                    warn!("Nav response carried empty WBI key URLs");
                }
                keys
            }
            _ => {
                warn!(code = %body["code"], "Nav response has no wbi_img");
                WbiKeys::empty()
            }
        }
    }
}

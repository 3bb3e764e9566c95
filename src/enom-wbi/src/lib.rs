//! WBI request signing.
//!
//! Some upstream endpoints only accept a query string carrying a `w_rid`
//! signature. The signature is an MD5 over the sorted, encoded query plus a
//! 32-character "mixin key" derived from two rotating keys the upstream
//! publishes in its nav response.
//!
//! Everything in this crate is pure: no I/O, no clock access except in
//! [`sign`], which reads the current Unix time and defers to [`sign_at`].

mod encode;
mod mixin;
mod sign;

use serde::{Deserialize, Serialize};

pub use encode::{encode_plain, is_empty_value, scalar_to_string};
pub use mixin::{MIXIN_KEY_ENC_TAB, mixin_key};
pub use sign::{sign, sign_at, strip_reserved};

/// Request parameters in insertion order.
pub type Params = indexmap::IndexMap<String, serde_json::Value>;

/// The two rotating keys the signer mixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WbiKeys {
    pub img_key: String,
    pub sub_key: String,
}

impl WbiKeys {
    pub fn new(img_key: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            img_key: img_key.into(),
            sub_key: sub_key.into(),
        }
    }

    /// Keys meaning "signing unavailable".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Both halves present. Anything less means the caller must send unsigned.
    pub fn is_usable(&self) -> bool {
        !self.img_key.is_empty() && !self.sub_key.is_empty()
    }

    /// Build keys from the two image URLs of a nav response.
    pub fn from_urls(img_url: &str, sub_url: &str) -> Self {
        Self::new(key_from_url(img_url), key_from_url(sub_url))
    }
}

/// Extract the key fragment from a key image URL: the file name of the last
/// path segment without its extension.
///
/// `https://i0.hdslb.com/bfs/wbi/7cd0849413.png` yields `7cd0849413`.
pub fn key_from_url(url: &str) -> &str {
    let file = url.rsplit('/').next().unwrap_or(url);
    match file.rfind('.') {
        Some(dot) => &file[..dot],
        None => file,
    }
}

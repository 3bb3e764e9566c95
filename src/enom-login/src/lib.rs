//! Enom Login - session credential handling.
//!
//! - [`CredentialStore`]: the one live credential, persisted encrypted at rest,
//!   migrated from the old `cookies.json`, bootstrapped as a guest session.
//! - [`QrLogin`]: generate/poll QR login against the passport service.
//! - Hand-off URLs (`eno-m://...?cookie=`) from the browser helper.
//!
//! Security features:
//! - AES-256-GCM with a keychain-held or machine-derived data key
//! - Secrets wrapped in `secrecy` and zeroized after use
//! - File permissions enforced (0600)

pub mod constants;
mod cookie;
mod encrypted;
mod error;
mod handoff;
mod legacy;
mod qr;
mod storage;
mod types;
mod utils;

pub use constants::{CREDENTIAL_FILE, CSRF_COOKIE, HANDOFF_SCHEME, LEGACY_COOKIE_FILE, NAV_PATH};
pub use cookie::{credential_from_jar, credential_from_set_cookie};
pub use encrypted::KeySource;
pub use error::LoginError;
pub use handoff::parse_handoff;
pub use qr::{QrLogin, QrPollResult, QrSession, QrStatus, render_qr_data_url};
pub use storage::{CredentialStore, InitOutcome, PersistMode};
pub use types::Credential;
pub use utils::safe_format_key;

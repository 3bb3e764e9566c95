//! Constants for the enom-login crate.

/// File holding the current credential (encrypted when a data key exists).
pub const CREDENTIAL_FILE: &str = "credential.bin";

/// Cookie file written by the old desktop client, read once for migration.
pub const LEGACY_COOKIE_FILE: &str = "cookies.json";

/// URL scheme the browser extension uses to hand a credential over.
pub const HANDOFF_SCHEME: &str = "eno-m";

/// Query parameter carrying the credential in a hand-off URL.
pub const HANDOFF_PARAM: &str = "cookie";

/// Cookie pair holding the CSRF token for write endpoints.
pub const CSRF_COOKIE: &str = "bili_jct";

/// Profile endpoint used for guest bootstrap and key discovery.
pub const NAV_PATH: &str = "/x/web-interface/nav";

pub const QR_GENERATE_PATH: &str = "/x/passport-login/web/qrcode/generate";
pub const QR_POLL_PATH: &str = "/x/passport-login/web/qrcode/poll";

/// `data.code` values of the QR poll response.
pub const QR_CODE_CONFIRMED: i64 = 0;
pub const QR_CODE_NOT_SCANNED: i64 = 86101;
pub const QR_CODE_SCANNED: i64 = 86090;
pub const QR_CODE_EXPIRED: i64 = 86038;

/// Minimum edge length of the rendered QR image, in pixels.
pub const QR_IMAGE_MIN_SIZE: u32 = 300;

//! QR code login against the passport service.
//!
//! `generate` asks for a login ticket and renders its URL as a PNG; the user
//! scans it with the mobile app; `poll` is then called on a cadence chosen by
//! the caller until the status is terminal. Ambiguous poll replies (unknown
//! codes, transport errors, non-zero envelopes) map to `Pending` so the caller
//! simply keeps polling.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use enom_common::{ApiConfig, HttpContext};
use image::Luma;
use qrcode::{EcLevel, QrCode};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, ORIGIN, REFERER};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{
    QR_CODE_CONFIRMED, QR_CODE_EXPIRED, QR_CODE_NOT_SCANNED, QR_CODE_SCANNED, QR_GENERATE_PATH,
    QR_IMAGE_MIN_SIZE, QR_POLL_PATH,
};
use crate::cookie::capture_credential;
use crate::error::LoginError;
use crate::storage::CredentialStore;
use crate::types::Credential;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QrStatus {
    Pending,
    Scanned,
    Confirmed,
    Failed,
}

impl QrStatus {
    /// `Confirmed` and `Failed` end the flow.
    pub fn is_terminal(self) -> bool {
        matches!(self, QrStatus::Confirmed | QrStatus::Failed)
    }

    fn from_scan_code(code: i64) -> Self {
        match code {
            QR_CODE_CONFIRMED => QrStatus::Confirmed,
            QR_CODE_SCANNED => QrStatus::Scanned,
            QR_CODE_EXPIRED => QrStatus::Failed,
            QR_CODE_NOT_SCANNED => QrStatus::Pending,
            _ => QrStatus::Pending,
        }
    }
}

impl fmt::Display for QrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QrStatus::Pending => "pending",
            QrStatus::Scanned => "scanned",
            QrStatus::Confirmed => "confirmed",
            QrStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A generated login ticket and its current status.
#[derive(Debug, Clone)]
pub struct QrSession {
    pub login_url: String,
    pub session_key: String,
    /// `data:image/png;base64,...`; empty when rendering failed.
    pub qr_image: String,
    pub status: QrStatus,
}

impl QrSession {
    /// Record a poll result. Terminal states are sticky.
    pub fn advance(&mut self, status: QrStatus) -> QrStatus {
        if !self.status.is_terminal() {
            self.status = status;
        }
        self.status
    }

    /// Raw PNG bytes of the QR image.
    pub fn qr_png(&self) -> Option<Vec<u8>> {
        let encoded = self.qr_image.strip_prefix(PNG_DATA_URL_PREFIX)?;
        BASE64.decode(encoded).ok()
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone)]
pub struct QrPollResult {
    pub status: QrStatus,
    /// Present only on the poll that confirmed the login.
    pub credential: Option<Credential>,
    pub message: String,
}

impl QrPollResult {
    fn pending(message: impl Into<String>) -> Self {
        Self {
            status: QrStatus::Pending,
            credential: None,
            message: message.into(),
        }
    }
}

pub struct QrLogin {
    http: HttpContext,
    passport_base: String,
    referer: String,
    store: Arc<CredentialStore>,
}

impl QrLogin {
    pub fn new(http: HttpContext, api: &ApiConfig, store: Arc<CredentialStore>) -> Self {
        Self {
            http,
            passport_base: api.passport_base.trim_end_matches('/').to_string(),
            referer: api.referer.clone(),
            store,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, LoginError> {
        Url::parse(&format!("{}{}", self.passport_base, path))
            .map_err(|e| LoginError::BadResponse(format!("invalid passport URL: {e}")))
    }

    /// GET a passport endpoint with browser-like headers.
    async fn get_json(&self, url: Url) -> Result<(HeaderMap, Value), LoginError> {
        let mut request = self
            .http
            .client
            .get(url)
            .header(REFERER, self.referer.as_str())
            .header(ORIGIN, self.passport_base.as_str())
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8");
        // An existing session lowers the chance of the request being flagged.
        if let Some(credential) = self.store.get() {
            request = request.header(COOKIE, credential.expose());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LoginError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let json = serde_json::from_str(&body)
            .map_err(|e| LoginError::BadResponse(format!("response is not JSON: {e}")))?;
        Ok((headers, json))
    }

    /// Request a login ticket and render it as a QR image.
    pub async fn generate(&self) -> Result<QrSession, LoginError> {
        let (_, json) = self.get_json(self.endpoint(QR_GENERATE_PATH)?).await?;

        if json["code"].as_i64() != Some(0) {
            return Err(LoginError::BadResponse(format!(
                "generate returned code {}: {}",
                json["code"],
                json["message"].as_str().unwrap_or("no message")
            )));
        }

        let data = &json["data"];
        let login_url = data["url"]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoginError::BadResponse("generate response has no url".into()))?
            .to_string();
        let session_key = ["qrcode_key", "oauthKey", "key"]
            .iter()
            .find_map(|field| data[*field].as_str().filter(|s| !s.is_empty()))
            .ok_or_else(|| LoginError::BadResponse("generate response has no session key".into()))?
            .to_string();

        let qr_image = match render_qr_data_url(&login_url) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Failed to render QR image");
                String::new()
            }
        };

        info!("Generated login QR code");
        Ok(QrSession {
            login_url,
            session_key,
            qr_image,
            status: QrStatus::Pending,
        })
    }

    /// Poll the ticket once. Never fails: anything unexpected is `Pending`.
    ///
    /// On confirmation the credential is captured from the response's
    /// `Set-Cookie` headers (or the cookie jar) and stored.
    pub async fn poll(&self, session_key: &str) -> QrPollResult {
        let mut url = match self.endpoint(QR_POLL_PATH) {
            Ok(url) => url,
            Err(e) => return QrPollResult::pending(e.to_string()),
        };
        url.query_pairs_mut().append_pair("qrcode_key", session_key);

        let (headers, json) = match self.get_json(url.clone()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "QR poll failed, will keep polling");
                return QrPollResult::pending(format!("network error: {e}; retrying"));
            }
        };

        if json["code"].as_i64() != Some(0) {
            warn!(code = %json["code"], "QR poll envelope not ok");
            return QrPollResult::pending(
                json["message"].as_str().unwrap_or("server error").to_string(),
            );
        }

        let code = json["data"]["code"].as_i64().unwrap_or(-1);
        let status = QrStatus::from_scan_code(code);
        debug!(code, %status, "QR poll");

        match status {
            QrStatus::Confirmed => {
                let credential = capture_credential(&self.http, &headers, &url);
                match &credential {
                    Some(credential) => {
                        self.store.set(credential.clone());
                        info!("QR login confirmed");
                    }
                    None => warn!("QR login confirmed but no cookies were returned"),
                }
                QrPollResult {
                    status,
                    credential,
                    message: "login confirmed".into(),
                }
            }
            QrStatus::Scanned => QrPollResult {
                status,
                credential: None,
                message: "scanned, confirm on your phone".into(),
            },
            QrStatus::Failed => QrPollResult {
                status,
                credential: None,
                message: "QR code expired, generate a new one".into(),
            },
            QrStatus::Pending if code == QR_CODE_NOT_SCANNED => {
                QrPollResult::pending("waiting for scan")
            }
            QrStatus::Pending => {
                let detail = json["data"]["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| code.to_string());
                QrPollResult::pending(format!("status {detail}; still waiting"))
            }
        }
    }

    /// Poll unless the session already reached a terminal state, and record
    /// the result on the session.
    ///
    /// Once terminal, no further requests are made and the credential is not
    /// handed out again.
    pub async fn poll_session(&self, session: &mut QrSession) -> QrPollResult {
        if session.status.is_terminal() {
            return QrPollResult {
                status: session.status,
                credential: None,
                message: format!("session already {}", session.status),
            };
        }

        let result = self.poll(&session.session_key).await;
        session.advance(result.status);
        result
    }
}

/// Render `content` as a PNG QR code (high error correction) in a data URL.
pub fn render_qr_data_url(content: &str) -> anyhow::Result<String> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::H)
        .map_err(|e| anyhow::anyhow!("QR encoding failed: {e}"))?;
    let pixels = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_IMAGE_MIN_SIZE, QR_IMAGE_MIN_SIZE)
        .build();

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(pixels)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .context("PNG encoding failed")?;

    Ok(format!("{PNG_DATA_URL_PREFIX}{}", BASE64.encode(&png)))
}

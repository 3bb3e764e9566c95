//! The request executor.

use std::sync::Arc;

use enom_common::{EnomConfig, HttpContext};
use enom_dispatch::{DelayRange, Dispatcher};
use enom_login::{Credential, CredentialStore, NAV_PATH};
use enom_wbi::{Params, WbiKeys, encode_plain, scalar_to_string, sign};
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::endpoint::{BodyEncoding, EndpointSpec, HttpMethod};
use crate::error::ApiError;
use crate::keys::KeyProvider;
use crate::pipeline::Sink;
use crate::registry::EndpointRegistry;

/// Envelope code the upstream uses when it rejects a WBI signature.
const SIGNATURE_REJECTED: i64 = -403;

const ERROR_BODY_LEN: usize = 200;

/// The logged-in user as reported by the nav endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub is_login: bool,
    pub uname: Option<String>,
    pub face: Option<String>,
    pub mid: Option<u64>,
}

struct Prepared {
    query: Params,
    /// Present when the query must be signed.
    keys: Option<WbiKeys>,
    body: Option<Params>,
}

impl Prepared {
    /// Encoded query string. Signing stamps `wts` with the current time, so
    /// this runs when the request leaves the queue.
    fn query_string(&self) -> String {
        match &self.keys {
            Some(keys) => sign(&self.query, keys),
            None => encode_plain(&self.query),
        }
    }
}

pub struct ApiClient {
    http: Client,
    registry: Arc<EndpointRegistry>,
    store: Arc<CredentialStore>,
    keys: KeyProvider,
    dispatcher: Dispatcher,
    user_agent: String,
    referer: String,
}

impl ApiClient {
    /// Wire up the built-in endpoint table from configuration.
    ///
    /// Starts the request queue, so it must be called inside a Tokio runtime.
    pub fn new(http: &HttpContext, config: &EnomConfig, store: Arc<CredentialStore>) -> Self {
        let api = &config.api;
        let keys = KeyProvider::new(
            http.client.clone(),
            format!("{}{}", api.api_base.trim_end_matches('/'), NAV_PATH),
            api.referer.clone(),
            config.signing.key_cache_ttl(),
        );
        let dispatcher = Dispatcher::new(DelayRange::new(
            config.dispatch.min_delay(),
            config.dispatch.max_delay(),
        ));

        Self {
            http: http.client.clone(),
            registry: Arc::new(EndpointRegistry::builtin(api)),
            store,
            keys,
            dispatcher,
            user_agent: api.user_agent.clone(),
            referer: api.referer.clone(),
        }
    }

    /// Replace the endpoint table.
    pub fn with_registry(mut self, registry: EndpointRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub async fn invoke(&self, name: &str, params: Params) -> Result<Value, ApiError> {
        self.invoke_with_sink(name, params, None).await
    }

    /// Resolve `name`, build the request, send it through the queue and run
    /// the endpoint's response pipeline.
    pub async fn invoke_with_sink(
        &self,
        name: &str,
        params: Params,
        sink: Option<&Sink>,
    ) -> Result<Value, ApiError> {
        let spec = self.registry.resolve(name)?;
        validate_params(&params)?;

        let credential = self.store.get();
        let mut prepared = self.prepare(spec, params, credential.as_ref()).await;
        debug!(endpoint = %spec.name, method = spec.method.as_str(), url = %spec.url, signed = prepared.keys.is_some(), "Dispatching request");

        let body = prepared.body.take();
        let mut request = self.build_request(spec, body, credential.as_ref()).build()?;
        let client = self.http.clone();
        let (status, text) = self
            .dispatcher
            .schedule(async move {
                let query = join_query(request.url().query(), &prepared.query_string());
                request.url_mut().set_query(query.as_deref());
                let response = client.execute(request).await?;
                let status = response.status();
                let text = response.text().await?;
                Ok::<_, reqwest::Error>((status, text))
            })
            .await??;

        if !status.is_success() {
            warn!(endpoint = %spec.name, status = status.as_u16(), "Upstream returned error status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_LEN).collect(),
            });
        }

        if spec.signed && envelope_code(&text) == Some(SIGNATURE_REJECTED) {
            warn!(endpoint = %spec.name, "Signature rejected, refreshing WBI keys next time");
            self.keys.invalidate();
        }

        spec.pipeline.run(text, sink)
    }

    /// Who the current credential belongs to.
    pub async fn current_user(&self) -> Result<UserProfile, ApiError> {
        let nav = self.invoke("getNav", Params::new()).await?;
        if nav["code"].as_i64() != Some(0) {
            return Ok(UserProfile::default());
        }

        let data = &nav["data"];
        let profile = UserProfile {
            is_login: data["isLogin"].as_bool().unwrap_or(false),
            uname: data["uname"].as_str().map(str::to_string),
            face: data["face"].as_str().map(str::to_string),
            mid: data["mid"].as_u64(),
        };
        info!(is_login = profile.is_login, "Fetched current user");
        Ok(profile)
    }

    async fn prepare(
        &self,
        spec: &EndpointSpec,
        caller: Params,
        credential: Option<&Credential>,
    ) -> Prepared {
        let mut query = spec.params.clone();
        let mut body = spec.body.clone();

        for (key, value) in caller {
            match body.as_mut() {
                Some(body) if body.contains_key(&key) => {
                    body.insert(key, value);
                }
                _ => {
                    query.insert(key, value);
                }
            }
        }

        if spec.csrf {
            if let Some(body) = body.as_mut() {
                fill_csrf(body, credential);
            }
        }

        let keys = if spec.signed {
            let keys = self.keys.fetch(credential).await;
            if keys.is_usable() {
                Some(keys)
            } else {
                debug!(endpoint = %spec.name, "WBI keys unavailable, sending unsigned");
                None
            }
        } else {
            None
        };

        Prepared { query, keys, body }
    }

    fn build_request(
        &self,
        spec: &EndpointSpec,
        body: Option<Params>,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let method = match spec.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };

        let mut request = self
            .http
            .request(method, &spec.url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(REFERER, self.referer.as_str());
        if let Some(credential) = credential {
            request = request.header(COOKIE, credential.expose());
        }
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if spec.method == HttpMethod::Get {
            return request;
        }

        let body = body.unwrap_or_default();
        match spec.encoding {
            BodyEncoding::Form => {
                // Unlike the query string, the form body keeps empty values.
                let pairs: Vec<(&str, String)> = body
                    .iter()
                    .map(|(key, value)| (key.as_str(), scalar_to_string(value)))
                    .collect();
                request = request.form(&pairs);
            }
            BodyEncoding::Json => {
                request = request.json(&body);
            }
        }
        request
    }
}

/// Only scalars can be encoded into a query or form body.
fn validate_params(params: &Params) -> Result<(), ApiError> {
    for (name, value) in params {
        if value.is_array() || value.is_object() {
            return Err(ApiError::InvalidParams {
                name: name.clone(),
                reason: "only strings, numbers, booleans and null are allowed".into(),
            });
        }
    }
    Ok(())
}

fn fill_csrf(body: &mut Params, credential: Option<&Credential>) {
    let empty = body
        .get("csrf")
        .is_none_or(|v| v.is_null() || v.as_str() == Some(""));
    if !empty {
        return;
    }

    match credential.and_then(Credential::csrf_token) {
        Some(token) => {
            body.insert("csrf".into(), Value::String(token.to_string()));
        }
        None => warn!("Write endpoint called without a CSRF token in the session"),
    }
}

/// Append `extra` to a query the endpoint URL already carries.
fn join_query(existing: Option<&str>, extra: &str) -> Option<String> {
    match (existing.filter(|q| !q.is_empty()), extra.is_empty()) {
        (None, true) => None,
        (None, false) => Some(extra.to_string()),
        (Some(existing), true) => Some(existing.to_string()),
        (Some(existing), false) => Some(format!("{existing}&{extra}")),
    }
}

fn envelope_code(text: &str) -> Option<i64> {
    serde_json::from_str::<Value>(text).ok()?["code"].as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_validate_rejects_non_scalars() {
        assert!(validate_params(&params(&[("a", json!(1)), ("b", json!("x"))])).is_ok());
        let err = validate_params(&params(&[("ids", json!([1, 2]))])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams { name, .. } if name == "ids"));
        assert!(validate_params(&params(&[("o", json!({"k": 1}))])).is_err());
    }

    #[test]
    fn test_fill_csrf_from_session() {
        let credential = Credential::new("SESSDATA=s; bili_jct=token");
        let mut body = params(&[("fid", json!(1)), ("csrf", json!(""))]);
        fill_csrf(&mut body, Some(&credential));
        assert_eq!(body["csrf"], json!("token"));
    }

    #[test]
    fn test_fill_csrf_keeps_caller_value() {
        let credential = Credential::new("bili_jct=token");
        let mut body = params(&[("csrf", json!("mine"))]);
        fill_csrf(&mut body, Some(&credential));
        assert_eq!(body["csrf"], json!("mine"));
    }

    #[test]
    fn test_fill_csrf_without_session() {
        let mut body = params(&[("csrf", json!(""))]);
        fill_csrf(&mut body, None);
        assert_eq!(body["csrf"], json!(""));
    }

    #[test]
    fn test_join_query() {
        assert_eq!(join_query(None, ""), None);
        assert_eq!(join_query(None, "a=1"), Some("a=1".into()));
        assert_eq!(join_query(Some("x=2"), ""), Some("x=2".into()));
        assert_eq!(join_query(Some("x=2"), "a=1"), Some("x=2&a=1".into()));
    }

    #[test]
    fn test_envelope_code() {
        assert_eq!(envelope_code(r#"{"code":-403}"#), Some(-403));
        assert_eq!(envelope_code("not json"), None);
    }
}

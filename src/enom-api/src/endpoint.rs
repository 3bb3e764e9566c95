//! Static description of one upstream call.

use enom_wbi::Params;
use serde_json::Value;

use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// How a POST body is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Form,
    Json,
}

#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    /// Query parameters sent when the caller does not override them.
    pub params: Params,
    /// Body template. Caller keys present here go to the body, the rest to
    /// the query string.
    pub body: Option<Params>,
    pub encoding: BodyEncoding,
    /// Query must carry a WBI signature.
    pub signed: bool,
    /// Body `csrf` field is filled from the session when left empty.
    pub csrf: bool,
    pub headers: Vec<(String, String)>,
    pub pipeline: Pipeline,
}

impl EndpointSpec {
    fn new(name: impl Into<String>, url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            method,
            params: Params::new(),
            body: None,
            encoding: BodyEncoding::Form,
            signed: false,
            csrf: false,
            headers: Vec::new(),
            pipeline: Pipeline::json(),
        }
    }

    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, url, HttpMethod::Get)
    }

    pub fn post(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, url, HttpMethod::Post)
    }

    pub fn param(mut self, key: &str, default: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), default.into());
        self
    }

    pub fn body_field(mut self, key: &str, default: impl Into<Value>) -> Self {
        self.body
            .get_or_insert_with(Params::new)
            .insert(key.to_string(), default.into());
        self
    }

    pub fn json_body(mut self) -> Self {
        self.encoding = BodyEncoding::Json;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    /// Adds an empty `csrf` body field and marks it for filling.
    pub fn csrf(mut self) -> Self {
        self.csrf = true;
        self.body_field("csrf", "")
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }
}

//! Response post-processing stages.
//!
//! A pipeline starts from the raw body text (as a JSON string value) and
//! applies its stages left to right. An empty pipeline therefore returns the
//! body text unchanged.

use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

/// Caller-supplied consumer for [`Stage::DeliverToSink`].
pub type Sink = dyn Fn(&Value) + Send + Sync;

const SNIPPET_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Parse the body text as JSON.
    ParseJson,
    /// Replace the value with one of its fields.
    ExtractField(String),
    /// Hand the value to the caller's sink and pass it on unchanged.
    DeliverToSink,
}

impl Stage {
    fn apply(&self, value: Value, sink: Option<&Sink>) -> Result<Value, ApiError> {
        match self {
            Stage::ParseJson => match value {
                Value::String(text) => serde_json::from_str(&text).map_err(|_| ApiError::NotJson {
                    snippet: text.chars().take(SNIPPET_LEN).collect(),
                }),
                parsed => Ok(parsed),
            },
            Stage::ExtractField(name) => value
                .get(name)
                .cloned()
                .ok_or_else(|| ApiError::MissingField(name.clone())),
            Stage::DeliverToSink => {
                match sink {
                    Some(sink) => sink(&value),
                    None => debug!("No sink supplied, skipping delivery stage"),
                }
                Ok(value)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Return the body text as-is.
    pub fn raw() -> Self {
        Self::default()
    }

    pub fn json() -> Self {
        Self::new(vec![Stage::ParseJson])
    }

    /// Parse, then keep only the `data` field of the envelope.
    pub fn json_data() -> Self {
        Self::new(vec![Stage::ParseJson, Stage::ExtractField("data".into())])
    }

    pub fn json_sink() -> Self {
        Self::new(vec![Stage::ParseJson, Stage::DeliverToSink])
    }

    pub fn sink() -> Self {
        Self::new(vec![Stage::DeliverToSink])
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage over `body`, stopping at the first failure.
    pub fn run(&self, body: String, sink: Option<&Sink>) -> Result<Value, ApiError> {
        self.stages
            .iter()
            .try_fold(Value::String(body), |value, stage| stage.apply(value, sink))
    }
}

//! Signed, throttled access to the upstream API.
//!
//! [`ApiClient::invoke`] turns a symbolic endpoint name plus parameters into
//! one HTTP call: resolve the [`EndpointSpec`], merge defaults, sign the query
//! when the endpoint requires it (falling back to an unsigned query when no
//! keys are available), attach the session cookie, send it through the
//! request queue and run the endpoint's response [`Pipeline`].

mod client;
mod endpoint;
mod error;
mod keys;
mod pipeline;
mod registry;

pub use client::{ApiClient, UserProfile};
pub use endpoint::{BodyEncoding, EndpointSpec, HttpMethod};
pub use enom_wbi::Params;
pub use error::ApiError;
pub use keys::KeyProvider;
pub use pipeline::{Pipeline, Sink, Stage};
pub use registry::EndpointRegistry;

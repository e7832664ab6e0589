#![forbid(unsafe_code)]

//! Blocking HTTP plumbing for the two outbound calls the service makes: the
//! metadata lookup against the provider and the media fetch behind the relay.
//!
//! Both run on tokio's blocking pool; see `resolver` and `relay` for the async
//! wrappers.

use std::{io::Read, time::Duration};

use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_API_ENDPOINT: &str = "https://tikwm.com/api/";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw envelope returned by the provider. Every member is optional; `data`
/// stays untyped so that field mapping can tolerate any shape.
#[derive(Debug, Default, Deserialize)]
pub struct ProviderEnvelope {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub msg: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProviderEnvelope {
    /// The provider signals success with a numeric `code` of zero.
    pub fn is_success(&self) -> bool {
        self.code
            .as_ref()
            .and_then(Value::as_f64)
            .is_some_and(|code| code == 0.0)
    }

    /// The provider's `msg`, when it is a non-empty string.
    pub fn message(&self) -> Option<&str> {
        self.msg
            .as_ref()
            .and_then(Value::as_str)
            .filter(|msg| !msg.is_empty())
    }

    /// The `data` member, unless it is missing or falsy (`null`, `false`,
    /// `0`, `""`). Empty objects and arrays still count as present.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref().filter(|data| !is_falsy(data))
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Why an outbound call produced no usable response.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("upstream responded with HTTP {0}")]
    Status(u16),
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("upstream body unreadable: {0}")]
    Body(#[from] std::io::Error),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => Self::Status(code),
            ureq::Error::Transport(transport) => Self::Transport(transport.to_string()),
        }
    }
}

/// A successful media response whose body has not been read yet.
pub struct MediaResponse {
    pub content_type: String,
    pub reader: Box<dyn Read + Send + Sync + 'static>,
}

/// Shared, immutable outbound client. Cloning is cheap; the underlying agent
/// only pools connections and carries no per-request state.
#[derive(Clone)]
pub struct UpstreamClient {
    agent: ureq::Agent,
    api_endpoint: String,
    user_agent: String,
}

impl UpstreamClient {
    pub fn new(
        api_endpoint: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            api_endpoint: api_endpoint.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    /// Posts `url` to the provider as a form field and decodes the envelope.
    pub fn lookup(&self, url: &str) -> Result<ProviderEnvelope, FetchError> {
        let response = self
            .agent
            .post(&self.api_endpoint)
            .set("User-Agent", &self.user_agent)
            .send_form(&[("url", url)])?;
        let envelope = response.into_json::<ProviderEnvelope>()?;
        Ok(envelope)
    }

    /// Issues a GET for `url` and hands back the unread body.
    pub fn open_media(&self, url: &str) -> Result<MediaResponse, FetchError> {
        let response = self
            .agent
            .get(url)
            .set("User-Agent", &self.user_agent)
            .call()?;
        let content_type = response
            .header("Content-Type")
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        Ok(MediaResponse {
            content_type,
            reader: response.into_reader(),
        })
    }
}

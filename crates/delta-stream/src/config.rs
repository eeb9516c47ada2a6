use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::ClientError;
use crate::request::{StreamRequestBuilder, parse_endpoint};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chat";

/// Client-side settings shared by every request a front end issues.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Absolute URL of the streaming endpoint (usually a relay in front of
    /// the model provider).
    pub endpoint: String,
    /// Headers applied to every request before per-request headers.
    pub default_headers: BTreeMap<String, String>,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Optional whole-request timeout. Unset by default because a stream may
    /// legitimately run for minutes; use `StreamManager::cancel` with a timer
    /// for a caller-side deadline instead.
    pub request_timeout: Option<Duration>,
    /// `User-Agent` sent by `ReqwestTransport`.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a config with defaults for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            endpoint: endpoint.into(),
            default_headers,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            user_agent: concat!("delta-stream/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `DELTA_STREAM_ENDPOINT`: endpoint URL (default `http://127.0.0.1:3000/api/chat`).
    /// - `DELTA_STREAM_CONNECT_TIMEOUT_MS`: connect timeout in milliseconds.
    /// - `DELTA_STREAM_AUTH_TOKEN`: optional bearer token added to default headers.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let endpoint = lookup("DELTA_STREAM_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let mut config = Self::new(endpoint);

        if let Some(raw) = lookup("DELTA_STREAM_CONNECT_TIMEOUT_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!(
                    "DELTA_STREAM_CONNECT_TIMEOUT_MS must be an integer, got {raw:?}"
                ))
            })?;
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(token) = lookup("DELTA_STREAM_AUTH_TOKEN").filter(|v| !v.trim().is_empty()) {
            config = config.default_header("authorization", format!("Bearer {}", token.trim()));
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Adds or replaces a default header (name is lower-cased).
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.as_ref().trim().to_ascii_lowercase(), value.into());
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets a whole-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Checks that the endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ClientError> {
        parse_endpoint(&self.endpoint).map(|_| ())
    }

    /// Starts a request seeded with the endpoint and default headers.
    pub fn request(&self) -> StreamRequestBuilder {
        StreamRequestBuilder::new(self.endpoint.clone()).headers(&self.default_headers)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

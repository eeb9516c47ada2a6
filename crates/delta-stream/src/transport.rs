use std::pin::Pin;

use futures::{Stream, StreamExt as _};
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, TransportError};
use crate::request::StreamRequest;

/// Response body as a stream of raw chunks, in arrival order.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// "Issue a request, get a byte stream" capability.
///
/// Implementations must resolve to `Err` for issuance failures and non-success
/// statuses, and to a body stream that ends naturally otherwise. Cancellation
/// is performed by dropping the pending future or the returned stream.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError>;
}

/// HTTP transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds the HTTP client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        let mut http_req = self
            .client
            .request(request.method().clone(), request.url().clone());
        for (name, value) in request.headers() {
            http_req = http_req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::request(format!("failed to encode body: {e}")))?;
            http_req = http_req.body(bytes);
        }

        debug!(method = %request.method(), url = %request.url(), "opening stream");
        let response = http_req
            .send()
            .await
            .map_err(|e| TransportError::request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::status(status.as_u16(), body));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string())));
        Ok(Box::pin(stream))
    }
}

/// Failures raised by a `Transport` while issuing a request or reading its
/// response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be issued (DNS, connect, TLS, invalid request).
    #[error("request failed: {message}")]
    Request { message: String },
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The response body stream failed after the request succeeded.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates an issuance failure.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a non-success status failure.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Creates a mid-stream read failure.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Returns the HTTP status code when the failure carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { .. } | Self::Read { .. } => None,
        }
    }
}

/// Terminal failure delivered once through `StreamSink::on_error`.
///
/// Cancellation is deliberately absent: an aborted stream is reported through
/// `StreamEvent::Aborted`, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Request issuance, status, or body read failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Reason a single record was dropped by the interpreter.
///
/// These never leave the pipeline; they are logged and the stream continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Payload was not valid JSON or did not match the delta shape.
    #[error("invalid record JSON: {0}")]
    InvalidJson(String),
    /// Payload parsed but carried no `choices[0].delta`.
    #[error("record has no delta")]
    MissingDelta,
}

/// Errors returned synchronously by the public API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request built by the caller.
    #[error("validation error: {0}")]
    Validation(String),
    /// `StreamManager::start` was called outside a Tokio runtime.
    #[error("no tokio runtime available to drive the stream")]
    NoRuntime,
    /// The stream task ended without reporting an outcome.
    #[error("stream task lost: {0}")]
    TaskLost(String),
}

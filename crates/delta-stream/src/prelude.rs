//! Common imports for typical usage.
pub use crate::{
    AbortHandle, Callbacks, ChatMessage, ChatPayload, ClientConfig, ClientError, Method,
    ReqwestTransport, StreamError, StreamEvent, StreamHandle, StreamManager, StreamOutcome,
    StreamRequest, StreamSink, Transport,
};

//! Cancellable consumer for streamed chat-completion responses.
//!
//! A `StreamManager` owns at most one in-flight request. Its body is framed
//! into `data:` records, each record's `choices[0].delta` is split into
//! reasoning and content tokens, and the resulting events reach a
//! `StreamSink` in wire order: `Started`, tokens, then exactly one of
//! `Completed`, `Error`, or `Aborted`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use delta_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let config = ClientConfig::from_env()?;
//! let manager = StreamManager::new(Arc::new(ReqwestTransport::new(&config)?));
//!
//! let request = config
//!     .request()
//!     .body(ChatPayload::new(vec![ChatMessage::user("hello")]))
//!     .build()?;
//! let sink = Callbacks::new()
//!     .with_chunk(|token, _full| print!("{token}"))
//!     .with_error(|err| eprintln!("error: {err}"));
//!
//! let outcome = manager.start(request, sink)?.finish().await?;
//! println!("\n{outcome:?}");
//! # Ok(())
//! # }
//! ```

/// Client configuration and environment loading.
pub mod config;
/// Delta payload shapes and the token interpreter.
pub mod delta;
mod dispatch;
/// Error taxonomy.
pub mod errors;
/// Record framing over raw body chunks.
pub mod frame;
/// Request lifecycle: start, supersede, cancel.
pub mod manager;
/// Tracing subscriber setup.
pub mod observability;
/// Common imports.
pub mod prelude;
/// Immutable request values and their builder.
pub mod request;
/// Consumer callback surface.
pub mod sink;
/// Stream events and outcomes.
pub mod stream;
/// Transport boundary and the reqwest implementation.
pub mod transport;

pub use config::ClientConfig;
pub use delta::{Delta, DeltaInterpreter};
pub use errors::{ClientError, RecordError, StreamError, TransportError};
pub use frame::{FrameDecoder, Record};
pub use manager::{AbortHandle, StreamHandle, StreamManager};
pub use observability::init_observability;
pub use request::{ChatMessage, ChatPayload, StreamRequest, StreamRequestBuilder};
pub use reqwest::Method;
pub use sink::{Callbacks, ChannelSink, StreamSink, channel_sink};
pub use stream::{StreamEvent, StreamOutcome};
pub use transport::{ByteStream, ReqwestTransport, Transport};

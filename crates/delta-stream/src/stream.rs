use crate::errors::StreamError;

/// Typed events produced for one stream, in dispatch order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// First event of every stream; fired before the request is issued.
    Started,
    /// A reasoning fragment. Never part of the content text.
    ThoughtToken { text: String },
    /// An answer fragment and the content accumulated up to and including it.
    ContentToken { text: String, full_text: String },
    /// Terminal success with the final content text.
    Completed { full_text: String },
    /// Terminal failure.
    Error { error: StreamError },
    /// Terminal notice for a cancelled or superseded stream. Diagnostic only.
    Aborted,
}

impl StreamEvent {
    /// Whether no event may follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Error { .. } | Self::Aborted
        )
    }
}

/// How a stream ended, as returned by `StreamHandle::finish`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body ended naturally.
    Completed {
        /// Accumulated content text.
        text: String,
        /// Accumulated reasoning text.
        reasoning: String,
    },
    /// The transport failed; the same error was dispatched to `on_error`.
    Failed(StreamError),
    /// The stream was cancelled or superseded.
    Aborted,
}

impl StreamOutcome {
    /// Content text for a completed stream.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { text, .. } => Some(text),
            Self::Failed(_) | Self::Aborted => None,
        }
    }
}

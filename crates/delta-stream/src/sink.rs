use tokio::sync::mpsc;

use crate::errors::StreamError;
use crate::stream::StreamEvent;

/// Consumer of one stream's events.
///
/// Every method defaults to a no-op, so implementors override only what they
/// render. `on_event` routes to the typed methods; override it instead to see
/// raw `StreamEvent`s.
pub trait StreamSink: Send {
    fn on_start(&mut self) {}

    fn on_thought(&mut self, _text: &str) {}

    fn on_chunk(&mut self, _token: &str, _full_text: &str) {}

    fn on_complete(&mut self, _full_text: &str) {}

    fn on_error(&mut self, _error: &StreamError) {}

    /// Low-severity notice that the stream was cancelled or superseded.
    fn on_abort(&mut self) {}

    fn on_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Started => self.on_start(),
            StreamEvent::ThoughtToken { text } => self.on_thought(text),
            StreamEvent::ContentToken { text, full_text } => self.on_chunk(text, full_text),
            StreamEvent::Completed { full_text } => self.on_complete(full_text),
            StreamEvent::Error { error } => self.on_error(error),
            StreamEvent::Aborted => self.on_abort(),
        }
    }
}

impl<S: StreamSink + ?Sized> StreamSink for Box<S> {
    fn on_event(&mut self, event: &StreamEvent) {
        (**self).on_event(event);
    }
}

type Hook = Box<dyn FnMut() + Send>;
type TextHook = Box<dyn FnMut(&str) + Send>;
type ChunkHook = Box<dyn FnMut(&str, &str) + Send>;
type ErrorHook = Box<dyn FnMut(&StreamError) + Send>;

/// Closure-based sink; any subset of callbacks may be set.
///
/// ```
/// use delta_stream::Callbacks;
///
/// let sink = Callbacks::new()
///     .with_chunk(|token, _full| print!("{token}"))
///     .with_complete(|_| println!());
/// # let _ = sink;
/// ```
#[derive(Default)]
pub struct Callbacks {
    start: Option<Hook>,
    thought: Option<TextHook>,
    chunk: Option<ChunkHook>,
    complete: Option<TextHook>,
    error: Option<ErrorHook>,
    abort: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.start = Some(Box::new(f));
        self
    }

    pub fn with_thought(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.thought = Some(Box::new(f));
        self
    }

    pub fn with_chunk(mut self, f: impl FnMut(&str, &str) + Send + 'static) -> Self {
        self.chunk = Some(Box::new(f));
        self
    }

    pub fn with_complete(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl FnMut(&StreamError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }

    pub fn with_abort(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.abort = Some(Box::new(f));
        self
    }
}

impl StreamSink for Callbacks {
    fn on_start(&mut self) {
        if let Some(f) = self.start.as_mut() {
            f();
        }
    }

    fn on_thought(&mut self, text: &str) {
        if let Some(f) = self.thought.as_mut() {
            f(text);
        }
    }

    fn on_chunk(&mut self, token: &str, full_text: &str) {
        if let Some(f) = self.chunk.as_mut() {
            f(token, full_text);
        }
    }

    fn on_complete(&mut self, full_text: &str) {
        if let Some(f) = self.complete.as_mut() {
            f(full_text);
        }
    }

    fn on_error(&mut self, error: &StreamError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }

    fn on_abort(&mut self) {
        if let Some(f) = self.abort.as_mut() {
            f();
        }
    }
}

/// Sink that forwards every event into an unbounded channel.
///
/// Useful when the renderer lives in its own task and prefers
/// `while let Some(event) = rx.recv().await`.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

/// Creates a `ChannelSink` and the receiver for its events.
pub fn channel_sink() -> (ChannelSink, mpsc::UnboundedReceiver<StreamEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}

impl StreamSink for ChannelSink {
    fn on_event(&mut self, event: &StreamEvent) {
        // A dropped receiver only means nobody is rendering any more.
        let _ = self.tx.send(event.clone());
    }
}

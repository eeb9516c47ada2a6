use std::io::{self, Write};

use delta_stream::{StreamError, StreamSink};
use tracing::debug;

const USER_PREFIX: &str = "you> ";
const ASSISTANT_PREFIX: &str = "ai>  ";

/// Renders a chat exchange: the user's line, then the answer as it streams.
pub struct ChatView<W> {
    out: W,
}

impl<W: Write> ChatView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Echoes the user's message before the request is issued.
    pub fn echo_user(&mut self, text: &str) {
        self.emit(|out| writeln!(out, "{USER_PREFIX}{text}"));
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, write: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Err(err) = write(&mut self.out).and_then(|_| self.out.flush()) {
            debug!(error = %err, "chat output write failed");
        }
    }
}

impl<W: Write + Send> StreamSink for ChatView<W> {
    fn on_start(&mut self) {
        self.emit(|out| write!(out, "{ASSISTANT_PREFIX}"));
    }

    fn on_chunk(&mut self, token: &str, _full_text: &str) {
        self.emit(|out| write!(out, "{token}"));
    }

    fn on_complete(&mut self, _full_text: &str) {
        self.emit(|out| writeln!(out));
    }

    fn on_error(&mut self, error: &StreamError) {
        self.emit(|out| writeln!(out, "\n[error] {error}"));
    }

    fn on_abort(&mut self) {
        // Leave whatever was rendered; just end the line.
        self.emit(|out| writeln!(out));
    }
}

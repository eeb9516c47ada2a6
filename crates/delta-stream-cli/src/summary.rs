use std::io::{self, Write};

use delta_stream::{StreamError, StreamSink};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Thinking,
    Answering,
}

/// Renders a summary: a "thinking" section fed by reasoning tokens that is
/// closed as soon as the first answer token arrives, then the answer body.
pub struct SummaryView<W> {
    out: W,
    phase: Phase,
    thought_text: String,
}

impl<W: Write> SummaryView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            phase: Phase::Waiting,
            thought_text: String::new(),
        }
    }

    /// Reasoning received so far.
    pub fn thought_text(&self) -> &str {
        &self.thought_text
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, write: impl FnOnce(&mut W) -> io::Result<()>) {
        if let Err(err) = write(&mut self.out).and_then(|_| self.out.flush()) {
            debug!(error = %err, "summary output write failed");
        }
    }

    fn end_section(&mut self) {
        if self.phase != Phase::Waiting {
            self.emit(|out| writeln!(out));
        }
    }
}

impl<W: Write + Send> StreamSink for SummaryView<W> {
    fn on_start(&mut self) {
        self.thought_text.clear();
        self.phase = Phase::Waiting;
        self.emit(|out| writeln!(out, "summarizing..."));
    }

    fn on_thought(&mut self, text: &str) {
        if self.phase == Phase::Answering {
            return;
        }
        if self.phase == Phase::Waiting {
            self.phase = Phase::Thinking;
            self.emit(|out| write!(out, "thinking: "));
        }
        self.thought_text.push_str(text);
        self.emit(|out| write!(out, "{text}"));
    }

    fn on_chunk(&mut self, token: &str, _full_text: &str) {
        if self.phase != Phase::Answering {
            self.end_section();
            self.phase = Phase::Answering;
            self.emit(|out| write!(out, "summary: "));
        }
        self.emit(|out| write!(out, "{token}"));
    }

    fn on_complete(&mut self, _full_text: &str) {
        self.end_section();
    }

    fn on_error(&mut self, error: &StreamError) {
        self.end_section();
        self.emit(|out| writeln!(out, "error: {error}"));
    }

    fn on_abort(&mut self) {
        self.end_section();
    }
}

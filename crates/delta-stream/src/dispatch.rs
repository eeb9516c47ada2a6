use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::sink::StreamSink;
use crate::stream::StreamEvent;

/// Delivers one stream's events to its sink.
///
/// Invocations are serialised by a lock. The first terminal event closes the
/// dispatcher under that same lock, so once `dispatch` has returned for a
/// terminal event no other event can reach the sink, even from another task.
pub(crate) struct Dispatcher {
    stream_id: uuid::Uuid,
    state: Mutex<DispatchState>,
}

struct DispatchState {
    sink: Box<dyn StreamSink>,
    closed: bool,
}

impl Dispatcher {
    pub(crate) fn new(stream_id: uuid::Uuid, sink: Box<dyn StreamSink>) -> Self {
        Self {
            stream_id,
            state: Mutex::new(DispatchState {
                sink,
                closed: false,
            }),
        }
    }

    /// Delivers `event`; returns `false` if the dispatcher was already closed.
    ///
    /// A panicking callback is logged and swallowed.
    pub(crate) fn dispatch(&self, event: &StreamEvent) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if event.is_terminal() {
            state.closed = true;
        }
        let sink = &mut state.sink;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.on_event(event))) {
            warn!(
                stream_id = %self.stream_id,
                event = event_name(event),
                panic = panic_message(payload.as_ref()),
                "stream callback panicked; continuing"
            );
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::Started => "started",
        StreamEvent::ThoughtToken { .. } => "thought",
        StreamEvent::ContentToken { .. } => "chunk",
        StreamEvent::Completed { .. } => "completed",
        StreamEvent::Error { .. } => "error",
        StreamEvent::Aborted => "aborted",
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

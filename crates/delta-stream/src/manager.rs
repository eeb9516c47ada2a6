use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::delta::DeltaInterpreter;
use crate::dispatch::Dispatcher;
use crate::errors::{ClientError, StreamError};
use crate::frame::{Record, records};
use crate::request::StreamRequest;
use crate::sink::StreamSink;
use crate::stream::{StreamEvent, StreamOutcome};
use crate::transport::Transport;

/// Cancels one specific stream.
///
/// Aborting delivers `StreamEvent::Aborted` to the stream's sink (unless it
/// already ended), closes its dispatcher, and tells the pipeline task to stop
/// reading. Calling it again is a no-op.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
    dispatcher: Arc<Dispatcher>,
}

impl AbortHandle {
    /// Stops the stream this handle belongs to.
    ///
    /// The sink sees `on_abort` synchronously, before this returns, unless the
    /// stream already delivered its terminal event. It never sees `on_error`
    /// for a cancelled stream.
    pub fn abort(&self) {
        self.dispatcher.dispatch(&StreamEvent::Aborted);
        let _ = self.tx.send(true);
    }

    /// Whether the stream can no longer deliver events.
    pub fn is_finished(&self) -> bool {
        self.dispatcher.is_closed()
    }
}

/// Handle to a started stream.
pub struct StreamHandle {
    stream_id: uuid::Uuid,
    abort: AbortHandle,
    task: JoinHandle<StreamOutcome>,
}

impl StreamHandle {
    /// Id used in this stream's log records.
    pub fn stream_id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// A cloneable handle that cancels this stream only.
    ///
    /// Unlike `StreamManager::cancel`, it cannot touch a stream that has
    /// since superseded this one.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Waits for the pipeline task and returns how the stream ended.
    pub async fn finish(self) -> Result<StreamOutcome, ClientError> {
        self.task
            .await
            .map_err(|e| ClientError::TaskLost(format!("stream {}: {e}", self.stream_id)))
    }
}

/// The single in-flight stream owned by a `StreamManager`.
struct ActiveStream {
    stream_id: uuid::Uuid,
    abort: AbortHandle,
}

type Slot = Arc<Mutex<Option<ActiveStream>>>;

fn lock_slot(slot: &Mutex<Option<ActiveStream>>) -> MutexGuard<'_, Option<ActiveStream>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns at most one active stream; starting a new one supersedes the old.
///
/// Callbacks run while the stream's dispatch lock is held, so a callback must
/// not call `start` or `cancel` on the manager that owns its stream.
pub struct StreamManager {
    transport: Arc<dyn Transport>,
    active: Slot,
}

impl StreamManager {
    /// Creates a manager with no active stream that opens requests through
    /// `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts streaming `request` into `sink`, cancelling any active stream
    /// first.
    ///
    /// `on_start` has been delivered when this returns, before the request is
    /// issued. Transport failures are reported through `on_error` and the
    /// returned handle, never as `Err` here; `Err` is only returned when no
    /// Tokio runtime is available, in which case nothing is cancelled or
    /// dispatched.
    pub fn start(
        &self,
        request: StreamRequest,
        sink: impl StreamSink + 'static,
    ) -> Result<StreamHandle, ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ClientError::NoRuntime)?;

        let mut active = lock_slot(&self.active);
        if let Some(previous) = active.take() {
            info!(superseded = %previous.stream_id, "superseding active stream");
            previous.abort.abort();
        }

        let stream_id = uuid::Uuid::new_v4();
        let dispatcher = Arc::new(Dispatcher::new(stream_id, Box::new(sink)));
        let (abort_tx, abort_rx) = watch::channel(false);
        let abort = AbortHandle {
            tx: abort_tx,
            dispatcher: dispatcher.clone(),
        };

        dispatcher.dispatch(&StreamEvent::Started);
        debug!(%stream_id, method = %request.method(), url = %request.url(), "stream started");

        let task = runtime.spawn(run_stream(
            stream_id,
            self.transport.clone(),
            request,
            dispatcher,
            abort_rx,
            self.active.clone(),
        ));
        *active = Some(ActiveStream {
            stream_id,
            abort: abort.clone(),
        });

        Ok(StreamHandle {
            stream_id,
            abort,
            task,
        })
    }

    /// Cancels the active stream, if any. Idempotent.
    pub fn cancel(&self) {
        if let Some(active) = lock_slot(&self.active).take() {
            info!(stream_id = %active.stream_id, "stream cancelled");
            active.abort.abort();
        }
    }

    /// Id of the active stream, if one is in flight.
    pub fn active_stream(&self) -> Option<uuid::Uuid> {
        lock_slot(&self.active).as_ref().map(|a| a.stream_id)
    }
}

async fn run_stream(
    stream_id: uuid::Uuid,
    transport: Arc<dyn Transport>,
    request: StreamRequest,
    dispatcher: Arc<Dispatcher>,
    mut abort_rx: watch::Receiver<bool>,
    slot: Slot,
) -> StreamOutcome {
    let outcome = tokio::select! {
        biased;
        _ = aborted(&mut abort_rx) => StreamOutcome::Aborted,
        outcome = pump(stream_id, transport.as_ref(), &request, &dispatcher) => outcome,
    };

    let mut active = lock_slot(&slot);
    if active.as_ref().is_some_and(|a| a.stream_id == stream_id) {
        *active = None;
    }
    debug!(%stream_id, outcome = outcome_name(&outcome), "stream finished");
    outcome
}

async fn aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Every sender is gone, so nobody can abort any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Issues the request and feeds records through the interpreter.
///
/// Runs until the body ends, the transport fails, or the dispatcher refuses
/// an event because the stream was aborted in the meantime.
async fn pump(
    stream_id: uuid::Uuid,
    transport: &dyn Transport,
    request: &StreamRequest,
    dispatcher: &Dispatcher,
) -> StreamOutcome {
    let body = match transport.open(request).await {
        Ok(body) => body,
        Err(err) => return fail(stream_id, dispatcher, err.into()),
    };

    let mut record_stream = Box::pin(records(body));
    let mut interpreter = DeltaInterpreter::default();
    let mut dropped = 0_u64;
    while let Some(next) = record_stream.next().await {
        let payload = match next {
            Ok(Record::Data(payload)) => payload,
            Ok(Record::Done) => {
                trace!(%stream_id, "stream terminator received");
                continue;
            }
            Err(err) => return fail(stream_id, dispatcher, err.into()),
        };
        match interpreter.interpret(&payload) {
            Ok(events) => {
                for event in events {
                    if !dispatcher.dispatch(&event) {
                        return StreamOutcome::Aborted;
                    }
                }
            }
            Err(err) => {
                dropped += 1;
                trace!(%stream_id, error = %err, "dropping record");
            }
        }
    }

    let (text, reasoning) = interpreter.into_texts();
    let delivered = dispatcher.dispatch(&StreamEvent::Completed {
        full_text: text.clone(),
    });
    if !delivered {
        return StreamOutcome::Aborted;
    }
    debug!(%stream_id, chars = text.chars().count(), dropped, "stream completed");
    StreamOutcome::Completed { text, reasoning }
}

fn fail(stream_id: uuid::Uuid, dispatcher: &Dispatcher, error: StreamError) -> StreamOutcome {
    debug!(%stream_id, error = %error, "stream failed");
    if dispatcher.dispatch(&StreamEvent::Error {
        error: error.clone(),
    }) {
        StreamOutcome::Failed(error)
    } else {
        StreamOutcome::Aborted
    }
}

fn outcome_name(outcome: &StreamOutcome) -> &'static str {
    match outcome {
        StreamOutcome::Completed { .. } => "completed",
        StreamOutcome::Failed(_) => "failed",
        StreamOutcome::Aborted => "aborted",
    }
}

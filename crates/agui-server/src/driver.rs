//! Drivers that put the sequencer between an agent and a transport.
//!
//! Two shapes are supported:
//!
//! - **Pull**: [`drive`] consumes any `Stream<Item = Event>` and forwards the
//!   validated events to a sink, applying the termination contract when the
//!   stream ends.
//! - **Push**: [`ValidatingSink`] wraps a sink; agent code emits into it as
//!   it would into the transport directly, and calls
//!   [`close`](ValidatingSink::close) when done.
//!
//! Several producers can share one run through [`fan_in`], which funnels
//! them into a single ordered queue in front of the sequencer.

use agui_core::machine::RunPhase;
use agui_core::sequencer::{Diagnostic, RunReport, Sequencer, ViolationPolicy};
use agui_core::Event;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::error::{Result, ServerError};
use crate::sink::EventSink;

/// Validates `stream` with the default policy and forwards it to `sink`.
pub async fn drive<St, S>(stream: St, sink: S) -> Result<RunReport>
where
    St: Stream<Item = Event>,
    S: EventSink,
{
    drive_with_policy(stream, sink, ViolationPolicy::default()).await
}

/// Validates `stream` and forwards every accepted event to `sink`.
///
/// Rejected events are never forwarded. When the policy synthesizes a
/// terminal `RUN_ERROR`, that event is forwarded in their place. Once the run
/// has terminated the source is dropped without being polled again. If the
/// source ends while the run is still active, the synthesized
/// `STREAM_TERMINATED_EARLY` error is forwarded.
///
/// Fails only when the sink does; protocol violations are in the report.
pub async fn drive_with_policy<St, S>(
    stream: St,
    sink: S,
    policy: ViolationPolicy,
) -> Result<RunReport>
where
    St: Stream<Item = Event>,
    S: EventSink,
{
    let mut sequencer = Sequencer::with_policy(policy);
    let mut stream = std::pin::pin!(stream);

    while let Some(event) = stream.next().await {
        if let Some(event) = admit(&mut sequencer, event) {
            sink.emit(event).await?;
        }
        if sequencer.phase() == RunPhase::Terminated {
            break;
        }
    }

    if let Some(terminal) = sequencer.finish() {
        sink.emit(terminal).await?;
    }

    let report = sequencer.into_report();
    info!(
        accepted = report.accepted,
        violations = report.violations.len(),
        "run drained"
    );
    Ok(report)
}

/// Runs one event through the sequencer, returning what should be forwarded.
fn admit(sequencer: &mut Sequencer, event: Event) -> Option<Event> {
    match sequencer.push(event) {
        Ok(accepted) => {
            log_diagnostics(&accepted.diagnostics);
            Some(accepted.event)
        }
        Err(rejection) => rejection.terminal,
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        debug!(%diagnostic, "sequencer diagnostic");
    }
}

/// Creates a single-writer queue for several producers of one run.
///
/// Clone the sender for each producer and [`drive`] the returned stream.
pub fn fan_in(buffer: usize) -> (mpsc::Sender<Event>, ReceiverStream<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (tx, ReceiverStream::new(rx))
}

/// An [`EventSink`] that validates everything emitted through it.
///
/// Accepted events are forwarded to the inner sink. A rejected event comes
/// back to the caller as [`ServerError::Core`]; under
/// [`ViolationPolicy::Terminate`] the synthesized `RUN_ERROR` has already
/// been forwarded by then.
pub struct ValidatingSink<S> {
    inner: S,
    sequencer: Mutex<Sequencer>,
}

impl<S: EventSink> ValidatingSink<S> {
    pub fn new(inner: S) -> Self {
        Self::with_policy(inner, ViolationPolicy::default())
    }

    pub fn with_policy(inner: S, policy: ViolationPolicy) -> Self {
        Self {
            inner,
            sequencer: Mutex::new(Sequencer::with_policy(policy)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Phase of the run being validated.
    pub async fn phase(&self) -> RunPhase {
        self.sequencer.lock().await.phase()
    }

    pub async fn report(&self) -> RunReport {
        self.sequencer.lock().await.report()
    }

    /// Ends the run.
    ///
    /// Forwards the synthesized `STREAM_TERMINATED_EARLY` error if the run is
    /// still active. Calling it again is a no-op apart from the report.
    pub async fn close(&self) -> Result<RunReport> {
        let mut sequencer = self.sequencer.lock().await;
        if let Some(terminal) = sequencer.finish() {
            self.inner.emit(terminal).await?;
        }
        Ok(sequencer.report())
    }
}

#[async_trait]
impl<S: EventSink> EventSink for ValidatingSink<S> {
    async fn emit(&self, event: Event) -> Result<()> {
        let mut sequencer = self.sequencer.lock().await;
        match sequencer.push(event) {
            Ok(accepted) => {
                log_diagnostics(&accepted.diagnostics);
                self.inner.emit(accepted.event).await
            }
            Err(rejection) => {
                if let Some(terminal) = rejection.terminal {
                    self.inner.emit(terminal).await?;
                }
                Err(ServerError::Core(rejection.error))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

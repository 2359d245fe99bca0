//! The seam between event producers and transports.

use std::sync::Arc;

use agui_core::Event;
use async_trait::async_trait;

use crate::error::ServerError;

/// Destination for AG-UI events.
///
/// Implemented by the transport senders, by [`ValidatingSink`], and by
/// anything a test wants to capture events with.
///
/// ```rust,ignore
/// use agui_server::{EventSink, ServerError};
/// use agui_core::RunErrorEvent;
///
/// async fn emit_error<S: EventSink>(sink: &S) -> Result<(), ServerError> {
///     sink.emit(RunErrorEvent::new("Something went wrong").into()).await
/// }
/// ```
///
/// [`ValidatingSink`]: crate::driver::ValidatingSink
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit a single event.
    ///
    /// Returns an error if the connection is closed or the event is refused.
    async fn emit(&self, event: Event) -> Result<(), ServerError>;

    /// Emit events in order, stopping at the first failure.
    async fn emit_many(&self, events: Vec<Event>) -> Result<(), ServerError> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }

    /// Returns `false` once the client has disconnected.
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for &S {
    async fn emit(&self, event: Event) -> Result<(), ServerError> {
        (**self).emit(event).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

#[async_trait]
impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    async fn emit(&self, event: Event) -> Result<(), ServerError> {
        (**self).emit(event).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

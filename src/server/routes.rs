//! HTTP routes for the replay server:
//! - `/sse` - the validated stream as `text/event-stream`, or as a JSON array
//!   when the client only accepts `application/json`
//! - `/ws` - the validated stream over WebSocket
//! - `/health` - health check

use agui_core::encoder::EncoderKind;
use agui_core::Event;
use agui_server::transport::{sse, ws};
use agui_server::{EventSender, drive_with_policy};
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::{StreamExt, stream};
use serde_json::json;

use super::ReplayState;
use crate::replay::sequence_events;

/// Health check endpoint.
pub async fn health(State(state): State<ReplayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "agui-ctl",
        "protocol": "ag-ui",
        "events": state.event_count(),
    }))
}

/// Streams the validated run to one client.
pub async fn sse_handler(State(state): State<ReplayState>, headers: HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());

    match EncoderKind::negotiate(accept) {
        EncoderKind::Sse => {
            let (sender, handler) = sse::channel(state.buffer);
            spawn_replay(state, sender);
            handler.into_response()
        }
        EncoderKind::Message => {
            let replay = sequence_events(state.events.iter().cloned(), state.policy);
            Json(replay.forwarded).into_response()
        }
    }
}

/// WebSocket endpoint for the validated run.
pub async fn ws_handler(upgrade: WebSocketUpgrade, State(state): State<ReplayState>) -> Response {
    let (sender, handler) = ws::channel_with_config(state.buffer, state.ws.clone());
    spawn_replay(state, sender);
    handler.into_response(upgrade)
}

/// Drives a fresh run of the recorded events into `sender`.
fn spawn_replay(state: ReplayState, sender: EventSender) {
    tokio::spawn(async move {
        let delay = state.delay;
        let events: Vec<Event> = state.events.iter().cloned().collect();
        let paced = stream::iter(events).then(move |event| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        });

        match drive_with_policy(paced, sender, state.policy).await {
            Ok(report) => log::debug!(
                "replay finished: {} accepted, {} violation(s)",
                report.accepted,
                report.violations.len()
            ),
            Err(e) => log::debug!("replay stopped early: {e}"),
        }
    });
}

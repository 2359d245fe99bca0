//! Application state synchronization.
//!
//! Two sides of the same contract live here:
//! - [`StateSynchronizer`] consumes `STATE_SNAPSHOT`, `STATE_DELTA` and
//!   `MESSAGES_SNAPSHOT` for one run and keeps the resulting state.
//! - [`StateManager`] is the producer side: it tracks the state an agent
//!   publishes and computes the delta between successive versions.
//!
//! # Example
//!
//! ```rust
//! use agui_core::state::{StateManager, StateSynchronizer};
//! use agui_core::{Event, StateDeltaEvent, StateSnapshotEvent};
//! use serde_json::json;
//!
//! let mut manager = StateManager::new(json!({"count": 0}));
//! let mut sync = StateSynchronizer::new();
//!
//! sync.apply(&Event::from(StateSnapshotEvent::new(manager.snapshot()))).unwrap();
//! let delta = manager.update(json!({"count": 1})).unwrap();
//! sync.apply(&Event::from(StateDeltaEvent::new(delta))).unwrap();
//!
//! assert_eq!(sync.state(), Some(manager.current()));
//! ```

use tracing::debug;

use crate::JsonValue;
use crate::error::{MissingBaseStateError, Result};
use crate::event::{Event, StateDeltaEvent};
use crate::patch::{apply_operations, create_patch, patch_to_vec};
use crate::types::Message;

/// Per-run application state and message history as seen by a consumer.
///
/// Deltas are atomic: either every operation applies or the state keeps its
/// previous value.
#[derive(Debug, Clone, Default)]
pub struct StateSynchronizer {
    state: Option<JsonValue>,
    messages: Option<Vec<Message>>,
}

impl StateSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot has established a base for deltas.
    pub fn have_base(&self) -> bool {
        self.state.is_some()
    }

    /// The current state, once a snapshot has been applied.
    pub fn state(&self) -> Option<&JsonValue> {
        self.state.as_ref()
    }

    /// The last message history received through `MESSAGES_SNAPSHOT`.
    pub fn messages(&self) -> Option<&[Message]> {
        self.messages.as_deref()
    }

    /// Applies a state-bearing event. Other events are ignored.
    pub fn apply(&mut self, event: &Event) -> Result<()> {
        match event {
            Event::StateSnapshot(snapshot) => {
                debug!("state snapshot replaces current state");
                self.state = Some(snapshot.snapshot.clone());
                Ok(())
            }
            Event::StateDelta(delta) => self.apply_delta(delta),
            Event::MessagesSnapshot(snapshot) => {
                debug!(count = snapshot.messages.len(), "message history replaced");
                self.messages = Some(snapshot.messages.clone());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply_delta(&mut self, delta: &StateDeltaEvent) -> Result<()> {
        let patched = self.patched(delta)?;
        debug!(operations = delta.delta.len(), "state delta applied");
        self.state = Some(patched);
        Ok(())
    }

    fn patched(&self, delta: &StateDeltaEvent) -> Result<JsonValue> {
        let base = self.state.as_ref().ok_or(MissingBaseStateError)?;
        let operations = delta.operations()?;
        apply_operations(base, &operations)
    }

    /// Consumes the synchronizer, returning the final state and history.
    pub fn into_parts(self) -> (Option<JsonValue>, Option<Vec<Message>>) {
        (self.state, self.messages)
    }
}

/// Computes the difference between two states as wire-form operations.
///
/// Returns `None` if the states are identical.
///
/// ```rust
/// use agui_core::state::diff_states;
/// use serde_json::json;
///
/// assert!(diff_states(&json!({"count": 0}), &json!({"count": 5})).is_some());
/// assert!(diff_states(&json!({"count": 0}), &json!({"count": 0})).is_none());
/// ```
pub fn diff_states(old: &JsonValue, new: &JsonValue) -> Option<Vec<JsonValue>> {
    let patch = create_patch(old, new);
    if patch.0.is_empty() {
        None
    } else {
        Some(patch_to_vec(&patch))
    }
}

/// Tracks the state an agent publishes and computes deltas between versions.
///
/// ```rust
/// use agui_core::state::StateManager;
/// use serde_json::json;
///
/// let mut manager = StateManager::new(json!({"count": 0, "items": []}));
///
/// assert!(manager.update(json!({"count": 1, "items": []})).is_some());
/// assert!(manager.update(json!({"count": 1, "items": []})).is_none());
/// assert_eq!(manager.version(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct StateManager {
    current: JsonValue,
    version: u64,
}

impl StateManager {
    /// Creates a new state manager with the given initial state.
    pub fn new(initial: JsonValue) -> Self {
        Self {
            current: initial,
            version: 0,
        }
    }

    /// Returns a reference to the current state.
    pub fn current(&self) -> &JsonValue {
        &self.current
    }

    /// Returns the current state version (increments on each change).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replaces the state and returns the delta if anything changed.
    pub fn update(&mut self, new_state: JsonValue) -> Option<Vec<JsonValue>> {
        let delta = diff_states(&self.current, &new_state);
        if delta.is_some() {
            self.current = new_state;
            self.version += 1;
        }
        delta
    }

    /// Mutates the state in place and returns the resulting delta.
    ///
    /// ```rust
    /// use agui_core::state::StateManager;
    /// use serde_json::json;
    ///
    /// let mut manager = StateManager::new(json!({"count": 0}));
    /// let delta = manager.update_with(|state| state["count"] = json!(10));
    /// assert_eq!(delta.unwrap()[0]["op"], "replace");
    /// ```
    pub fn update_with<F>(&mut self, f: F) -> Option<Vec<JsonValue>>
    where
        F: FnOnce(&mut JsonValue),
    {
        let old_state = self.current.clone();
        f(&mut self.current);
        let delta = diff_states(&old_state, &self.current);
        if delta.is_some() {
            self.version += 1;
        }
        delta
    }

    /// Replaces the state without computing a delta. Follow with a snapshot.
    pub fn reset(&mut self, new_state: JsonValue) {
        self.current = new_state;
        self.version += 1;
    }

    /// Returns a clone of the current state.
    pub fn snapshot(&self) -> JsonValue {
        self.current.clone()
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new(JsonValue::Object(serde_json::Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::event::{MessagesSnapshotEvent, StateSnapshotEvent};
    use crate::types::Role;
    use serde_json::json;

    fn snapshot(value: JsonValue) -> Event {
        StateSnapshotEvent::new(value).into()
    }

    fn delta(ops: Vec<JsonValue>) -> Event {
        StateDeltaEvent::new(ops).into()
    }

    #[test]
    fn test_delta_without_base_is_rejected() {
        let mut sync = StateSynchronizer::new();
        let err = sync
            .apply(&delta(vec![json!({"op": "add", "path": "/a", "value": 1})]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MissingBaseState(_)));
        assert!(!sync.have_base());
    }

    #[test]
    fn test_snapshot_then_deltas() {
        let mut sync = StateSynchronizer::new();
        sync.apply(&snapshot(json!({"items": ["a"]}))).unwrap();
        sync.apply(&delta(vec![
            json!({"op": "add", "path": "/items/-", "value": "b"}),
            json!({"op": "copy", "from": "/items/0", "path": "/first"}),
        ]))
        .unwrap();
        assert_eq!(
            sync.state(),
            Some(&json!({"items": ["a", "b"], "first": "a"}))
        );
    }

    #[test]
    fn test_failed_test_leaves_state_untouched() {
        let mut sync = StateSynchronizer::new();
        sync.apply(&snapshot(json!({"count": 1}))).unwrap();

        let err = sync
            .apply(&delta(vec![
                json!({"op": "replace", "path": "/count", "value": 5}),
                json!({"op": "test", "path": "/count", "value": 1}),
            ]))
            .unwrap_err();

        match err {
            ProtocolError::StateTestFailed(e) => {
                assert_eq!(e.path, "/count");
                assert_eq!(e.expected, json!(1));
                assert_eq!(e.actual, Some(json!(5)));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(sync.state(), Some(&json!({"count": 1})));
    }

    #[test]
    fn test_replace_missing_path_is_invalid_patch() {
        let mut sync = StateSynchronizer::new();
        sync.apply(&snapshot(json!({}))).unwrap();
        let err = sync
            .apply(&delta(vec![json!({"op": "replace", "path": "/nope", "value": 1})]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPatch(ref e) if e.path == "/nope"));
    }

    #[test]
    fn test_messages_snapshot_replaces_history() {
        let mut sync = StateSynchronizer::new();
        let first = MessagesSnapshotEvent::new(vec![Message::new(Role::User, "u1", "hi")]);
        let second = MessagesSnapshotEvent::new(vec![Message::new(Role::User, "u2", "bye")]);
        sync.apply(&first.into()).unwrap();
        sync.apply(&second.into()).unwrap();
        let messages = sync.messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id(), "u2");
    }

    #[test]
    fn test_manager_deltas_replay_on_synchronizer() {
        let mut manager = StateManager::default();
        let mut sync = StateSynchronizer::new();
        sync.apply(&snapshot(manager.snapshot())).unwrap();

        for step in 0..3 {
            let ops = manager
                .update_with(|state| state["step"] = json!(step))
                .unwrap();
            sync.apply(&delta(ops)).unwrap();
        }
        assert_eq!(sync.state(), Some(manager.current()));
        assert_eq!(manager.version(), 3);
    }

    #[test]
    fn test_manager_reset_bumps_version() {
        let mut manager = StateManager::new(json!(1));
        manager.reset(json!(2));
        assert_eq!(manager.version(), 1);
        assert_eq!(manager.snapshot(), json!(2));
    }
}

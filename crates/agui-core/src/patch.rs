//! JSON Patch (RFC 6902) support for state deltas.
//!
//! Consumers apply the operations carried by `STATE_DELTA` through
//! [`apply_operations`], which works on a copy and reports the first failing
//! operation by index and path. Producers build deltas with [`create_patch`]
//! (diff two states) or [`PatchBuilder`] (explicit operations).
//!
//! # Example
//!
//! ```rust
//! use agui_core::patch::{apply_operations, create_patch};
//! use serde_json::json;
//!
//! let old_state = json!({"count": 0, "items": []});
//! let new_state = json!({"count": 1, "items": ["apple"]});
//!
//! let patch = create_patch(&old_state, &new_state);
//! let patched = apply_operations(&old_state, &patch.0).unwrap();
//! assert_eq!(patched, new_state);
//! ```

use jsonptr::PointerBuf;
use serde_json::json;
use tracing::trace;

use crate::JsonValue;
use crate::error::{InvalidPatchError, ProtocolError, StateTestFailedError};

pub use json_patch::{
    AddOperation, CopyOperation, MoveOperation, Patch, PatchOperation, RemoveOperation,
    ReplaceOperation, TestOperation,
};

/// Creates a JSON Patch that turns `from` into `to`.
///
/// ```rust
/// use agui_core::patch::create_patch;
/// use serde_json::json;
///
/// let patch = create_patch(&json!({"age": 30}), &json!({"age": 31}));
/// assert!(!patch.0.is_empty());
/// ```
pub fn create_patch(from: &JsonValue, to: &JsonValue) -> Patch {
    json_patch::diff(from, to)
}

/// Converts a Patch into the wire form carried by `STATE_DELTA`.
///
/// Every operation maps to exactly one object, in order.
pub fn patch_to_vec(patch: &Patch) -> Vec<JsonValue> {
    patch.0.iter().map(operation_to_value).collect()
}

fn operation_to_value(operation: &PatchOperation) -> JsonValue {
    match operation {
        PatchOperation::Add(op) => {
            json!({"op": "add", "path": op.path.as_str(), "value": op.value.clone()})
        }
        PatchOperation::Remove(op) => json!({"op": "remove", "path": op.path.as_str()}),
        PatchOperation::Replace(op) => {
            json!({"op": "replace", "path": op.path.as_str(), "value": op.value.clone()})
        }
        PatchOperation::Move(op) => {
            json!({"op": "move", "from": op.from.as_str(), "path": op.path.as_str()})
        }
        PatchOperation::Copy(op) => {
            json!({"op": "copy", "from": op.from.as_str(), "path": op.path.as_str()})
        }
        PatchOperation::Test(op) => {
            json!({"op": "test", "path": op.path.as_str(), "value": op.value.clone()})
        }
    }
}

/// Applies `operations` in order to a copy of `base` and returns the result.
///
/// `base` is never touched, so a failure part way through leaves the caller's
/// state exactly as it was. A failed `test` operation is reported as
/// [`StateTestFailedError`] with the expected and actual values; any other
/// failure as [`InvalidPatchError`].
pub fn apply_operations(
    base: &JsonValue,
    operations: &[PatchOperation],
) -> Result<JsonValue, ProtocolError> {
    let mut working = base.clone();
    for (index, operation) in operations.iter().enumerate() {
        if let Err(err) = json_patch::patch(&mut working, std::slice::from_ref(operation)) {
            trace!(operation = index, path = %err.path, "patch operation failed");
            return Err(operation_failure(&working, index, operation, err));
        }
    }
    Ok(working)
}

fn operation_failure(
    working: &JsonValue,
    index: usize,
    operation: &PatchOperation,
    err: json_patch::PatchError,
) -> ProtocolError {
    match (&err.kind, operation) {
        (json_patch::PatchErrorKind::TestFailed, PatchOperation::Test(test)) => {
            let path = test.path.to_string();
            StateTestFailedError {
                operation: index,
                actual: working.pointer(&path).cloned(),
                expected: test.value.clone(),
                path,
            }
            .into()
        }
        _ => InvalidPatchError {
            operation: index,
            path: operation_path(operation),
            reason: err.kind.to_string(),
        }
        .into(),
    }
}

fn operation_path(operation: &PatchOperation) -> String {
    match operation {
        PatchOperation::Add(op) => op.path.to_string(),
        PatchOperation::Remove(op) => op.path.to_string(),
        PatchOperation::Replace(op) => op.path.to_string(),
        PatchOperation::Move(op) => op.path.to_string(),
        PatchOperation::Copy(op) => op.path.to_string(),
        PatchOperation::Test(op) => op.path.to_string(),
    }
}

/// Builds a state delta from explicit operations.
///
/// Paths are parsed as JSON pointers; the first unparsable one is reported by
/// [`PatchBuilder::build`].
///
/// ```rust
/// use agui_core::patch::PatchBuilder;
/// use serde_json::json;
///
/// let ops = PatchBuilder::new()
///     .add("/name", json!("Alice"))
///     .replace("/age", json!(31))
///     .remove("/temp")
///     .build_vec()
///     .unwrap();
///
/// assert_eq!(ops.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatchBuilder {
    operations: Vec<PatchOperation>,
    error: Option<InvalidPatchError>,
}

impl PatchBuilder {
    /// Creates a new empty patch builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn pointer(&mut self, path: &str) -> PointerBuf {
        match PointerBuf::parse(path) {
            Ok(pointer) => pointer,
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(InvalidPatchError {
                        operation: self.operations.len(),
                        path: path.to_string(),
                        reason: err.to_string(),
                    });
                }
                PointerBuf::default()
            }
        }
    }

    /// Adds an "add" operation.
    pub fn add(mut self, path: impl AsRef<str>, value: JsonValue) -> Self {
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Add(AddOperation { path, value }));
        self
    }

    /// Adds a "remove" operation.
    pub fn remove(mut self, path: impl AsRef<str>) -> Self {
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Remove(RemoveOperation { path }));
        self
    }

    /// Adds a "replace" operation.
    pub fn replace(mut self, path: impl AsRef<str>, value: JsonValue) -> Self {
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Replace(ReplaceOperation { path, value }));
        self
    }

    /// Adds a "move" operation.
    pub fn move_value(mut self, from: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        let from = self.pointer(from.as_ref());
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Move(MoveOperation { from, path }));
        self
    }

    /// Adds a "copy" operation.
    pub fn copy(mut self, from: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        let from = self.pointer(from.as_ref());
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Copy(CopyOperation { from, path }));
        self
    }

    /// Adds a "test" operation. A failing test aborts the whole delta.
    pub fn test(mut self, path: impl AsRef<str>, value: JsonValue) -> Self {
        let path = self.pointer(path.as_ref());
        self.operations
            .push(PatchOperation::Test(TestOperation { path, value }));
        self
    }

    /// Builds the patch.
    pub fn build(self) -> Result<Patch, InvalidPatchError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Patch(self.operations)),
        }
    }

    /// Builds the patch in the form expected by `StateDeltaEvent`.
    pub fn build_vec(self) -> Result<Vec<JsonValue>, InvalidPatchError> {
        self.build().map(|patch| patch_to_vec(&patch))
    }
}

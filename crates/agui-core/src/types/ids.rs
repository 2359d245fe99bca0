//! ID types for the AG-UI protocol.
//!
//! Every identifier on the wire is an opaque string chosen by the producer
//! (`"m1"`, `"run_42"`, a UUID, ...). The newtypes below keep the different
//! kinds apart at compile time while accepting any string on decode.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::ops::Deref;
use uuid::Uuid;

/// Defines a string-backed ID newtype.
///
/// The optional prefix is used by `random()` so generated IDs stay readable in
/// logs (`msg_…`, `call_…`).
macro_rules! define_id_type {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!(stringify!($name), ": an opaque protocol identifier.")]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new random ID.
            pub fn random() -> Self {
                let uuid = Uuid::new_v4().simple().to_string();
                Self(format!("{}{}", $prefix, uuid))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` when the ID is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> Self {
                id.clone()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id_type!(ThreadId, "thread_");
define_id_type!(RunId, "run_");
define_id_type!(MessageId, "msg_");
define_id_type!(ToolCallId, "call_");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_random() {
        let id = ToolCallId::random();
        assert!(id.starts_with("call_"));
        assert_eq!(id.len(), 5 + 32);
    }

    #[test]
    fn test_random_ids_are_unique() {
        assert_ne!(MessageId::random(), MessageId::random());
        assert_ne!(RunId::random(), RunId::random());
    }

    #[test]
    fn test_arbitrary_strings_decode() {
        let id: MessageId = serde_json::from_str("\"m1\"").unwrap();
        assert_eq!(id, "m1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"m1\"");
    }

    #[test]
    fn test_display_and_deref() {
        let id = ThreadId::from("thread-abc");
        assert_eq!(id.to_string(), "thread-abc");
        assert_eq!(id.len(), 10);
        assert!(!id.is_empty());
        assert!(ThreadId::from("").is_empty());
    }
}

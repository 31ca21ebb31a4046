//! Server-assigned integer identifiers.
//!
//! Each identifier is a transparent newtype over `i64` so that a task id can
//! never be passed where a bucket id is expected. On the wire they are plain
//! JSON numbers.

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw server-assigned identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

integer_id!(
    /// Identifies a task.
    TaskId
);

integer_id!(
    /// Identifies a bucket (board column).
    BucketId
);

integer_id!(
    /// Identifies the project that owns a board.
    ProjectId
);

integer_id!(
    /// Identifies a user that can be assigned to tasks.
    UserId
);

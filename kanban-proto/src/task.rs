//! Task wire types and the order-update request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{BucketId, TaskId, UserId};

/// Maximum allowed task name length in characters.
pub const MAX_TASK_NAME_LENGTH: usize = 256;

/// A task as returned by the server inside its bucket.
///
/// `before_id` is the insert-before pointer: the id of the task that comes
/// immediately after this one in the same bucket, or `None` when this task
/// is last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Server-assigned task identifier.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional planned start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// Optional planned end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Users assigned to this task.
    #[serde(default)]
    pub assignees: Vec<UserId>,
    /// Id of the task that immediately follows this one, `None` if last.
    #[serde(default)]
    pub before_id: Option<TaskId>,
}

impl TaskRecord {
    /// Creates a bare record with only an id, a name and an order pointer.
    #[must_use]
    pub fn new(id: TaskId, name: impl Into<String>, before_id: Option<TaskId>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            start_date: None,
            end_date: None,
            assignees: Vec::new(),
            before_id,
        }
    }
}

/// Body of `POST /tasks`. The new task is placed last in its bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    /// Bucket the task is created in.
    pub bucket_id: BucketId,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional planned start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// Optional planned end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Users assigned on creation.
    #[serde(default)]
    pub assignees: Vec<UserId>,
}

impl CreateTask {
    /// Creates a request for a task with only a name.
    #[must_use]
    pub fn named(bucket_id: BucketId, name: impl Into<String>) -> Self {
        Self {
            bucket_id,
            name: name.into(),
            description: None,
            start_date: None,
            end_date: None,
            assignees: Vec::new(),
        }
    }
}

/// Body of `PUT /tasks/{task_id}`: the single write a drag produces.
///
/// `before_id: null` places the task last in `bucket_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTask {
    /// Bucket the task now lives in.
    pub bucket_id: BucketId,
    /// Task that now immediately follows it, `None` for last.
    pub before_id: Option<TaskId>,
}

/// A fully addressed order update, as derived from a finished drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrderUpdate {
    /// The task that was moved.
    pub task_id: TaskId,
    /// Its final bucket.
    pub bucket_id: BucketId,
    /// Its new insert-before pointer.
    pub before_id: Option<TaskId>,
}

impl TaskOrderUpdate {
    /// Returns the request body for `PUT /tasks/{task_id}`.
    #[must_use]
    pub const fn body(&self) -> MoveTask {
        MoveTask {
            bucket_id: self.bucket_id,
            before_id: self.before_id,
        }
    }
}

//! Bucket wire types.

use serde::{Deserialize, Serialize};

use crate::ids::{BucketId, ProjectId};
use crate::task::TaskRecord;

/// Maximum allowed bucket name length in characters.
pub const MAX_BUCKET_NAME_LENGTH: usize = 128;

/// One element of `GET /projects/{id}/buckets-with-tasks`.
///
/// Buckets arrive in board order. Tasks inside a bucket arrive in no
/// particular order; their order is carried by [`TaskRecord::before_id`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketWithTasks {
    /// Server-assigned bucket identifier.
    pub id: BucketId,
    /// Display name.
    pub name: String,
    /// Tasks of this bucket with their order pointers.
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

/// A bucket without its tasks, as returned by the bucket endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRecord {
    /// Server-assigned bucket identifier.
    pub id: BucketId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
}

/// Body of `POST /buckets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBucket {
    /// Project the bucket is added to (appended after existing buckets).
    pub project_id: ProjectId,
    /// Display name.
    pub name: String,
}

/// Body of `PUT /buckets/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameBucket {
    /// New display name.
    pub name: String,
}

//! Client side of the board REST interface.
//!
//! Defines the [`BoardApi`] trait the session talks to. Concrete
//! implementations:
//! - [`http::HttpBoardApi`]: JSON over HTTP via `reqwest`

pub mod http;

pub use http::HttpBoardApi;

use std::future::Future;

use kanban_proto::bucket::{BucketRecord, BucketWithTasks, CreateBucket, RenameBucket};
use kanban_proto::codec::CodecError;
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, TaskOrderUpdate, TaskRecord};

/// Errors that can occur while talking to the board server.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the response not received.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Codec(#[from] CodecError),

    /// The configured base URL is unusable.
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The task running the request panicked or was cancelled.
    #[error("request interrupted: {0}")]
    Interrupted(String),
}

impl ApiError {
    /// Whether the server reported that an id does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Async operations on one board server.
///
/// Every method is a single request. Implementations must be cheap to clone
/// so the session can move a handle into each spawned request.
pub trait BoardApi: Send + Sync {
    /// `GET /projects/{id}/buckets-with-tasks`
    fn fetch_board(
        &self,
        project_id: ProjectId,
    ) -> impl Future<Output = Result<Vec<BucketWithTasks>, ApiError>> + Send;

    /// `POST /buckets`
    fn create_bucket(
        &self,
        request: &CreateBucket,
    ) -> impl Future<Output = Result<BucketRecord, ApiError>> + Send;

    /// `PUT /buckets/{id}`
    fn rename_bucket(
        &self,
        bucket_id: BucketId,
        request: &RenameBucket,
    ) -> impl Future<Output = Result<BucketRecord, ApiError>> + Send;

    /// `DELETE /buckets/{id}`
    fn delete_bucket(
        &self,
        bucket_id: BucketId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// `POST /tasks`
    fn create_task(
        &self,
        request: &CreateTask,
    ) -> impl Future<Output = Result<TaskRecord, ApiError>> + Send;

    /// `PUT /tasks/{task_id}` with `{bucket_id, before_id}`: the commit write.
    fn move_task(
        &self,
        update: &TaskOrderUpdate,
    ) -> impl Future<Output = Result<TaskRecord, ApiError>> + Send;

    /// `DELETE /tasks/{task_id}`
    fn delete_task(&self, task_id: TaskId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

//! HTTP routes for the board REST interface.
//!
//! | Method   | Path                                  | Body            |
//! |----------|---------------------------------------|-----------------|
//! | `GET`    | `/projects/{id}/buckets-with-tasks`   |                 |
//! | `POST`   | `/buckets`                            | `CreateBucket`  |
//! | `PUT`    | `/buckets/{id}`                       | `RenameBucket`  |
//! | `DELETE` | `/buckets/{id}`                       |                 |
//! | `POST`   | `/tasks`                              | `CreateTask`    |
//! | `PUT`    | `/tasks/{id}`                         | `MoveTask`      |
//! | `DELETE` | `/tasks/{id}`                         |                 |
//!
//! Every failure is a JSON [`ErrorBody`]: 404 for unknown ids, 400 for
//! invalid pointers, names and malformed bodies.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use kanban_proto::bucket::{BucketRecord, BucketWithTasks, CreateBucket, RenameBucket};
use kanban_proto::codec::ErrorBody;
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, MoveTask, TaskRecord};

use crate::store::{BoardDb, StoreError};

/// Errors a route handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The request body is not valid JSON for the endpoint.
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
    /// A path segment is not a valid id.
    #[error("invalid path: {0}")]
    Path(#[from] PathRejection),
}

impl RouteError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::BucketNotFound(_) | StoreError::TaskNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(_) | Self::Body(_) | Self::Path(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(error = %self, "request for unknown id");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type RouteResult<T> = Result<T, RouteError>;

/// Builds the router over a shared store.
pub fn router(db: Arc<BoardDb>) -> Router {
    Router::new()
        .route("/projects/{id}/buckets-with-tasks", get(board))
        .route("/buckets", post(create_bucket))
        .route("/buckets/{id}", put(rename_bucket).delete(delete_bucket))
        .route("/tasks", post(create_task))
        .route("/tasks/{id}", put(move_task).delete(delete_task))
        .with_state(db)
}

async fn board(
    State(db): State<Arc<BoardDb>>,
    id: Result<Path<ProjectId>, PathRejection>,
) -> RouteResult<Json<Vec<BucketWithTasks>>> {
    let Path(project_id) = id?;
    Ok(Json(db.board(project_id)))
}

async fn create_bucket(
    State(db): State<Arc<BoardDb>>,
    body: Result<Json<CreateBucket>, JsonRejection>,
) -> RouteResult<(StatusCode, Json<BucketRecord>)> {
    let Json(request) = body?;
    Ok((StatusCode::CREATED, Json(db.create_bucket(&request)?)))
}

async fn rename_bucket(
    State(db): State<Arc<BoardDb>>,
    id: Result<Path<BucketId>, PathRejection>,
    body: Result<Json<RenameBucket>, JsonRejection>,
) -> RouteResult<Json<BucketRecord>> {
    let Path(bucket_id) = id?;
    let Json(request) = body?;
    Ok(Json(db.rename_bucket(bucket_id, &request)?))
}

async fn delete_bucket(
    State(db): State<Arc<BoardDb>>,
    id: Result<Path<BucketId>, PathRejection>,
) -> RouteResult<StatusCode> {
    let Path(bucket_id) = id?;
    db.delete_bucket(bucket_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_task(
    State(db): State<Arc<BoardDb>>,
    body: Result<Json<CreateTask>, JsonRejection>,
) -> RouteResult<(StatusCode, Json<TaskRecord>)> {
    let Json(request) = body?;
    Ok((StatusCode::CREATED, Json(db.create_task(&request)?)))
}

async fn move_task(
    State(db): State<Arc<BoardDb>>,
    id: Result<Path<TaskId>, PathRejection>,
    body: Result<Json<MoveTask>, JsonRejection>,
) -> RouteResult<Json<TaskRecord>> {
    let Path(task_id) = id?;
    let Json(request) = body?;
    Ok(Json(db.move_task(task_id, request)?))
}

async fn delete_task(
    State(db): State<Arc<BoardDb>>,
    id: Result<Path<TaskId>, PathRejection>,
) -> RouteResult<StatusCode> {
    let Path(task_id) = id?;
    db.delete_task(task_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Starts the server on `addr` with an empty store.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(BoardDb::new())).await
}

/// Starts the server with a pre-built store.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    db: Arc<BoardDb>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(db);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "board server error");
        }
    });

    Ok((bound_addr, handle))
}

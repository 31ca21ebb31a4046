//! `reqwest`-backed implementation of [`BoardApi`].

use std::time::Duration;

use kanban_proto::bucket::{BucketRecord, BucketWithTasks, CreateBucket, RenameBucket};
use kanban_proto::codec::{self, ErrorBody};
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, TaskOrderUpdate, TaskRecord};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use super::{ApiError, BoardApi};

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for one board server.
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    client: Client,
    base: Url,
}

impl HttpBoardApi {
    /// Creates a client for the server at `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the URL cannot be parsed, or
    /// [`ApiError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Creates a client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the path ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// The normalized base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }
}

/// Turns a non-success response into [`ApiError::Status`].
async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let bytes = response.bytes().await?;
    let message = codec::decode::<ErrorBody>(&bytes).map_or_else(
        |_| String::from_utf8_lossy(&bytes).into_owned(),
        |body| body.error,
    );
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode_body<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = check(response).await?.bytes().await?;
    Ok(codec::decode(&bytes)?)
}

impl BoardApi for HttpBoardApi {
    async fn fetch_board(&self, project_id: ProjectId) -> Result<Vec<BucketWithTasks>, ApiError> {
        let url = self.endpoint(&format!("projects/{project_id}/buckets-with-tasks"))?;
        tracing::debug!(%project_id, "fetching board");
        decode_body(self.client.get(url).send().await?).await
    }

    async fn create_bucket(&self, request: &CreateBucket) -> Result<BucketRecord, ApiError> {
        let url = self.endpoint("buckets")?;
        decode_body(self.client.post(url).json(request).send().await?).await
    }

    async fn rename_bucket(
        &self,
        bucket_id: BucketId,
        request: &RenameBucket,
    ) -> Result<BucketRecord, ApiError> {
        let url = self.endpoint(&format!("buckets/{bucket_id}"))?;
        decode_body(self.client.put(url).json(request).send().await?).await
    }

    async fn delete_bucket(&self, bucket_id: BucketId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("buckets/{bucket_id}"))?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }

    async fn create_task(&self, request: &CreateTask) -> Result<TaskRecord, ApiError> {
        let url = self.endpoint("tasks")?;
        decode_body(self.client.post(url).json(request).send().await?).await
    }

    async fn move_task(&self, update: &TaskOrderUpdate) -> Result<TaskRecord, ApiError> {
        let url = self.endpoint(&format!("tasks/{}", update.task_id))?;
        tracing::debug!(
            task_id = %update.task_id,
            bucket_id = %update.bucket_id,
            before_id = ?update.before_id,
            "committing task order"
        );
        decode_body(self.client.put(url).json(&update.body()).send().await?).await
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("tasks/{task_id}"))?;
        check(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

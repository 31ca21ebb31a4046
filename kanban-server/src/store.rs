//! In-memory board database.
//!
//! Buckets are kept in per-project board order. Tasks carry only their
//! insert-before pointer, exactly as they are served: within a bucket, each
//! task's `before_id` names the task after it and the last task has none.
//! Every write keeps each bucket a single well-formed chain.

use std::collections::HashMap;

use kanban_proto::bucket::{
    BucketRecord, BucketWithTasks, CreateBucket, MAX_BUCKET_NAME_LENGTH, RenameBucket,
};
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, MAX_TASK_NAME_LENGTH, MoveTask, TaskRecord};
use parking_lot::RwLock;

/// Errors returned by [`BoardDb`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No bucket with this id.
    #[error("bucket {0} not found")]
    BucketNotFound(BucketId),
    /// No task with this id.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    /// The requested `before_id` cannot be used in the target bucket.
    #[error("task {before_id} cannot follow task {task_id} in bucket {bucket_id}")]
    InvalidPointer {
        /// Task being placed.
        task_id: TaskId,
        /// Bucket it is placed in.
        bucket_id: BucketId,
        /// Rejected successor.
        before_id: TaskId,
    },
    /// Name is empty or whitespace only.
    #[error("name must not be empty")]
    EmptyName,
    /// Name exceeds the configured limit.
    #[error("name is {len} characters, limit is {max}")]
    NameTooLong {
        /// Length of the rejected name in characters.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

#[derive(Debug)]
struct StoredBucket {
    project_id: ProjectId,
    name: String,
}

#[derive(Debug)]
struct StoredTask {
    bucket_id: BucketId,
    record: TaskRecord,
}

#[derive(Debug, Default)]
struct Tables {
    next_bucket_id: i64,
    next_task_id: i64,
    /// Bucket order per project.
    boards: HashMap<ProjectId, Vec<BucketId>>,
    buckets: HashMap<BucketId, StoredBucket>,
    tasks: HashMap<TaskId, StoredTask>,
}

/// Thread-safe in-memory store of projects, buckets and tasks.
#[derive(Debug)]
pub struct BoardDb {
    tables: RwLock<Tables>,
    max_bucket_name: usize,
    max_task_name: usize,
}

impl Default for BoardDb {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardDb {
    /// Creates an empty store with the protocol's default name limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            max_bucket_name: MAX_BUCKET_NAME_LENGTH,
            max_task_name: MAX_TASK_NAME_LENGTH,
        }
    }

    /// Creates an empty store with one name limit for buckets and tasks.
    #[must_use]
    pub fn with_max_name_length(max_name_length: usize) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            max_bucket_name: max_name_length,
            max_task_name: max_name_length,
        }
    }

    /// Returns a project's buckets in board order with their tasks.
    ///
    /// Tasks are listed by id, not by board order; clients rebuild the order
    /// from the pointers. Unknown projects have an empty board.
    #[must_use]
    pub fn board(&self, project_id: ProjectId) -> Vec<BucketWithTasks> {
        let tables = self.tables.read();
        let Some(order) = tables.boards.get(&project_id) else {
            return Vec::new();
        };
        order
            .iter()
            .filter_map(|bucket_id| {
                let bucket = tables.buckets.get(bucket_id)?;
                let mut tasks: Vec<TaskRecord> = tables
                    .tasks
                    .values()
                    .filter(|t| t.bucket_id == *bucket_id)
                    .map(|t| t.record.clone())
                    .collect();
                tasks.sort_by_key(|t| t.id);
                Some(BucketWithTasks {
                    id: *bucket_id,
                    name: bucket.name.clone(),
                    tasks,
                })
            })
            .collect()
    }

    /// Appends a bucket to a project's board.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyName`] or [`StoreError::NameTooLong`].
    pub fn create_bucket(&self, request: &CreateBucket) -> Result<BucketRecord, StoreError> {
        let name = validate_name(&request.name, self.max_bucket_name)?;
        let mut tables = self.tables.write();
        tables.next_bucket_id += 1;
        let id = BucketId::new(tables.next_bucket_id);
        tables.buckets.insert(
            id,
            StoredBucket {
                project_id: request.project_id,
                name: name.clone(),
            },
        );
        tables.boards.entry(request.project_id).or_default().push(id);
        tracing::debug!(bucket_id = %id, project_id = %request.project_id, "bucket created");
        Ok(BucketRecord {
            id,
            project_id: request.project_id,
            name,
        })
    }

    /// Renames a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`] or a name validation error.
    pub fn rename_bucket(
        &self,
        bucket_id: BucketId,
        request: &RenameBucket,
    ) -> Result<BucketRecord, StoreError> {
        let name = validate_name(&request.name, self.max_bucket_name)?;
        let mut tables = self.tables.write();
        let bucket = tables
            .buckets
            .get_mut(&bucket_id)
            .ok_or(StoreError::BucketNotFound(bucket_id))?;
        bucket.name.clone_from(&name);
        Ok(BucketRecord {
            id: bucket_id,
            project_id: bucket.project_id,
            name,
        })
    }

    /// Deletes a bucket and every task in it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`].
    pub fn delete_bucket(&self, bucket_id: BucketId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let bucket = tables
            .buckets
            .remove(&bucket_id)
            .ok_or(StoreError::BucketNotFound(bucket_id))?;
        if let Some(order) = tables.boards.get_mut(&bucket.project_id) {
            order.retain(|id| *id != bucket_id);
        }
        let before = tables.tasks.len();
        tables.tasks.retain(|_, t| t.bucket_id != bucket_id);
        tracing::debug!(
            %bucket_id,
            removed_tasks = before - tables.tasks.len(),
            "bucket deleted"
        );
        Ok(())
    }

    /// Creates a task as the last task of its bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BucketNotFound`] or a name validation error.
    pub fn create_task(&self, request: &CreateTask) -> Result<TaskRecord, StoreError> {
        let name = validate_name(&request.name, self.max_task_name)?;
        let mut tables = self.tables.write();
        if !tables.buckets.contains_key(&request.bucket_id) {
            return Err(StoreError::BucketNotFound(request.bucket_id));
        }
        tables.next_task_id += 1;
        let id = TaskId::new(tables.next_task_id);
        let record = TaskRecord {
            id,
            name,
            description: request.description.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            assignees: request.assignees.clone(),
            before_id: None,
        };
        tables.tasks.insert(
            id,
            StoredTask {
                bucket_id: request.bucket_id,
                record,
            },
        );
        tables.link(id, request.bucket_id, None);
        tracing::debug!(task_id = %id, bucket_id = %request.bucket_id, "task created");
        tables.record(id).ok_or(StoreError::TaskNotFound(id))
    }

    /// Moves a task so it sits immediately before `before_id` in `bucket_id`,
    /// or last when `before_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] or [`StoreError::BucketNotFound`]
    /// for unknown ids, and [`StoreError::InvalidPointer`] when `before_id`
    /// is the task itself or is not in the target bucket.
    pub fn move_task(&self, task_id: TaskId, request: MoveTask) -> Result<TaskRecord, StoreError> {
        let mut tables = self.tables.write();
        if !tables.tasks.contains_key(&task_id) {
            return Err(StoreError::TaskNotFound(task_id));
        }
        if !tables.buckets.contains_key(&request.bucket_id) {
            return Err(StoreError::BucketNotFound(request.bucket_id));
        }
        if let Some(before_id) = request.before_id {
            let valid = before_id != task_id
                && tables
                    .tasks
                    .get(&before_id)
                    .is_some_and(|t| t.bucket_id == request.bucket_id);
            if !valid {
                return Err(StoreError::InvalidPointer {
                    task_id,
                    bucket_id: request.bucket_id,
                    before_id,
                });
            }
        }

        tables.unlink(task_id);
        if let Some(task) = tables.tasks.get_mut(&task_id) {
            task.bucket_id = request.bucket_id;
        }
        tables.link(task_id, request.bucket_id, request.before_id);
        tracing::debug!(
            %task_id,
            bucket_id = %request.bucket_id,
            before_id = ?request.before_id,
            "task moved"
        );
        tables.record(task_id).ok_or(StoreError::TaskNotFound(task_id))
    }

    /// Deletes a task, closing the gap it leaves in its bucket.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`].
    pub fn delete_task(&self, task_id: TaskId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if !tables.tasks.contains_key(&task_id) {
            return Err(StoreError::TaskNotFound(task_id));
        }
        tables.unlink(task_id);
        tables.tasks.remove(&task_id);
        tracing::debug!(%task_id, "task deleted");
        Ok(())
    }
}

impl Tables {
    fn record(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.tasks.get(&task_id).map(|t| t.record.clone())
    }

    /// The task in `bucket_id` whose pointer is `next`, ignoring `except`.
    fn predecessor(
        &self,
        bucket_id: BucketId,
        next: Option<TaskId>,
        except: TaskId,
    ) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|(id, t)| {
                **id != except && t.bucket_id == bucket_id && t.record.before_id == next
            })
            .map(|(id, _)| *id)
    }

    /// Removes a task from its bucket's chain. The task keeps its bucket.
    fn unlink(&mut self, task_id: TaskId) {
        let Some(task) = self.tasks.get(&task_id) else {
            return;
        };
        let (bucket_id, next) = (task.bucket_id, task.record.before_id);
        if let Some(prev) = self.predecessor(bucket_id, Some(task_id), task_id) {
            if let Some(prev) = self.tasks.get_mut(&prev) {
                prev.record.before_id = next;
            }
        }
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.record.before_id = None;
        }
    }

    /// Inserts an unlinked task into `bucket_id` right before `before_id`.
    fn link(&mut self, task_id: TaskId, bucket_id: BucketId, before_id: Option<TaskId>) {
        if let Some(prev) = self.predecessor(bucket_id, before_id, task_id) {
            if let Some(prev) = self.tasks.get_mut(&prev) {
                prev.record.before_id = Some(task_id);
            }
        }
        if let Some(task) = self.tasks.get_mut(&task_id) {
            task.record.before_id = before_id;
        }
    }
}

fn validate_name(name: &str, max: usize) -> Result<String, StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::EmptyName);
    }
    let len = name.chars().count();
    if len > max {
        return Err(StoreError::NameTooLong { len, max });
    }
    Ok(name.to_string())
}

//! In-memory board model.
//!
//! A [`Board`] is an arena: task payloads live in one shared map keyed by
//! [`TaskId`], and each [`Bucket`] stores only the ordered list of ids it
//! holds. Buckets are reference counted so that cloning a board is cheap and
//! a transition copies only the bucket lists it actually rewrites.
//!
//! Invariant: every task id in the payload map appears in exactly one
//! bucket list, exactly once, and no bucket list names an id without a
//! payload. [`Board::check_invariants`] verifies this mechanically.

pub mod order;
pub mod reducer;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kanban_proto::bucket::BucketWithTasks;
use kanban_proto::ids::{BucketId, TaskId, UserId};
use kanban_proto::task::TaskRecord;
use thiserror::Error;
use uuid::Uuid;

pub use order::{OrderError, derive_predecessor_pointer, materialize};
pub use reducer::{BoardAction, BoardState, DragTarget, DraggedTask, reduce};

/// Errors raised when a board is built or queried with inconsistent ids.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    /// Bucket with the given id is not on the board.
    #[error("bucket not found: {0}")]
    UnknownBucket(BucketId),
    /// Task with the given id is not on the board.
    #[error("task not found: {0}")]
    UnknownTask(TaskId),
    /// The task exists but lives in a different bucket.
    #[error("task {task} is not in bucket {bucket}")]
    TaskNotInBucket {
        /// Task that was looked up.
        task: TaskId,
        /// Bucket it was expected in.
        bucket: BucketId,
    },
    /// A task id appears more than once across the bucket lists.
    #[error("task {0} appears more than once")]
    DuplicateTask(TaskId),
    /// Two buckets share an id.
    #[error("bucket {0} appears more than once")]
    DuplicateBucket(BucketId),
    /// A bucket list names a task that has no payload.
    #[error("task {0} is listed but has no payload")]
    MissingPayload(TaskId),
    /// A payload exists for a task no bucket lists.
    #[error("task {0} has a payload but is not in any bucket")]
    Unplaced(TaskId),
}

/// Synthetic per-render key used to identify a task card to drag-and-drop
/// primitives. Never persisted and never sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderKey(Uuid);

impl RenderKey {
    /// Creates a fresh time-ordered key (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the inner UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RenderKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RenderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,
    /// Drag key, distinct from `id`.
    pub key: RenderKey,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional planned start.
    pub start_date: Option<DateTime<Utc>>,
    /// Optional planned end.
    pub end_date: Option<DateTime<Utc>>,
    /// Assigned users.
    pub assignees: BTreeSet<UserId>,
}

impl Task {
    /// Creates a task with only an id and a name.
    #[must_use]
    pub fn new(id: TaskId, name: impl Into<String>) -> Self {
        Self {
            id,
            key: RenderKey::new(),
            name: name.into(),
            description: None,
            start_date: None,
            end_date: None,
            assignees: BTreeSet::new(),
        }
    }

    /// Builds a task from its wire record, minting a fresh render key.
    /// The record's order pointer is not part of the task.
    #[must_use]
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            key: RenderKey::new(),
            name: record.name.clone(),
            description: record.description.clone(),
            start_date: record.start_date,
            end_date: record.end_date,
            assignees: record.assignees.iter().copied().collect(),
        }
    }

    /// Converts back to wire form with the given order pointer.
    #[must_use]
    pub fn to_record(&self, before_id: Option<TaskId>) -> TaskRecord {
        TaskRecord {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            assignees: self.assignees.iter().copied().collect(),
            before_id,
        }
    }

    /// Compares everything except the render key.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.description == other.description
            && self.start_date == other.start_date
            && self.end_date == other.end_date
            && self.assignees == other.assignees
    }
}

/// A named column holding an ordered list of task ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    /// Server-assigned identifier.
    pub id: BucketId,
    /// Display name.
    pub name: String,
    tasks: Vec<TaskId>,
}

impl Bucket {
    /// Creates an empty bucket.
    #[must_use]
    pub fn new(id: BucketId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Ordered ids of the tasks in this bucket.
    #[must_use]
    pub fn task_ids(&self) -> &[TaskId] {
        &self.tasks
    }

    /// Number of tasks in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the bucket holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Position of a task in this bucket.
    #[must_use]
    pub fn position(&self, task_id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|id| *id == task_id)
    }
}

/// Where a task currently sits on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLocation {
    /// Id of the containing bucket.
    pub bucket_id: BucketId,
    /// Index of the containing bucket in board order.
    pub bucket_index: usize,
    /// Index of the task within its bucket.
    pub index: usize,
}

/// Ordered buckets of ordered tasks for one project.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    buckets: Vec<Arc<Bucket>>,
    tasks: Arc<HashMap<TaskId, Task>>,
}

impl Board {
    /// Creates a board with no buckets.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a board from buckets listed with their tasks in order.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::DuplicateBucket`] or [`BoardError::DuplicateTask`]
    /// if an id is used twice.
    pub fn from_buckets<I, N>(buckets: I) -> Result<Self, BoardError>
    where
        I: IntoIterator<Item = (BucketId, N, Vec<Task>)>,
        N: Into<String>,
    {
        let mut seen_buckets = HashSet::new();
        let mut payloads = HashMap::new();
        let mut columns = Vec::new();

        for (bucket_id, name, tasks) in buckets {
            if !seen_buckets.insert(bucket_id) {
                return Err(BoardError::DuplicateBucket(bucket_id));
            }
            let mut bucket = Bucket::new(bucket_id, name);
            for task in tasks {
                let id = task.id;
                if payloads.insert(id, task).is_some() {
                    return Err(BoardError::DuplicateTask(id));
                }
                bucket.tasks.push(id);
            }
            columns.push(Arc::new(bucket));
        }

        Ok(Self {
            buckets: columns,
            tasks: Arc::new(payloads),
        })
    }

    /// Buckets in board order.
    pub fn buckets(&self) -> impl ExactSizeIterator<Item = &Bucket> {
        self.buckets.iter().map(AsRef::as_ref)
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Looks up a bucket by id.
    #[must_use]
    pub fn bucket(&self, bucket_id: BucketId) -> Option<&Bucket> {
        self.buckets().find(|b| b.id == bucket_id)
    }

    /// Index of a bucket in board order.
    #[must_use]
    pub fn bucket_index(&self, bucket_id: BucketId) -> Option<usize> {
        self.buckets.iter().position(|b| b.id == bucket_id)
    }

    /// Looks up a task payload by id.
    #[must_use]
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Tasks of a bucket in order. Empty if the bucket is unknown.
    pub fn tasks_in(&self, bucket_id: BucketId) -> impl Iterator<Item = &Task> {
        self.bucket(bucket_id)
            .map(Bucket::task_ids)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.tasks.get(id))
    }

    /// Total number of tasks on the board.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.buckets.iter().map(|b| b.tasks.len()).sum()
    }

    /// Finds the bucket and index holding a task.
    #[must_use]
    pub fn locate(&self, task_id: TaskId) -> Option<TaskLocation> {
        self.buckets
            .iter()
            .enumerate()
            .find_map(|(bucket_index, bucket)| {
                bucket.position(task_id).map(|index| TaskLocation {
                    bucket_id: bucket.id,
                    bucket_index,
                    index,
                })
            })
    }

    /// Verifies the uniqueness invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), BoardError> {
        let mut seen_buckets = HashSet::new();
        let mut placed = HashSet::new();
        for bucket in &self.buckets {
            if !seen_buckets.insert(bucket.id) {
                return Err(BoardError::DuplicateBucket(bucket.id));
            }
            for id in &bucket.tasks {
                if !placed.insert(*id) {
                    return Err(BoardError::DuplicateTask(*id));
                }
                if !self.tasks.contains_key(id) {
                    return Err(BoardError::MissingPayload(*id));
                }
            }
        }
        if let Some(id) = self.tasks.keys().find(|id| !placed.contains(id)) {
            return Err(BoardError::Unplaced(*id));
        }
        Ok(())
    }

    /// Compares layout and task content, ignoring render keys.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.buckets == other.buckets
            && self.tasks.len() == other.tasks.len()
            && self.tasks.iter().all(|(id, task)| {
                other
                    .tasks
                    .get(id)
                    .is_some_and(|theirs| task.same_content(theirs))
            })
    }

    /// Carries render keys over from `previous` for every task id both boards
    /// share, so drag primitives keep a stable key across refreshes.
    pub fn adopt_render_keys(&mut self, previous: &Self) {
        let tasks = Arc::make_mut(&mut self.tasks);
        for (id, task) in tasks.iter_mut() {
            if let Some(old) = previous.tasks.get(id) {
                task.key = old.key;
            }
        }
    }

    /// Converts to wire form, deriving each task's insert-before pointer from
    /// its successor in the bucket list.
    #[must_use]
    pub fn to_wire(&self) -> Vec<BucketWithTasks> {
        self.buckets
            .iter()
            .map(|bucket| {
                let tasks = bucket
                    .tasks
                    .iter()
                    .enumerate()
                    .filter_map(|(i, id)| {
                        let next = bucket.tasks.get(i + 1).copied();
                        self.tasks.get(id).map(|task| task.to_record(next))
                    })
                    .collect();
                BucketWithTasks {
                    id: bucket.id,
                    name: bucket.name.clone(),
                    tasks,
                }
            })
            .collect()
    }

    /// Removes the task at `index` of bucket `bucket_index`, copying that
    /// bucket's list only if it is shared.
    pub(crate) fn remove_at(&mut self, bucket_index: usize, index: usize) -> Option<TaskId> {
        let bucket = Arc::make_mut(self.buckets.get_mut(bucket_index)?);
        (index < bucket.tasks.len()).then(|| bucket.tasks.remove(index))
    }

    /// Inserts a task id into bucket `bucket_index`, clamping `index` to the
    /// list length.
    pub(crate) fn insert_at(&mut self, bucket_index: usize, index: usize, task_id: TaskId) {
        if let Some(slot) = self.buckets.get_mut(bucket_index) {
            let bucket = Arc::make_mut(slot);
            let index = index.min(bucket.tasks.len());
            bucket.tasks.insert(index, task_id);
        }
    }

    /// Whether two boards share the same allocation for a bucket list.
    #[cfg(test)]
    pub(crate) fn shares_bucket(&self, other: &Self, bucket_index: usize) -> bool {
        match (self.buckets.get(bucket_index), other.buckets.get(bucket_index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

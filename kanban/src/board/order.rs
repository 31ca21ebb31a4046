//! Conversion between insert-before pointers and ordered bucket lists.
//!
//! The server stores order as one pointer per task: the id of the task that
//! immediately follows it, or nothing for the last task. Materialization walks
//! each bucket's chain from its head (the one task no other task points at)
//! and refuses to produce a board from a chain that is not a single simple
//! path covering every task in the bucket.

use std::collections::{HashMap, HashSet};

use kanban_proto::bucket::BucketWithTasks;
use kanban_proto::ids::{BucketId, TaskId};
use kanban_proto::task::TaskRecord;
use thiserror::Error;

use super::{Board, BoardError, Task};

/// Corruption found in server order data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    /// The same bucket id appears twice in the payload.
    #[error("bucket {0} appears more than once")]
    DuplicateBucket(BucketId),
    /// The same task id appears twice, in one bucket or across buckets.
    #[error("task {task} appears more than once (seen again in bucket {bucket})")]
    DuplicateTask {
        /// Bucket where the repeat was found.
        bucket: BucketId,
        /// Repeated task.
        task: TaskId,
    },
    /// A pointer names a task that is not in the same bucket.
    #[error("task {task} in bucket {bucket} points at {before_id}, which is not in that bucket")]
    OrphanPointer {
        /// Bucket being materialized.
        bucket: BucketId,
        /// Task holding the pointer.
        task: TaskId,
        /// Target that could not be found.
        before_id: TaskId,
    },
    /// Two tasks claim to come immediately before the same task.
    #[error("tasks {first} and {second} in bucket {bucket} both point at {successor}")]
    SharedSuccessor {
        /// Bucket being materialized.
        bucket: BucketId,
        /// Task pointed at twice.
        successor: TaskId,
        /// First task pointing at it.
        first: TaskId,
        /// Second task pointing at it.
        second: TaskId,
    },
    /// More than one task has no predecessor.
    #[error("bucket {bucket} has {} heads: {heads:?}", heads.len())]
    MultipleHeads {
        /// Bucket being materialized.
        bucket: BucketId,
        /// Every task without a predecessor, in id order.
        heads: Vec<TaskId>,
    },
    /// Following the pointers loops back on itself.
    #[error("order cycle in bucket {bucket} through task {task}")]
    Cycle {
        /// Bucket being materialized.
        bucket: BucketId,
        /// Lowest task id on the cycle.
        task: TaskId,
    },
    /// The ordered lists could not be assembled into a board.
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Builds a [`Board`] from the server's pointer-ordered payload.
///
/// Buckets keep the order they arrive in. Within a bucket, tasks are ordered
/// by walking `before_id` pointers from the head.
///
/// # Errors
///
/// Returns an [`OrderError`] if any bucket's pointers do not form exactly one
/// acyclic chain through all of its tasks, or if ids repeat.
pub fn materialize(server_buckets: &[BucketWithTasks]) -> Result<Board, OrderError> {
    let mut seen_buckets = HashSet::new();
    let mut seen_tasks = HashSet::new();
    let mut columns = Vec::with_capacity(server_buckets.len());

    for bucket in server_buckets {
        if !seen_buckets.insert(bucket.id) {
            return Err(OrderError::DuplicateBucket(bucket.id));
        }
        for record in &bucket.tasks {
            if !seen_tasks.insert(record.id) {
                return Err(OrderError::DuplicateTask {
                    bucket: bucket.id,
                    task: record.id,
                });
            }
        }
        let ordered = order_bucket(bucket.id, &bucket.tasks)?;
        let tasks = ordered.into_iter().map(Task::from_record).collect();
        columns.push((bucket.id, bucket.name.clone(), tasks));
    }

    Ok(Board::from_buckets(columns)?)
}

/// Orders one bucket's records by following their pointers.
fn order_bucket(bucket: BucketId, records: &[TaskRecord]) -> Result<Vec<&TaskRecord>, OrderError> {
    let Some(lowest) = records.iter().map(|r| r.id).min() else {
        return Ok(Vec::new());
    };

    let by_id: HashMap<TaskId, &TaskRecord> = records.iter().map(|r| (r.id, r)).collect();

    // successor -> the one task pointing at it
    let mut predecessor: HashMap<TaskId, TaskId> = HashMap::new();
    for record in records {
        let Some(before_id) = record.before_id else {
            continue;
        };
        if before_id == record.id {
            return Err(OrderError::Cycle {
                bucket,
                task: record.id,
            });
        }
        if !by_id.contains_key(&before_id) {
            return Err(OrderError::OrphanPointer {
                bucket,
                task: record.id,
                before_id,
            });
        }
        if let Some(first) = predecessor.insert(before_id, record.id) {
            let (first, second) = if first < record.id {
                (first, record.id)
            } else {
                (record.id, first)
            };
            return Err(OrderError::SharedSuccessor {
                bucket,
                successor: before_id,
                first,
                second,
            });
        }
    }

    let mut heads: Vec<TaskId> = records
        .iter()
        .map(|r| r.id)
        .filter(|id| !predecessor.contains_key(id))
        .collect();
    heads.sort_unstable();

    let head = match heads.as_slice() {
        // every task has a predecessor, so the pointers close on themselves
        [] => {
            return Err(OrderError::Cycle {
                bucket,
                task: lowest,
            });
        }
        [head] => *head,
        _ => return Err(OrderError::MultipleHeads { bucket, heads }),
    };

    let mut ordered = Vec::with_capacity(records.len());
    let mut visited = HashSet::with_capacity(records.len());
    let mut cursor = Some(head);
    while let Some(id) = cursor {
        if !visited.insert(id) {
            return Err(OrderError::Cycle { bucket, task: id });
        }
        let record = by_id[&id];
        ordered.push(record);
        cursor = record.before_id;
    }

    // One head and no shared successors: whatever the walk missed sits on a
    // separate loop.
    if ordered.len() < records.len() {
        let task = records
            .iter()
            .map(|r| r.id)
            .filter(|id| !visited.contains(id))
            .min()
            .unwrap_or(head);
        return Err(OrderError::Cycle { bucket, task });
    }

    Ok(ordered)
}

/// Returns the insert-before pointer for a task's current position: the id of
/// the task immediately after it in `bucket_id`, or `None` if it is last.
///
/// # Errors
///
/// Returns [`BoardError::UnknownBucket`] if the bucket is not on the board, or
/// [`BoardError::TaskNotInBucket`] if the bucket does not hold the task.
pub fn derive_predecessor_pointer(
    board: &Board,
    bucket_id: BucketId,
    task_id: TaskId,
) -> Result<Option<TaskId>, BoardError> {
    let bucket = board
        .bucket(bucket_id)
        .ok_or(BoardError::UnknownBucket(bucket_id))?;
    let index = bucket
        .position(task_id)
        .ok_or(BoardError::TaskNotInBucket {
            task: task_id,
            bucket: bucket_id,
        })?;
    Ok(bucket.task_ids().get(index + 1).copied())
}

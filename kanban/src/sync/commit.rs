//! Translation of a finished drag into one server write.

use kanban_proto::ids::TaskId;
use kanban_proto::task::TaskOrderUpdate;

use crate::board::{Board, BoardError, derive_predecessor_pointer};

/// How a drag gesture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEnd {
    /// Released over a valid target: commit the new position.
    Drop,
    /// Escaped or released outside any target: commit nothing.
    Cancel,
}

/// Derives the order update for a task's final resting place.
///
/// The update names the bucket the task ended up in and the task that now
/// immediately follows it (`None` when it is last). A drop that leaves the
/// task where it started still produces an update.
///
/// # Errors
///
/// Returns [`BoardError::UnknownTask`] if the task is not on the board.
pub fn derive_commit(board: &Board, task_id: TaskId) -> Result<TaskOrderUpdate, BoardError> {
    let location = board
        .locate(task_id)
        .ok_or(BoardError::UnknownTask(task_id))?;
    let before_id = derive_predecessor_pointer(board, location.bucket_id, task_id)?;
    Ok(TaskOrderUpdate {
        task_id,
        bucket_id: location.bucket_id,
        before_id,
    })
}

//! Pure drag-state reducer.
//!
//! [`reduce`] takes the current [`BoardState`] by value and returns the next
//! one. It never fails: an action naming an id that is not on the board
//! returns the state unchanged, because drag libraries emit events for cards
//! that are mid-unmount.
//!
//! The state is idle when `dragged_task` is `None` and dragging otherwise.

use kanban_proto::ids::{BucketId, TaskId};

use super::Board;

/// The task currently lifted by a drag gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraggedTask {
    /// Task being dragged.
    pub task_id: TaskId,
    /// Bucket it currently occupies.
    pub task_bucket: BucketId,
}

/// A board plus the optional drag cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardState {
    /// Current ordering, including optimistic moves.
    pub board: Board,
    /// Present only between a lift and the matching unlift.
    pub dragged_task: Option<DraggedTask>,
}

impl BoardState {
    /// Creates an idle state over the given board.
    #[must_use]
    pub const fn new(board: Board) -> Self {
        Self {
            board,
            dragged_task: None,
        }
    }

    /// Whether a drag gesture is in progress.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        self.dragged_task.is_some()
    }
}

/// What a dragged card is hovering over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragTarget {
    /// Another task card.
    Task(TaskId),
    /// A bucket column (its empty area or header).
    Bucket(BucketId),
}

/// Transitions accepted by [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardAction {
    /// Start dragging a task.
    Lift {
        /// Task picked up.
        task_id: TaskId,
    },
    /// Stop dragging. Ordering is left as it is.
    Unlift,
    /// Move a task onto another task's position.
    MoveOverTask {
        /// Task being moved.
        task_id: TaskId,
        /// Task whose position it takes.
        over_task_id: TaskId,
    },
    /// Move a task to the end of a bucket.
    MoveOverContainer {
        /// Task being moved.
        task_id: TaskId,
        /// Bucket it is appended to.
        over_container_id: BucketId,
    },
    /// Discard local state and take this board wholesale.
    Replace(Board),
}

impl BoardAction {
    /// Builds the move action for a task hovering over `target`.
    #[must_use]
    pub const fn move_over(task_id: TaskId, target: DragTarget) -> Self {
        match target {
            DragTarget::Task(over_task_id) => Self::MoveOverTask {
                task_id,
                over_task_id,
            },
            DragTarget::Bucket(over_container_id) => Self::MoveOverContainer {
                task_id,
                over_container_id,
            },
        }
    }
}

/// Applies one action to the state.
#[must_use]
pub fn reduce(state: BoardState, action: BoardAction) -> BoardState {
    match action {
        BoardAction::Lift { task_id } => lift(state, task_id),
        BoardAction::Unlift => BoardState {
            dragged_task: None,
            ..state
        },
        BoardAction::MoveOverTask {
            task_id,
            over_task_id,
        } => move_over_task(state, task_id, over_task_id),
        BoardAction::MoveOverContainer {
            task_id,
            over_container_id,
        } => move_over_container(state, task_id, over_container_id),
        BoardAction::Replace(board) => BoardState::new(board),
    }
}

fn lift(state: BoardState, task_id: TaskId) -> BoardState {
    let Some(location) = state.board.locate(task_id) else {
        return state;
    };
    BoardState {
        dragged_task: Some(DraggedTask {
            task_id,
            task_bucket: location.bucket_id,
        }),
        ..state
    }
}

fn move_over_task(mut state: BoardState, task_id: TaskId, over_task_id: TaskId) -> BoardState {
    if task_id == over_task_id {
        return state;
    }
    let Some(from) = state.board.locate(task_id) else {
        return state;
    };
    let Some(to) = state.board.locate(over_task_id) else {
        return state;
    };

    // Remove first, then insert at the target's index as it was before the
    // removal. Same-bucket moves go through both steps too.
    if state.board.remove_at(from.bucket_index, from.index).is_none() {
        return state;
    }
    state.board.insert_at(to.bucket_index, to.index, task_id);
    follow_cursor(&mut state, task_id, to.bucket_id);
    state
}

fn move_over_container(
    mut state: BoardState,
    task_id: TaskId,
    over_container_id: BucketId,
) -> BoardState {
    let Some(from) = state.board.locate(task_id) else {
        return state;
    };
    let Some(target_index) = state.board.bucket_index(over_container_id) else {
        return state;
    };

    if state.board.remove_at(from.bucket_index, from.index).is_none() {
        return state;
    }
    state.board.insert_at(target_index, usize::MAX, task_id);
    follow_cursor(&mut state, task_id, over_container_id);
    state
}

/// Keeps the drag cursor's bucket in step with the dragged task.
fn follow_cursor(state: &mut BoardState, task_id: TaskId, bucket: BucketId) {
    if let Some(dragged) = state.dragged_task.as_mut() {
        if dragged.task_id == task_id {
            dragged.task_bucket = bucket;
        }
    }
}

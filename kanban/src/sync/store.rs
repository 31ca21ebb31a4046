//! The board store: state, dispatch, and the gated refresh path.

use kanban_proto::bucket::BucketWithTasks;
use kanban_proto::ids::{BucketId, TaskId};
use kanban_proto::task::TaskOrderUpdate;

use super::commit::{DragEnd, derive_commit};
use super::reconciler::{FetchTicket, Reconciliation, SyncReconciler};
use crate::board::{Board, BoardAction, BoardState, DragTarget, OrderError, materialize, reduce};

/// Drag-gesture actions that rendering code may dispatch.
///
/// `replace` is deliberately absent: only the store's refresh path issues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    /// Pick up a task.
    Lift(TaskId),
    /// Put the task down without committing.
    Unlift,
    /// Hover the task over another task.
    MoveOverTask(TaskId, TaskId),
    /// Hover the task over a bucket.
    MoveOverContainer(TaskId, BucketId),
    /// Hover the task over a tagged drop target.
    MoveOver(TaskId, DragTarget),
}

impl From<Gesture> for BoardAction {
    fn from(gesture: Gesture) -> Self {
        match gesture {
            Gesture::Lift(task_id) => Self::Lift { task_id },
            Gesture::Unlift => Self::Unlift,
            Gesture::MoveOverTask(task_id, over_task_id) => Self::MoveOverTask {
                task_id,
                over_task_id,
            },
            Gesture::MoveOverContainer(task_id, over_container_id) => Self::MoveOverContainer {
                task_id,
                over_container_id,
            },
            Gesture::MoveOver(task_id, target) => Self::move_over(task_id, target),
        }
    }
}

/// Owns one board's state and decides when server snapshots replace it.
#[derive(Debug, Default)]
pub struct BoardStore {
    state: BoardState,
    reconciler: SyncReconciler,
    corruption: Option<OrderError>,
}

impl BoardStore {
    /// Creates a store over an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with a board.
    #[must_use]
    pub fn with_board(board: Board) -> Self {
        Self {
            state: BoardState::new(board),
            ..Self::default()
        }
    }

    /// Current state, including optimistic moves and the drag cursor.
    #[must_use]
    pub const fn state(&self) -> &BoardState {
        &self.state
    }

    /// Current board.
    #[must_use]
    pub const fn board(&self) -> &Board {
        &self.state.board
    }

    /// The order-data error from the most recent admitted snapshot, if it
    /// could not be materialized. Cleared by the next applied snapshot.
    #[must_use]
    pub const fn corruption(&self) -> Option<&OrderError> {
        self.corruption.as_ref()
    }

    /// Whether any fetch is still in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.reconciler.is_fetching()
    }

    /// Applies a drag gesture. Returns whether the state changed.
    ///
    /// A lift that starts a drag marks every pending fetch stale. A lift
    /// naming an unknown task changes nothing and leaves pending fetches alone.
    pub fn dispatch(&mut self, gesture: Gesture) -> bool {
        let previous = self.state.clone();
        self.state = reduce(std::mem::take(&mut self.state), gesture.into());
        if !previous.is_dragging() && self.state.is_dragging() {
            self.reconciler.note_local_edit();
        }
        let changed = self.state != previous;
        if !changed {
            tracing::trace!(?gesture, "gesture left board unchanged");
        }
        changed
    }

    /// Ends the current drag.
    ///
    /// On [`DragEnd::Drop`] returns the single order update to send and
    /// counts it as in flight until [`commit_settled`](Self::commit_settled);
    /// snapshots settling in the meantime are stale. On
    /// [`DragEnd::Cancel`] returns `None`; the optimistic moves stay on screen
    /// until the next applied snapshot restores the server order. Returns
    /// `None` if no drag is in progress.
    pub fn end_drag(&mut self, end: DragEnd) -> Option<TaskOrderUpdate> {
        let dragged = self.state.dragged_task?;
        self.state = reduce(std::mem::take(&mut self.state), BoardAction::Unlift);

        match end {
            DragEnd::Cancel => {
                tracing::debug!(task_id = %dragged.task_id, "drag cancelled");
                None
            }
            DragEnd::Drop => {
                match derive_commit(&self.state.board, dragged.task_id) {
                    Ok(update) => {
                        self.reconciler.begin_commit();
                        tracing::debug!(
                            task_id = %update.task_id,
                            bucket_id = %update.bucket_id,
                            before_id = ?update.before_id,
                            "drag dropped"
                        );
                        Some(update)
                    }
                    Err(e) => {
                        self.reconciler.note_local_edit();
                        tracing::warn!(task_id = %dragged.task_id, error = %e, "dropped task vanished");
                        None
                    }
                }
            }
        }
    }

    /// Records that a commit request finished, successfully or not.
    ///
    /// Fetches issued while the commit was in flight may have been answered
    /// before the server applied it, so they are demoted to stale. The caller
    /// issues a fresh fetch afterwards.
    pub fn commit_settled(&mut self) {
        self.reconciler.commit_settled();
    }

    /// Whether a dropped task's commit has not settled yet.
    #[must_use]
    pub const fn is_committing(&self) -> bool {
        self.reconciler.is_committing()
    }

    /// Registers a fetch about to be issued.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.reconciler.begin_fetch()
    }

    /// Settles a fetch that failed before producing data.
    pub fn fetch_failed(&mut self, ticket: FetchTicket) -> Reconciliation {
        self.reconciler.fetch_failed(ticket)
    }

    /// Settles a fetch with the server's payload.
    ///
    /// # Errors
    ///
    /// Returns the [`OrderError`] if an admitted snapshot's order data is
    /// corrupt. The local board is kept and [`corruption`](Self::corruption)
    /// reports the error until a later snapshot applies cleanly.
    pub fn fetch_settled(
        &mut self,
        ticket: FetchTicket,
        payload: &[BucketWithTasks],
    ) -> Result<Reconciliation, OrderError> {
        if let Err(rejected) = self.reconciler.admit(ticket) {
            tracing::debug!(%ticket, outcome = %rejected, "snapshot discarded");
            return Ok(rejected);
        }

        let mut incoming = match materialize(payload) {
            Ok(board) => board,
            Err(e) => {
                tracing::error!(%ticket, error = %e, "server order data is corrupt");
                self.corruption = Some(e.clone());
                return Err(e);
            }
        };
        self.corruption = None;

        let outcome = SyncReconciler::should_replace(&self.state, &incoming);
        if outcome.is_applied() {
            incoming.adopt_render_keys(&self.state.board);
            self.state = reduce(
                std::mem::take(&mut self.state),
                BoardAction::Replace(incoming),
            );
        }
        tracing::debug!(%ticket, %outcome, "snapshot settled");
        Ok(outcome)
    }
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for drag gestures racing server snapshots.
//!
//! Drives a `BoardStore` the way a UI does (lift, hover, drop) while fetches
//! are issued and settled in adversarial orders. Validates that:
//! - a snapshot requested before a drag never overwrites the dropped order
//! - a snapshot answered while the commit is in flight is stale
//! - lifting an unknown task does not discard pending snapshots
//! - superseded fetches are ignored whichever order they resolve in
//! - snapshots are held back while dragging
//! - a cancelled drag is restored by the next fetch
//! - every drop yields exactly one order update with the right pointer

use kanban::board::{Board, DragTarget, Task};
use kanban::sync::{BoardStore, DragEnd, Gesture, Reconciliation};
use kanban_proto::bucket::BucketWithTasks;
use kanban_proto::ids::{BucketId, TaskId};
use kanban_proto::task::TaskOrderUpdate;

fn t(id: i64) -> TaskId {
    TaskId::new(id)
}

fn b(id: i64) -> BucketId {
    BucketId::new(id)
}

fn board(columns: &[(i64, &str, &[i64])]) -> Board {
    Board::from_buckets(columns.iter().map(|(id, name, tasks)| {
        let tasks = tasks
            .iter()
            .map(|t| Task::new(TaskId::new(*t), format!("task {t}")))
            .collect();
        (BucketId::new(*id), *name, tasks)
    }))
    .unwrap()
}

/// `Backlog=[1,2,3]`, `Doing=[4,5,6]`, `Done=[]`.
fn server_board() -> Board {
    board(&[
        (1, "Backlog", &[1, 2, 3]),
        (2, "Doing", &[4, 5, 6]),
        (3, "Done", &[]),
    ])
}

fn snapshot(board: &Board) -> Vec<BucketWithTasks> {
    board.to_wire()
}

fn ids(store: &BoardStore, bucket: i64) -> Vec<i64> {
    store
        .board()
        .bucket(b(bucket))
        .unwrap()
        .task_ids()
        .iter()
        .map(|id| id.get())
        .collect()
}

fn drag(store: &mut BoardStore, task: i64, target: DragTarget) -> Option<TaskOrderUpdate> {
    assert!(store.dispatch(Gesture::Lift(t(task))));
    store.dispatch(Gesture::MoveOver(t(task), target));
    store.end_drag(DragEnd::Drop)
}

#[test]
fn pre_drag_snapshot_does_not_revert_drop() {
    let mut store = BoardStore::with_board(server_board());

    let early = store.begin_fetch();
    let update = drag(&mut store, 2, DragTarget::Bucket(b(3))).unwrap();
    assert_eq!(
        update,
        TaskOrderUpdate {
            task_id: t(2),
            bucket_id: b(3),
            before_id: None,
        }
    );

    // the fetch issued before the lift resolves with the pre-drag order
    let outcome = store
        .fetch_settled(early, &snapshot(&server_board()))
        .unwrap();
    assert_eq!(outcome, Reconciliation::Stale);
    assert_eq!(ids(&store, 1), [1, 3]);
    assert_eq!(ids(&store, 3), [2]);
}

#[test]
fn snapshot_answered_before_commit_settles_is_stale() {
    let mut store = BoardStore::with_board(server_board());
    drag(&mut store, 2, DragTarget::Bucket(b(3))).unwrap();

    // issued after the drop, answered before the server applied the move
    let racing = store.begin_fetch();
    let outcome = store
        .fetch_settled(racing, &snapshot(&server_board()))
        .unwrap();
    assert_eq!(outcome, Reconciliation::Stale);
    assert_eq!(ids(&store, 1), [1, 3]);
    assert_eq!(ids(&store, 3), [2]);

    store.commit_settled();
    let after = board(&[
        (1, "Backlog", &[1, 3]),
        (2, "Doing", &[4, 5, 6]),
        (3, "Done", &[2]),
    ]);
    let ticket = store.begin_fetch();
    let outcome = store.fetch_settled(ticket, &snapshot(&after)).unwrap();
    assert_eq!(outcome, Reconciliation::Unchanged);
}

#[test]
fn lift_of_unknown_task_keeps_first_fetch() {
    let mut store = BoardStore::new();
    let first = store.begin_fetch();
    assert!(!store.dispatch(Gesture::Lift(t(99))));
    let outcome = store
        .fetch_settled(first, &snapshot(&server_board()))
        .unwrap();
    assert_eq!(outcome, Reconciliation::Applied);
    assert_eq!(ids(&store, 2), [4, 5, 6]);
}

#[test]
fn post_commit_snapshot_applies() {
    let mut store = BoardStore::with_board(server_board());
    drag(&mut store, 2, DragTarget::Bucket(b(3))).unwrap();
    store.commit_settled();

    let after = board(&[
        (1, "Backlog", &[1, 3]),
        (2, "Doing", &[4, 5, 6]),
        (3, "Done", &[2]),
    ]);
    let ticket = store.begin_fetch();
    let outcome = store.fetch_settled(ticket, &snapshot(&after)).unwrap();
    assert_eq!(outcome, Reconciliation::Unchanged);
    assert_eq!(ids(&store, 3), [2]);
}

#[test]
fn superseded_fetch_is_ignored_in_either_order() {
    let old = server_board();
    let new = board(&[
        (1, "Backlog", &[3, 1, 2]),
        (2, "Doing", &[4, 5, 6]),
        (3, "Done", &[]),
    ]);

    // newer resolves first, older arrives late
    let mut store = BoardStore::with_board(old.clone());
    let first = store.begin_fetch();
    let second = store.begin_fetch();
    assert_eq!(
        store.fetch_settled(second, &snapshot(&new)).unwrap(),
        Reconciliation::Applied
    );
    assert!(store.is_fetching());
    assert_eq!(
        store.fetch_settled(first, &snapshot(&old)).unwrap(),
        Reconciliation::Superseded
    );
    assert!(!store.is_fetching());
    assert_eq!(ids(&store, 1), [3, 1, 2]);

    // older resolves first
    let mut store = BoardStore::with_board(old.clone());
    let first = store.begin_fetch();
    let second = store.begin_fetch();
    assert_eq!(
        store.fetch_settled(first, &snapshot(&old)).unwrap(),
        Reconciliation::Superseded
    );
    assert_eq!(
        store.fetch_settled(second, &snapshot(&new)).unwrap(),
        Reconciliation::Applied
    );
    assert_eq!(ids(&store, 1), [3, 1, 2]);
}

#[test]
fn snapshot_is_held_back_while_dragging() {
    let mut store = BoardStore::with_board(server_board());
    store.dispatch(Gesture::Lift(t(4)));
    let ticket = store.begin_fetch();
    store.dispatch(Gesture::MoveOver(t(4), DragTarget::Task(t(1))));

    let moved = board(&[
        (1, "Backlog", &[1, 2]),
        (2, "Doing", &[4, 5, 6]),
        (3, "Done", &[3]),
    ]);
    let outcome = store.fetch_settled(ticket, &snapshot(&moved)).unwrap();
    assert_eq!(outcome, Reconciliation::Dragging);
    assert_eq!(ids(&store, 1), [4, 1, 2, 3]);
    assert!(store.state().is_dragging());
}

#[test]
fn cancelled_drag_is_restored_by_next_fetch() {
    let mut store = BoardStore::with_board(server_board());
    store.dispatch(Gesture::Lift(t(6)));
    store.dispatch(Gesture::MoveOver(t(6), DragTarget::Task(t(1))));
    assert_eq!(store.end_drag(DragEnd::Cancel), None);
    assert_eq!(ids(&store, 1), [6, 1, 2, 3]);

    let ticket = store.begin_fetch();
    let outcome = store
        .fetch_settled(ticket, &snapshot(&server_board()))
        .unwrap();
    assert_eq!(outcome, Reconciliation::Applied);
    assert_eq!(ids(&store, 1), [1, 2, 3]);
    assert_eq!(ids(&store, 2), [4, 5, 6]);
}

#[test]
fn drop_pointer_names_the_new_successor() {
    let mut store = BoardStore::with_board(server_board());

    let update = drag(&mut store, 1, DragTarget::Task(t(5))).unwrap();
    assert_eq!(ids(&store, 2), [4, 1, 5, 6]);
    assert_eq!(update.bucket_id, b(2));
    assert_eq!(update.before_id, Some(t(5)));

    let update = drag(&mut store, 3, DragTarget::Task(t(2))).unwrap();
    assert_eq!(ids(&store, 1), [3, 2]);
    assert_eq!(update.before_id, Some(t(2)));

    let update = drag(&mut store, 4, DragTarget::Task(t(6))).unwrap();
    assert_eq!(ids(&store, 2), [1, 5, 6, 4]);
    assert_eq!(update.before_id, None);
}

#[test]
fn hovering_many_targets_still_commits_once() {
    let mut store = BoardStore::with_board(server_board());
    store.dispatch(Gesture::Lift(t(1)));
    for target in [
        DragTarget::Task(t(4)),
        DragTarget::Task(t(6)),
        DragTarget::Bucket(b(3)),
        DragTarget::Task(t(3)),
    ] {
        store.dispatch(Gesture::MoveOver(t(1), target));
    }
    let update = store.end_drag(DragEnd::Drop).unwrap();
    assert_eq!(update.bucket_id, b(1));
    assert_eq!(ids(&store, 1), [2, 1, 3]);
    assert_eq!(update.before_id, Some(t(3)));
    assert_eq!(store.end_drag(DragEnd::Drop), None);
}

#[test]
fn failed_fetch_settles_without_touching_board() {
    let mut store = BoardStore::with_board(server_board());
    let ticket = store.begin_fetch();
    assert_eq!(store.fetch_failed(ticket), Reconciliation::Failed);
    assert!(!store.is_fetching());
    assert_eq!(ids(&store, 1), [1, 2, 3]);
}

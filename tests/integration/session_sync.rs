#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! Integration tests for the async board session.
//!
//! Most tests run the session against `FakeApi`, an in-process wrapper around
//! the reference server's `BoardDb` that can hold fetches open and fail
//! commits on demand. The last test runs it over real HTTP.
//!
//! These tests validate:
//! - the first fetch seeds the board
//! - a drop produces exactly one `PUT /tasks/{id}` and a follow-up refetch
//! - a failed commit is reported and corrected by the refetch
//! - a fetch held open across a drag never reverts the dropped order
//! - a snapshot answered while a commit is in flight never reverts it
//! - ending a drag with a plain unlift refetches like a cancel
//! - a request task that panics is settled as a failure
//! - bucket and task mutations are followed by a refetch

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use kanban::api::{ApiError, BoardApi, HttpBoardApi};
use kanban::board::{BoardState, DragTarget};
use kanban::session::{SessionCommand, SessionConfig, SessionEvent, spawn_session};
use kanban::sync::Gesture;
use kanban_proto::bucket::{BucketRecord, BucketWithTasks, CreateBucket, RenameBucket};
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, TaskOrderUpdate, TaskRecord};
use kanban_server::store::{BoardDb, StoreError};
use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};

const PROJECT: ProjectId = ProjectId::new(1);
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

// --- Fake API ---

#[derive(Clone)]
struct FakeApi {
    db: Arc<BoardDb>,
    moves: Arc<Mutex<Vec<TaskOrderUpdate>>>,
    fetches: Arc<AtomicUsize>,
    fail_moves: Arc<AtomicBool>,
    /// Panic inside the next fetch or commit.
    panic_fetch: Arc<AtomicBool>,
    panic_move: Arc<AtomicBool>,
    /// While set, commits wait for a `commit_release` permit before writing.
    hold_moves: Arc<AtomicBool>,
    commit_release: Arc<Semaphore>,
    /// Number of upcoming fetches to hold open.
    holds: Arc<Mutex<usize>>,
    /// A permit is added each time a held fetch has read its snapshot.
    captured: Arc<Semaphore>,
    /// A permit releases one held fetch.
    release: Arc<Semaphore>,
}

impl FakeApi {
    fn new() -> Self {
        Self {
            db: Arc::new(BoardDb::new()),
            moves: Arc::new(Mutex::new(Vec::new())),
            fetches: Arc::new(AtomicUsize::new(0)),
            fail_moves: Arc::new(AtomicBool::new(false)),
            panic_fetch: Arc::new(AtomicBool::new(false)),
            panic_move: Arc::new(AtomicBool::new(false)),
            hold_moves: Arc::new(AtomicBool::new(false)),
            commit_release: Arc::new(Semaphore::new(0)),
            holds: Arc::new(Mutex::new(0)),
            captured: Arc::new(Semaphore::new(0)),
            release: Arc::new(Semaphore::new(0)),
        }
    }

    fn hold_next_fetch(&self) {
        *self.holds.lock() += 1;
    }

    fn moves(&self) -> Vec<TaskOrderUpdate> {
        self.moves.lock().clone()
    }
}

fn status(err: &StoreError) -> ApiError {
    let status = match err {
        StoreError::BucketNotFound(_) | StoreError::TaskNotFound(_) => 404,
        _ => 400,
    };
    ApiError::Status {
        status,
        message: err.to_string(),
    }
}

impl BoardApi for FakeApi {
    async fn fetch_board(&self, project_id: ProjectId) -> Result<Vec<BucketWithTasks>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        assert!(
            !self.panic_fetch.swap(false, Ordering::SeqCst),
            "fetch task crashed"
        );
        let snapshot = self.db.board(project_id);
        let held = {
            let mut holds = self.holds.lock();
            let held = *holds > 0;
            if held {
                *holds -= 1;
            }
            held
        };
        if held {
            self.captured.add_permits(1);
            self.release.acquire().await.unwrap().forget();
        }
        Ok(snapshot)
    }

    async fn create_bucket(&self, request: &CreateBucket) -> Result<BucketRecord, ApiError> {
        self.db.create_bucket(request).map_err(|e| status(&e))
    }

    async fn rename_bucket(
        &self,
        bucket_id: BucketId,
        request: &RenameBucket,
    ) -> Result<BucketRecord, ApiError> {
        self.db
            .rename_bucket(bucket_id, request)
            .map_err(|e| status(&e))
    }

    async fn delete_bucket(&self, bucket_id: BucketId) -> Result<(), ApiError> {
        self.db.delete_bucket(bucket_id).map_err(|e| status(&e))
    }

    async fn create_task(&self, request: &CreateTask) -> Result<TaskRecord, ApiError> {
        self.db.create_task(request).map_err(|e| status(&e))
    }

    async fn move_task(&self, update: &TaskOrderUpdate) -> Result<TaskRecord, ApiError> {
        self.moves.lock().push(*update);
        assert!(
            !self.panic_move.swap(false, Ordering::SeqCst),
            "commit task crashed"
        );
        if self.hold_moves.load(Ordering::SeqCst) {
            self.commit_release.acquire().await.unwrap().forget();
        }
        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                message: "database unavailable".to_string(),
            });
        }
        self.db
            .move_task(update.task_id, update.body())
            .map_err(|e| status(&e))
    }

    async fn delete_task(&self, task_id: TaskId) -> Result<(), ApiError> {
        self.db.delete_task(task_id).map_err(|e| status(&e))
    }
}

// --- Helpers ---

/// Seeds `Backlog=[1,2,3]`, `Doing=[4,5,6]`, `Done=[]` (bucket ids 1, 2, 3).
fn seeded_api() -> FakeApi {
    let api = FakeApi::new();
    for (name, tasks) in [("Backlog", 3), ("Doing", 3), ("Done", 0)] {
        let bucket = api
            .db
            .create_bucket(&CreateBucket {
                project_id: PROJECT,
                name: name.to_string(),
            })
            .unwrap();
        for i in 0..tasks {
            api.db
                .create_task(&CreateTask::named(bucket.id, format!("{name} {i}")))
                .unwrap();
        }
    }
    api
}

fn ids(state: &BoardState, bucket: i64) -> Vec<i64> {
    state
        .board
        .bucket(BucketId::new(bucket))
        .map(|b| b.task_ids().iter().map(|id| id.get()).collect())
        .unwrap_or_default()
}

async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("session closed")
}

/// Waits for a `BoardChanged` event whose state satisfies `pred`.
async fn board_where(
    rx: &mut mpsc::Receiver<SessionEvent>,
    pred: impl Fn(&BoardState) -> bool,
) -> BoardState {
    loop {
        if let SessionEvent::BoardChanged(state) = next_event(rx).await {
            if pred(&state) {
                return state;
            }
        }
    }
}

async fn send(tx: &mpsc::Sender<SessionCommand>, cmd: SessionCommand) {
    tx.send(cmd).await.expect("session closed");
}

async fn drag_and_drop(tx: &mpsc::Sender<SessionCommand>, task: i64, target: DragTarget) {
    let task = TaskId::new(task);
    send(tx, SessionCommand::Gesture(Gesture::Lift(task))).await;
    send(tx, SessionCommand::Gesture(Gesture::MoveOver(task, target))).await;
    send(tx, SessionCommand::Drop).await;
}

// --- Tests ---

#[tokio::test]
async fn first_fetch_seeds_board() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api, SessionConfig::new(PROJECT));

    let state = board_where(&mut rx, |s| s.board.bucket_count() == 3).await;
    assert_eq!(ids(&state, 1), [1, 2, 3]);
    assert_eq!(ids(&state, 2), [4, 5, 6]);
    assert!(ids(&state, 3).is_empty());

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn drop_commits_once_and_refetches() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;
    let fetches_before = api.fetches.load(Ordering::SeqCst);

    drag_and_drop(&tx, 1, DragTarget::Task(TaskId::new(5))).await;
    let dropped = board_where(&mut rx, |s| !s.is_dragging() && ids(s, 2) == [4, 1, 5, 6]).await;
    assert_eq!(ids(&dropped, 1), [2, 3]);

    let update = loop {
        if let SessionEvent::CommitSent(update) = next_event(&mut rx).await {
            break update;
        }
    };
    assert_eq!(
        update,
        TaskOrderUpdate {
            task_id: TaskId::new(1),
            bucket_id: BucketId::new(2),
            before_id: Some(TaskId::new(5)),
        }
    );
    assert_eq!(api.moves(), [update]);

    // server agrees with the optimistic order
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while api.fetches.load(Ordering::SeqCst) == fetches_before {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("no refetch after commit");
    let server = api.db.board(PROJECT);
    let doing = server.iter().find(|b| b.id == BucketId::new(2)).unwrap();
    assert_eq!(doing.tasks.len(), 4);

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn failed_commit_is_reported_and_corrected() {
    let api = seeded_api();
    api.fail_moves.store(true, Ordering::SeqCst);
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    drag_and_drop(&tx, 2, DragTarget::Bucket(BucketId::new(3))).await;
    board_where(&mut rx, |s| !s.is_dragging() && ids(s, 3) == [2]).await;

    let failed = loop {
        if let SessionEvent::CommitFailed { update, error } = next_event(&mut rx).await {
            break (update, error);
        }
    };
    assert_eq!(failed.0.task_id, TaskId::new(2));
    assert!(failed.1.contains("database unavailable"));

    // the refetch after the failed commit restores the server order
    let restored = board_where(&mut rx, |s| ids(s, 1) == [1, 2, 3]).await;
    assert!(ids(&restored, 3).is_empty());
    assert_eq!(api.moves().len(), 1);

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn fetch_held_across_drag_does_not_revert_drop() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    // a refresh reads the pre-drag board, then stalls
    api.hold_next_fetch();
    send(&tx, SessionCommand::Refresh).await;
    api.captured.acquire().await.unwrap().forget();

    drag_and_drop(&tx, 2, DragTarget::Bucket(BucketId::new(3))).await;
    board_where(&mut rx, |s| !s.is_dragging() && ids(s, 3) == [2]).await;
    loop {
        if let SessionEvent::CommitSent(_) = next_event(&mut rx).await {
            break;
        }
    }

    // the stalled pre-drag snapshot finally resolves
    api.release.add_permits(1);

    let reverted = tokio::time::timeout(
        Duration::from_millis(300),
        board_where(&mut rx, |s| ids(s, 1) == [1, 2, 3]),
    )
    .await;
    assert!(reverted.is_err(), "pre-drag snapshot reverted the drop");

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn snapshot_answered_during_commit_does_not_revert_drop() {
    let api = seeded_api();
    api.hold_moves.store(true, Ordering::SeqCst);
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    drag_and_drop(&tx, 2, DragTarget::Bucket(BucketId::new(3))).await;
    board_where(&mut rx, |s| !s.is_dragging() && ids(s, 3) == [2]).await;
    tokio::time::timeout(EVENT_TIMEOUT, async {
        while api.moves().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("commit never sent");

    // the server has not applied the move yet, so this snapshot is pre-drop
    let fetches_before = api.fetches.load(Ordering::SeqCst);
    send(&tx, SessionCommand::Refresh).await;
    let reverted = tokio::time::timeout(
        Duration::from_millis(300),
        board_where(&mut rx, |s| ids(s, 1) == [1, 2, 3]),
    )
    .await;
    assert!(reverted.is_err(), "snapshot taken mid-commit reverted the drop");
    assert!(api.fetches.load(Ordering::SeqCst) > fetches_before);

    api.commit_release.add_permits(1);
    loop {
        if let SessionEvent::CommitSent(update) = next_event(&mut rx).await {
            assert_eq!(update.task_id, TaskId::new(2));
            break;
        }
    }
    let server = api.db.board(PROJECT);
    let done = server.iter().find(|b| b.id == BucketId::new(3)).unwrap();
    assert_eq!(done.tasks.len(), 1);

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn unlift_refetches_like_cancel() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    // a refresh reads the renamed board, then stalls until after the lift
    api.db
        .rename_bucket(
            BucketId::new(1),
            &RenameBucket {
                name: "Inbox".to_string(),
            },
        )
        .unwrap();
    api.hold_next_fetch();
    send(&tx, SessionCommand::Refresh).await;
    api.captured.acquire().await.unwrap().forget();

    send(&tx, SessionCommand::Gesture(Gesture::Lift(TaskId::new(3)))).await;
    board_where(&mut rx, BoardState::is_dragging).await;
    send(&tx, SessionCommand::Gesture(Gesture::Unlift)).await;
    api.release.add_permits(1);

    let state = board_where(&mut rx, |s| {
        !s.is_dragging() && s.board.bucket(BucketId::new(1)).is_some_and(|b| b.name == "Inbox")
    })
    .await;
    assert_eq!(ids(&state, 1), [1, 2, 3]);
    assert!(api.moves().is_empty());

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn crashed_commit_task_is_reported_and_corrected() {
    let api = seeded_api();
    api.panic_move.store(true, Ordering::SeqCst);
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    drag_and_drop(&tx, 2, DragTarget::Bucket(BucketId::new(3))).await;
    board_where(&mut rx, |s| !s.is_dragging() && ids(s, 3) == [2]).await;

    let (update, error) = loop {
        if let SessionEvent::CommitFailed { update, error } = next_event(&mut rx).await {
            break (update, error);
        }
    };
    assert_eq!(update.task_id, TaskId::new(2));
    assert!(error.contains("interrupted"), "unexpected error: {error}");

    // the commit still counts as settled, so the refetch applies
    let restored = board_where(&mut rx, |s| ids(s, 1) == [1, 2, 3]).await;
    assert!(ids(&restored, 3).is_empty());

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn crashed_fetch_task_is_reported() {
    let api = seeded_api();
    api.panic_fetch.store(true, Ordering::SeqCst);
    let (tx, mut rx) = spawn_session(api, SessionConfig::new(PROJECT));

    let error = loop {
        if let SessionEvent::FetchFailed(error) = next_event(&mut rx).await {
            break error;
        }
    };
    assert!(error.contains("interrupted"), "unexpected error: {error}");

    send(&tx, SessionCommand::Refresh).await;
    let state = board_where(&mut rx, |s| s.board.bucket_count() == 3).await;
    assert_eq!(ids(&state, 2), [4, 5, 6]);

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn snapshot_during_drag_is_not_applied() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api.clone(), SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    send(
        &tx,
        SessionCommand::Gesture(Gesture::Lift(TaskId::new(6))),
    )
    .await;
    send(
        &tx,
        SessionCommand::Gesture(Gesture::MoveOver(
            TaskId::new(6),
            DragTarget::Task(TaskId::new(1)),
        )),
    )
    .await;
    board_where(&mut rx, |s| s.is_dragging() && ids(s, 1) == [6, 1, 2, 3]).await;

    // someone else renames a bucket while the drag is in flight
    api.db
        .rename_bucket(
            BucketId::new(1),
            &RenameBucket {
                name: "Inbox".to_string(),
            },
        )
        .unwrap();
    send(&tx, SessionCommand::Refresh).await;

    let unchanged = tokio::time::timeout(
        Duration::from_millis(300),
        board_where(&mut rx, |s| {
            s.board.bucket(BucketId::new(1)).is_some_and(|b| b.name == "Inbox")
        }),
    )
    .await;
    assert!(unchanged.is_err(), "snapshot replaced board mid-drag");

    // cancelling triggers a refetch, which now applies
    send(&tx, SessionCommand::Cancel).await;
    let state = board_where(&mut rx, |s| {
        s.board.bucket(BucketId::new(1)).is_some_and(|b| b.name == "Inbox")
    })
    .await;
    assert_eq!(ids(&state, 1), [1, 2, 3]);
    assert_eq!(ids(&state, 2), [4, 5, 6]);
    assert!(api.moves().is_empty());

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn failed_mutation_is_reported() {
    let api = seeded_api();
    let (tx, mut rx) = spawn_session(api, SessionConfig::new(PROJECT));
    board_where(&mut rx, |s| s.board.bucket_count() == 3).await;

    send(
        &tx,
        SessionCommand::DeleteTask {
            task_id: TaskId::new(99),
        },
    )
    .await;
    let (operation, error) = loop {
        if let SessionEvent::RequestFailed { operation, error } = next_event(&mut rx).await {
            break (operation, error);
        }
    };
    assert_eq!(operation, "delete task");
    assert!(error.contains("404"));

    send(&tx, SessionCommand::Shutdown).await;
}

#[tokio::test]
async fn session_over_http_applies_mutations() {
    let (addr, _server) = kanban_server::routes::start_server("127.0.0.1:0")
        .await
        .unwrap();
    let api = HttpBoardApi::new(&format!("http://{addr}")).unwrap();
    let (tx, mut rx) = spawn_session(api, SessionConfig::new(PROJECT));

    send(
        &tx,
        SessionCommand::CreateBucket {
            name: "Backlog".to_string(),
        },
    )
    .await;
    let state = board_where(&mut rx, |s| s.board.bucket_count() == 1).await;
    let bucket = state.board.buckets().next().unwrap().id;

    let mut state = state;
    for (count, name) in [(1, "first"), (2, "second")] {
        send(
            &tx,
            SessionCommand::CreateTask(CreateTask::named(bucket, name)),
        )
        .await;
        state = board_where(&mut rx, |s| s.board.task_count() == count).await;
    }
    let order: Vec<&str> = state
        .board
        .tasks_in(bucket)
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(order, ["first", "second"]);

    let second = state.board.bucket(bucket).unwrap().task_ids()[1];
    let first = state.board.bucket(bucket).unwrap().task_ids()[0];
    drag_and_drop(&tx, second.get(), DragTarget::Task(first)).await;
    loop {
        if let SessionEvent::CommitSent(update) = next_event(&mut rx).await {
            assert_eq!(update.before_id, Some(first));
            break;
        }
    }

    send(
        &tx,
        SessionCommand::RenameBucket {
            bucket_id: bucket,
            name: "Later".to_string(),
        },
    )
    .await;
    let state = board_where(&mut rx, |s| {
        s.board.bucket(bucket).is_some_and(|b| b.name == "Later")
    })
    .await;
    assert_eq!(state.board.bucket(bucket).unwrap().task_ids(), [second, first]);

    send(&tx, SessionCommand::Shutdown).await;
}

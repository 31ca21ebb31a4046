//! Async driver that wires a [`BoardStore`] to a [`BoardApi`].
//!
//! The session runs as one tokio task. Commands from the UI and completions of
//! in-flight requests are handled one at a time by a single `select!` loop,
//! so reducer transitions never overlap. Fetches and commits run as spawned
//! futures whose results come back through a [`JoinSet`].
//!
//! # Architecture
//!
//! ```text
//! UI  ─── SessionCommand →  run loop  ── spawn ──→ BoardApi requests
//!     ←── SessionEvent ───  (BoardStore) ←─ JoinSet ──┘
//! ```
//!
//! Every commit, every cancelled drag and every successful bucket/task
//! mutation is followed by a refetch; that refetch is the only correction
//! mechanism when a commit fails. A request whose task dies is settled as a
//! failure of the same kind.

use std::collections::HashMap;
use std::time::Duration;

use kanban_proto::bucket::{BucketWithTasks, CreateBucket, RenameBucket};
use kanban_proto::ids::{BucketId, ProjectId, TaskId};
use kanban_proto::task::{CreateTask, TaskOrderUpdate};
use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};

use crate::api::{ApiError, BoardApi};
use crate::board::BoardState;
use crate::sync::{BoardStore, DragEnd, FetchTicket, Gesture, Reconciliation};

/// Default channel capacity for commands and events.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Commands sent from the UI to the session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Apply a drag gesture.
    Gesture(Gesture),
    /// End the current drag over a valid target and commit it.
    Drop,
    /// End the current drag without committing.
    Cancel,
    /// Fetch the board now.
    Refresh,
    /// Append a bucket to the board.
    CreateBucket {
        /// Display name.
        name: String,
    },
    /// Rename a bucket.
    RenameBucket {
        /// Bucket to rename.
        bucket_id: BucketId,
        /// New display name.
        name: String,
    },
    /// Delete a bucket and its tasks.
    DeleteBucket {
        /// Bucket to delete.
        bucket_id: BucketId,
    },
    /// Create a task at the end of a bucket.
    CreateTask(CreateTask),
    /// Delete a task.
    DeleteTask {
        /// Task to delete.
        task_id: TaskId,
    },
    /// Stop the session.
    Shutdown,
}

/// Events sent from the session to the UI.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The board or drag cursor changed; render this state.
    BoardChanged(BoardState),
    /// A drop was committed to the server.
    CommitSent(TaskOrderUpdate),
    /// A commit failed. The board is left as it is until the next refresh.
    CommitFailed {
        /// The update that was rejected or lost.
        update: TaskOrderUpdate,
        /// Human-readable reason.
        error: String,
    },
    /// The server's order data is corrupt; the board must not be trusted.
    BoardCorrupted(String),
    /// A fetch failed.
    FetchFailed(String),
    /// A bucket or task mutation failed.
    RequestFailed {
        /// Which operation failed.
        operation: &'static str,
        /// Human-readable reason.
        error: String,
    },
}

/// Configuration for a board session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Project whose board is shown.
    pub project_id: ProjectId,
    /// Period of background refreshes, `None` to refresh only on demand.
    pub refresh_interval: Option<Duration>,
    /// Capacity of the command and event channels.
    pub channel_capacity: usize,
}

impl SessionConfig {
    /// Creates a config with no background refresh and default capacities.
    #[must_use]
    pub const fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            refresh_interval: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Enables periodic background refreshes.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

/// Result of one spawned request.
enum Completion {
    Fetched {
        ticket: FetchTicket,
        result: Result<Vec<BucketWithTasks>, ApiError>,
    },
    Committed {
        update: TaskOrderUpdate,
        result: Result<(), ApiError>,
    },
    Mutated {
        operation: &'static str,
        result: Result<(), ApiError>,
    },
}

/// What a spawned request was for, kept until it completes.
#[derive(Debug)]
enum Request {
    Fetch(FetchTicket),
    Commit(TaskOrderUpdate),
    Mutation(&'static str),
}

/// Spawn the session task and return its channel handles.
///
/// The first fetch is issued immediately. The session stops when it receives
/// [`SessionCommand::Shutdown`] or when the command sender is dropped.
pub fn spawn_session<A>(
    api: A,
    config: SessionConfig,
) -> (mpsc::Sender<SessionCommand>, mpsc::Receiver<SessionEvent>)
where
    A: BoardApi + Clone + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
    let (evt_tx, evt_rx) = mpsc::channel(config.channel_capacity);
    tokio::spawn(async move {
        Session::new(api, config, evt_tx).run(cmd_rx).await;
    });
    (cmd_tx, evt_rx)
}

struct Session<A> {
    api: A,
    project_id: ProjectId,
    refresh_interval: Option<Duration>,
    store: BoardStore,
    inflight: JoinSet<Completion>,
    requests: HashMap<task::Id, Request>,
    events: mpsc::Sender<SessionEvent>,
}

impl<A> Session<A>
where
    A: BoardApi + Clone + 'static,
{
    fn new(api: A, config: SessionConfig, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            api,
            project_id: config.project_id,
            refresh_interval: config.refresh_interval,
            store: BoardStore::new(),
            inflight: JoinSet::new(),
            requests: HashMap::new(),
            events,
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        tracing::info!(project_id = %self.project_id, "board session started");
        let mut ticker = self.refresh_interval.map(|period| {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.start_fetch();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(joined) = self.inflight.join_next_with_id() => match joined {
                    Ok((id, completion)) => {
                        self.requests.remove(&id);
                        self.handle_completion(completion).await;
                    }
                    Err(e) => self.request_lost(e).await,
                },
                () = next_tick(&mut ticker) => self.start_fetch(),
            }
        }

        self.inflight.abort_all();
        tracing::info!(project_id = %self.project_id, "board session stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Gesture(Gesture::Unlift) | SessionCommand::Cancel
                if self.store.state().is_dragging() =>
            {
                self.cancel_drag().await;
            }
            SessionCommand::Gesture(gesture) => {
                if self.store.dispatch(gesture) {
                    self.publish_state().await;
                }
            }
            SessionCommand::Drop => {
                let update = self.store.end_drag(DragEnd::Drop);
                self.publish_state().await;
                if let Some(update) = update {
                    self.start_commit(update);
                }
            }
            SessionCommand::Cancel | SessionCommand::Refresh => self.start_fetch(),
            SessionCommand::CreateBucket { name } => {
                let api = self.api.clone();
                let request = CreateBucket {
                    project_id: self.project_id,
                    name,
                };
                self.spawn_mutation("create bucket", async move {
                    api.create_bucket(&request).await.map(drop)
                });
            }
            SessionCommand::RenameBucket { bucket_id, name } => {
                let api = self.api.clone();
                let request = RenameBucket { name };
                self.spawn_mutation("rename bucket", async move {
                    api.rename_bucket(bucket_id, &request).await.map(drop)
                });
            }
            SessionCommand::DeleteBucket { bucket_id } => {
                let api = self.api.clone();
                self.spawn_mutation("delete bucket", async move {
                    api.delete_bucket(bucket_id).await
                });
            }
            SessionCommand::CreateTask(request) => {
                let api = self.api.clone();
                self.spawn_mutation("create task", async move {
                    api.create_task(&request).await.map(drop)
                });
            }
            SessionCommand::DeleteTask { task_id } => {
                let api = self.api.clone();
                self.spawn_mutation("delete task", async move {
                    api.delete_task(task_id).await
                });
            }
            SessionCommand::Shutdown => {}
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { ticket, result } => match result {
                Ok(payload) => match self.store.fetch_settled(ticket, &payload) {
                    Ok(Reconciliation::Applied) => self.publish_state().await,
                    Ok(_) => {}
                    Err(e) => self.emit(SessionEvent::BoardCorrupted(e.to_string())).await,
                },
                Err(e) => {
                    self.store.fetch_failed(ticket);
                    tracing::warn!(%ticket, error = %e, "board fetch failed");
                    self.emit(SessionEvent::FetchFailed(e.to_string())).await;
                }
            },
            Completion::Committed { update, result } => {
                self.store.commit_settled();
                match result {
                    Ok(()) => self.emit(SessionEvent::CommitSent(update)).await,
                    Err(e) => {
                        tracing::warn!(task_id = %update.task_id, error = %e, "commit failed");
                        self.emit(SessionEvent::CommitFailed {
                            update,
                            error: e.to_string(),
                        })
                        .await;
                    }
                }
                self.start_fetch();
            }
            Completion::Mutated { operation, result } => match result {
                Ok(()) => self.start_fetch(),
                Err(e) => {
                    tracing::warn!(operation, error = %e, "board mutation failed");
                    self.emit(SessionEvent::RequestFailed {
                        operation,
                        error: e.to_string(),
                    })
                    .await;
                }
            },
        }
    }

    /// Settles a request whose task panicked or was aborted.
    async fn request_lost(&mut self, error: JoinError) {
        let Some(request) = self.requests.remove(&error.id()) else {
            tracing::warn!(error = %error, "untracked session task failed");
            return;
        };
        tracing::warn!(?request, error = %error, "session request task failed");
        let error = ApiError::Interrupted(error.to_string());
        let completion = match request {
            Request::Fetch(ticket) => Completion::Fetched {
                ticket,
                result: Err(error),
            },
            Request::Commit(update) => Completion::Committed {
                update,
                result: Err(error),
            },
            Request::Mutation(operation) => Completion::Mutated {
                operation,
                result: Err(error),
            },
        };
        self.handle_completion(completion).await;
    }

    /// Ends the drag without committing and refetches to restore server order.
    async fn cancel_drag(&mut self) {
        self.store.end_drag(DragEnd::Cancel);
        self.publish_state().await;
        self.start_fetch();
    }

    fn start_fetch(&mut self) {
        let ticket = self.store.begin_fetch();
        let api = self.api.clone();
        let project_id = self.project_id;
        tracing::trace!(%ticket, "issuing board fetch");
        self.track(Request::Fetch(ticket), async move {
            let result = api.fetch_board(project_id).await;
            Completion::Fetched { ticket, result }
        });
    }

    fn start_commit(&mut self, update: TaskOrderUpdate) {
        let api = self.api.clone();
        self.track(Request::Commit(update), async move {
            let result = api.move_task(&update).await.map(drop);
            Completion::Committed { update, result }
        });
    }

    fn spawn_mutation<F>(&mut self, operation: &'static str, request: F)
    where
        F: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        self.track(Request::Mutation(operation), async move {
            let result = request.await;
            Completion::Mutated { operation, result }
        });
    }

    fn track<F>(&mut self, request: Request, future: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let handle = self.inflight.spawn(future);
        self.requests.insert(handle.id(), request);
    }

    async fn publish_state(&self) {
        self.emit(SessionEvent::BoardChanged(self.store.state().clone()))
            .await;
    }

    async fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event).await;
    }
}

/// Waits for the next refresh tick, or forever when refresh is disabled.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

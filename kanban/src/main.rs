//! `kanban`: command-line client for a kanban board server.
//!
//! Prints boards, moves tasks through the same drag pipeline a UI uses, and
//! manages buckets and tasks. Configuration via CLI flags, environment
//! variables, or config file (`~/.config/kanban/config.toml`).
//!
//! ```bash
//! # Print project 1
//! cargo run --bin kanban -- --server-url http://127.0.0.1:3400 show
//!
//! # Put task 7 where task 3 is
//! cargo run --bin kanban -- --project 1 move 7 --over-task 3
//!
//! # Follow the board live
//! KANBAN_PROJECT=1 cargo run --bin kanban -- watch
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use kanban::api::{BoardApi, HttpBoardApi};
use kanban::board::{Board, DragTarget, materialize};
use kanban::config::{CliArgs, ClientConfig, Command, MoveDestination};
use kanban::session::{self, SessionCommand, SessionEvent};
use kanban::sync::{BoardStore, DragEnd, Gesture};
use kanban_proto::bucket::{CreateBucket, RenameBucket};
use kanban_proto::ids::{BucketId, TaskId};
use kanban_proto::task::CreateTask;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so stdout carries only board output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let api = match HttpBoardApi::with_timeout(&config.server_url, config.request_timeout) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Invalid server URL {}: {e}", config.server_url);
            return ExitCode::FAILURE;
        }
    };

    let command = cli.command.clone().unwrap_or(Command::Show);
    tracing::info!(
        server = %api.base_url(),
        project_id = %config.project_id,
        ?command,
        "kanban starting"
    );

    match run(&api, &config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns the appender guard, which must stay alive for the process
/// lifetime, or `None` if the log path has no usable directory or file name.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("kanban.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type CommandResult = Result<(), BoxError>;

async fn run(api: &HttpBoardApi, config: &ClientConfig, command: Command) -> CommandResult {
    match command {
        Command::Show => {
            let board = fetch_board(api, config).await?;
            print_board(&board);
        }
        Command::Watch => watch(api.clone(), config).await,
        Command::Move { .. } => {
            let Some((task_id, destination)) = command.move_destination() else {
                return Err("move needs --over-task or --bucket".into());
            };
            move_task(api, config, task_id, destination).await?;
        }
        Command::AddBucket { name } => {
            let bucket = api
                .create_bucket(&CreateBucket {
                    project_id: config.project_id,
                    name,
                })
                .await?;
            println!("created bucket {} \"{}\"", bucket.id, bucket.name);
        }
        Command::RenameBucket { bucket, name } => {
            let bucket = api
                .rename_bucket(BucketId::new(bucket), &RenameBucket { name })
                .await?;
            println!("renamed bucket {} to \"{}\"", bucket.id, bucket.name);
        }
        Command::DeleteBucket { bucket } => {
            api.delete_bucket(BucketId::new(bucket)).await?;
            println!("deleted bucket {bucket}");
        }
        Command::AddTask {
            bucket,
            name,
            description,
        } => {
            let mut request = CreateTask::named(BucketId::new(bucket), name);
            request.description = description;
            let task = api.create_task(&request).await?;
            println!("created task {} \"{}\"", task.id, task.name);
        }
        Command::DeleteTask { task } => {
            api.delete_task(TaskId::new(task)).await?;
            println!("deleted task {task}");
        }
    }
    Ok(())
}

async fn fetch_board(api: &HttpBoardApi, config: &ClientConfig) -> Result<Board, BoxError> {
    let payload = api.fetch_board(config.project_id).await?;
    Ok(materialize(&payload)?)
}

/// Runs a move as one lift, one hover and one drop, then commits it.
async fn move_task(
    api: &HttpBoardApi,
    config: &ClientConfig,
    task_id: TaskId,
    destination: MoveDestination,
) -> CommandResult {
    let mut store = BoardStore::with_board(fetch_board(api, config).await?);
    if !store.dispatch(Gesture::Lift(task_id)) {
        return Err(format!("task {task_id} is not on this board").into());
    }
    let target = match destination {
        MoveDestination::OverTask(over) => DragTarget::Task(over),
        MoveDestination::Bucket(bucket) => DragTarget::Bucket(bucket),
    };
    if !store.dispatch(Gesture::MoveOver(task_id, target)) {
        store.end_drag(DragEnd::Cancel);
        println!("task {task_id} is already there");
        return Ok(());
    }
    let Some(update) = store.end_drag(DragEnd::Drop) else {
        return Err(format!("task {task_id} could not be placed").into());
    };
    let sent = api.move_task(&update).await;
    store.commit_settled();
    sent?;
    print_board(store.board());
    Ok(())
}

/// Prints the board on every change until Ctrl-C.
async fn watch(api: HttpBoardApi, config: &ClientConfig) {
    let (cmd_tx, mut evt_rx) = session::spawn_session(api, config.to_session_config());

    loop {
        tokio::select! {
            event = evt_rx.recv() => match event {
                Some(SessionEvent::BoardChanged(state)) => {
                    if !state.is_dragging() {
                        print_board(&state.board);
                    }
                }
                Some(SessionEvent::BoardCorrupted(e)) => eprintln!("board data is corrupt: {e}"),
                Some(SessionEvent::FetchFailed(e)) => eprintln!("refresh failed: {e}"),
                Some(other) => tracing::debug!(event = ?other, "session event"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let _ = cmd_tx.send(SessionCommand::Shutdown).await;
                break;
            }
        }
    }
}

fn print_board(board: &Board) {
    for bucket in board.buckets() {
        println!("== {} [{}] ({})", bucket.name, bucket.id, bucket.len());
        for task in board.tasks_in(bucket.id) {
            println!("   {:>6}  {}", task.id, task.name);
        }
    }
}

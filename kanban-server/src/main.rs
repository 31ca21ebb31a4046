//! `kanban-server`: serves one in-memory board store over JSON/HTTP.
//!
//! Routes:
//!
//! | Method | Path | Effect |
//! |--------|------|--------|
//! | `GET` | `/projects/{id}/buckets-with-tasks` | board in pointer form, tasks listed by id |
//! | `POST` | `/buckets` | append a bucket |
//! | `PUT` / `DELETE` | `/buckets/{id}` | rename, or delete with its tasks |
//! | `POST` | `/tasks` | append a task to a bucket |
//! | `PUT` | `/tasks/{id}` | move a task before `before_id`, or last when `null` |
//! | `DELETE` | `/tasks/{id}` | remove a task and close the gap |
//!
//! Nothing is persisted; the board is empty at every start. Ctrl-C stops
//! the server.
//!
//! ```bash
//! kanban-server --bind 0.0.0.0:8080 --max-name-length 64
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use kanban_server::config::{ServerCliArgs, ServerConfig};
use kanban_server::routes;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = ServerCliArgs::parse();
    let config = match ServerConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("kanban-server: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let db = Arc::new(config.build_store());
    let (addr, mut server) = match routes::start_server_with_state(&config.bind_addr, db).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(bind = %config.bind_addr, error = %e, "could not bind board server");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(
        %addr,
        max_name_length = ?config.max_name_length,
        "board server listening"
    );

    tokio::select! {
        result = &mut server => exit_code(result),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                server.abort();
                tracing::info!("board server stopped");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::warn!(error = %e, "ctrl-c unavailable, serving until the task ends");
                exit_code(server.await)
            }
        },
    }
}

fn exit_code(result: Result<(), tokio::task::JoinError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "board server task failed");
            ExitCode::FAILURE
        }
    }
}

//! Configuration for the `kanban` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/kanban/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use kanban_proto::ids::{BucketId, ProjectId, TaskId};

use crate::session::SessionConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    board: BoardFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    url: Option<String>,
    request_timeout_secs: Option<u64>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    project_id: Option<i64>,
    refresh_interval_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the board server.
    pub server_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Project whose board is shown.
    pub project_id: ProjectId,
    /// Period of background refreshes in `watch` mode. Zero disables them.
    pub refresh_interval: Duration,
    /// Channel capacity for session command/event channels.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3400".to_string(),
            request_timeout: Duration::from_secs(10),
            project_id: ProjectId::new(1),
            refresh_interval: Duration::from_secs(30),
            channel_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if the default file exists but is malformed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server_url: cli
                .server_url
                .clone()
                .or_else(|| file.server.url.clone())
                .unwrap_or(defaults.server_url),
            request_timeout: cli
                .request_timeout_secs
                .or(file.server.request_timeout_secs)
                .map_or(defaults.request_timeout, Duration::from_secs),
            project_id: cli
                .project
                .or(file.board.project_id)
                .map_or(defaults.project_id, ProjectId::new),
            refresh_interval: cli
                .refresh_interval_secs
                .or(file.board.refresh_interval_secs)
                .map_or(defaults.refresh_interval, Duration::from_secs),
            channel_capacity: file
                .board
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
        }
    }

    /// Build the [`SessionConfig`] used by `watch` mode.
    #[must_use]
    pub fn to_session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new(self.project_id);
        config.channel_capacity = self.channel_capacity;
        if self.refresh_interval.is_zero() {
            config
        } else {
            config.with_refresh_interval(self.refresh_interval)
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Kanban board client")]
pub struct CliArgs {
    /// Base URL of the board server.
    #[arg(long, env = "KANBAN_SERVER_URL")]
    pub server_url: Option<String>,

    /// Project whose board to use.
    #[arg(short, long, env = "KANBAN_PROJECT")]
    pub project: Option<i64>,

    /// Path to config file (default: `~/.config/kanban/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between background refreshes in `watch` mode (0 disables).
    #[arg(long)]
    pub refresh_interval_secs: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "KANBAN_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/kanban.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// What to do. Defaults to `show`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Client subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the board once.
    Show,
    /// Print the board every time it changes until Ctrl-C.
    Watch,
    /// Move a task onto another task's position or to the end of a bucket.
    Move {
        /// Task to move.
        task: i64,
        /// Take this task's position.
        #[arg(long, conflicts_with = "bucket", required_unless_present = "bucket")]
        over_task: Option<i64>,
        /// Append to this bucket.
        #[arg(long)]
        bucket: Option<i64>,
    },
    /// Append a bucket to the board.
    AddBucket {
        /// Bucket name.
        name: String,
    },
    /// Rename a bucket.
    RenameBucket {
        /// Bucket to rename.
        bucket: i64,
        /// New name.
        name: String,
    },
    /// Delete a bucket and all of its tasks.
    DeleteBucket {
        /// Bucket to delete.
        bucket: i64,
    },
    /// Add a task at the end of a bucket.
    AddTask {
        /// Bucket to add the task to.
        bucket: i64,
        /// Task name.
        name: String,
        /// Optional description.
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a task.
    DeleteTask {
        /// Task to delete.
        task: i64,
    },
}

/// Where `kanban move` should put the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDestination {
    /// Take another task's position.
    OverTask(TaskId),
    /// Append to a bucket.
    Bucket(BucketId),
}

impl Command {
    /// Destination of a `move` command, if this is one and it names a target.
    #[must_use]
    pub fn move_destination(&self) -> Option<(TaskId, MoveDestination)> {
        let Self::Move {
            task,
            over_task,
            bucket,
        } = self
        else {
            return None;
        };
        let destination = match (over_task, bucket) {
            (Some(over), _) => MoveDestination::OverTask(TaskId::new(*over)),
            (None, Some(bucket)) => MoveDestination::Bucket(BucketId::new(*bucket)),
            (None, None) => return None,
        };
        Some((TaskId::new(*task), destination))
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("kanban").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

//! Configuration system for the board server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/kanban-server/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use crate::store::BoardDb;

/// Errors that can occur when loading server configuration.
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

/// Top-level TOML config file structure for the server.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the server config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    max_name_length: Option<usize>,
}

/// CLI arguments for the board server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Kanban board reference server")]
pub struct ServerCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "KANBAN_BIND")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/kanban-server/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum bucket and task name length in characters.
    #[arg(long)]
    pub max_name_length: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "KANBAN_SERVER_LOG")]
    pub log_level: String,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `127.0.0.1:3400`).
    pub bind_addr: String,
    /// One name limit for buckets and tasks, `None` for the protocol defaults.
    pub max_name_length: Option<usize>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3400".to_string(),
            max_name_length: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            max_name_length: cli.max_name_length.or(file.server.max_name_length),
            log_level: cli.log_level.clone(),
        }
    }

    /// Builds an empty store honouring the configured name limit.
    #[must_use]
    pub fn build_store(&self) -> BoardDb {
        self.max_name_length
            .map_or_else(BoardDb::new, BoardDb::with_max_name_length)
    }
}

/// Load and parse a TOML config file for the server.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("kanban-server").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

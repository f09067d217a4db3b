// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdag",
    version,
    about = "Persistent task scheduler with DAG dependencies and an HTTP API.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the SQLite database file.
    ///
    /// Default: `tasks.db` in the current working directory, or the
    /// `TASKDAG_DB` environment variable.
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Address to serve the HTTP API on (e.g. `127.0.0.1:8080`).
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Maximum number of tasks running concurrently.
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/config.rs

//! Runtime settings.
//!
//! Each setting is resolved with the same priority order: CLI flag, then a
//! `TASKDAG_*` environment variable, then the built-in default. Validation
//! happens once, after resolution.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use crate::cli::CliArgs;

pub const DEFAULT_DB_PATH: &str = "tasks.db";
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file backing the task store.
    pub db_path: PathBuf,

    /// Upper bound on concurrently running task bodies.
    pub max_concurrent: usize,

    /// Address the HTTP API listens on.
    pub bind: SocketAddr,
}

impl Config {
    /// Resolve settings from CLI arguments, environment and defaults.
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let db_path = args
            .db_path
            .clone()
            .or_else(|| env::var("TASKDAG_DB").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let max_concurrent = match (args.max_concurrent, env::var("TASKDAG_MAX_CONCURRENT").ok()) {
            (Some(n), _) => n,
            (None, Some(raw)) => raw
                .parse::<usize>()
                .with_context(|| format!("parsing TASKDAG_MAX_CONCURRENT ({raw:?})"))?,
            (None, None) => DEFAULT_MAX_CONCURRENT,
        };

        let bind_raw = args
            .bind
            .clone()
            .or_else(|| env::var("TASKDAG_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("parsing bind address ({bind_raw:?})"))?;

        let config = Self {
            db_path,
            max_concurrent,
            bind,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(anyhow!("max_concurrent must be >= 1 (got 0)"));
        }
        Ok(())
    }
}

// src/errors.rs

//! Crate-wide error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("task '{0}' already exists")]
    Conflict(String),

    #[error("task '{task}' declares unknown dependency '{dependency}'")]
    MissingDependency { task: String, dependency: String },

    #[error("admitting task '{0}' would create a dependency cycle")]
    Cycle(String),

    #[error("invalid task submission: {0}")]
    InvalidTask(String),

    #[error("task '{0}' not found")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

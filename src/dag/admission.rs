// src/dag/admission.rs

//! Validate and admit a new task submission.

use tracing::{info, warn};

use crate::dag::graph::would_create_cycle;
use crate::errors::{Result, SchedulerError};
use crate::store::{Store, SubmitTask, Task};

/// Run the full admission pipeline for one submission.
///
/// Checks, in order: non-empty id, duplicate id, no self-dependency,
/// dependency existence, acyclicity against the stored graph. A duplicate
/// id is reported before any dependency validation, so resubmitting an
/// existing task is a Conflict even when its dependency list is also bad.
/// The final insert re-validates uniqueness and dependency existence in a
/// single transaction, so a rejected submission never leaves a partial
/// row and no committed task can reference an id that was not already
/// durable.
pub fn admit(store: &Store, submission: SubmitTask) -> Result<Task> {
    if submission.id.trim().is_empty() {
        return Err(SchedulerError::InvalidTask(
            "task id must not be empty".to_string(),
        ));
    }

    if store.get_task(&submission.id)?.is_some() {
        warn!(task = %submission.id, "rejected: duplicate task id");
        return Err(SchedulerError::Conflict(submission.id));
    }

    if submission.dependencies.iter().any(|d| *d == submission.id) {
        warn!(task = %submission.id, "rejected: task depends on itself");
        return Err(SchedulerError::Cycle(submission.id));
    }

    // The dependency list is a set.
    let mut submission = submission;
    submission.dependencies.sort();
    submission.dependencies.dedup();

    for dep in &submission.dependencies {
        if store.get_task(dep)?.is_none() {
            warn!(task = %submission.id, dependency = %dep, "rejected: unknown dependency");
            return Err(SchedulerError::MissingDependency {
                task: submission.id.clone(),
                dependency: dep.clone(),
            });
        }
    }

    let stored_edges = store.dependency_edges()?;
    if would_create_cycle(&stored_edges, &submission.id, &submission.dependencies) {
        warn!(task = %submission.id, "rejected: dependency cycle");
        return Err(SchedulerError::Cycle(submission.id));
    }

    let task = store.create_task(&submission)?;
    info!(task = %task.id, deps = task.dependencies.len(), "task admitted");
    Ok(task)
}

// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the dispatcher control loop that claims ready tasks
//! - the worker pool that runs task bodies and commits terminal states
//! - the crash-recovery pass run once at startup
//!
//! All coordination flows over a single mpsc event channel into the
//! dispatcher; the store is the only shared mutable state.

pub mod dispatcher;
pub mod recovery;
pub mod worker;

pub use dispatcher::Dispatcher;
pub use worker::{spawn_worker_pool, SleepExecutor, TaskExecutor};

use tokio::sync::mpsc;
use tracing::warn;

use crate::dag::admission;
use crate::errors::{Result, SchedulerError};
use crate::store::{Store, SubmitTask, Task, TaskStatus};

/// Outcome of one task body execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
}

impl TaskOutcome {
    pub fn as_status(self) -> TaskStatus {
        match self {
            TaskOutcome::Completed => TaskStatus::Completed,
            TaskOutcome::Failed => TaskStatus::Failed,
        }
    }
}

/// Events feeding the dispatcher loop.
///
/// - admission sends `TaskSubmitted`
/// - the worker pool sends `WorkerFinished` after the terminal commit
/// - shutdown handling sends `ShutdownRequested`
#[derive(Debug, Clone)]
pub enum EngineEvent {
    TaskSubmitted,
    WorkerFinished { task: String, outcome: TaskOutcome },
    ShutdownRequested,
}

/// A task claimed by the dispatcher, on its way to a worker slot.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: String,
    pub task_type: String,
    pub duration_ms: u64,
}

/// Shared handle for submitting and inspecting tasks.
///
/// The HTTP layer talks to this. It owns a store handle plus the event
/// sender used to wake the dispatcher after an admission.
#[derive(Clone)]
pub struct SchedulerHandle {
    store: Store,
    events: mpsc::Sender<EngineEvent>,
}

impl SchedulerHandle {
    pub fn new(store: Store, events: mpsc::Sender<EngineEvent>) -> Self {
        Self { store, events }
    }

    /// Admit a new task and wake the dispatcher.
    pub async fn submit_task(&self, submission: SubmitTask) -> Result<Task> {
        let task = admission::admit(&self.store, submission)?;

        // A closed channel means the engine is shutting down; the task is
        // already durable and will be swept up on the next startup.
        if self.events.send(EngineEvent::TaskSubmitted).await.is_err() {
            warn!(task = %task.id, "dispatcher not reachable after admission");
        }
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Task> {
        self.store
            .get_task(id)?
            .ok_or_else(|| SchedulerError::NotFound(id.to_string()))
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks()
    }
}

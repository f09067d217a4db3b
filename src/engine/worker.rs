// src/engine/worker.rs

//! Worker pool and the pluggable task-body executor.
//!
//! The pool consumes claimed tasks from a bounded channel and runs each
//! body on its own tokio task. The dispatcher's in-flight accounting is
//! what bounds how many bodies are alive at once; the pool itself only
//! guarantees that every claimed task reaches a terminal commit and a
//! finished event, in that order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{ClaimedTask, EngineEvent, TaskOutcome};
use crate::store::Store;

/// Trait abstracting how a claimed task body is executed.
///
/// The engine's contract with an executor: given the claimed task,
/// eventually return success or failure. Production uses
/// [`SleepExecutor`]; tests substitute executors that finish instantly or
/// fail selected tasks. Scheduling correctness does not depend on the
/// body.
pub trait TaskExecutor: Send + Sync + 'static {
    fn execute(&self, task: ClaimedTask) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;
}

/// Simulates work by sleeping for the task's declared duration.
pub struct SleepExecutor;

impl TaskExecutor for SleepExecutor {
    fn execute(&self, task: ClaimedTask) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(task.duration_ms)).await;
            TaskOutcome::Completed
        })
    }
}

/// Spawn the background worker pool loop.
///
/// The returned sender is what the dispatcher submits claimed tasks to.
pub fn spawn_worker_pool(
    store: Store,
    executor: Arc<dyn TaskExecutor>,
    events_tx: mpsc::Sender<EngineEvent>,
) -> mpsc::Sender<ClaimedTask> {
    let (tx, mut rx) = mpsc::channel::<ClaimedTask>(32);

    tokio::spawn(async move {
        debug!("worker pool started");
        while let Some(task) = rx.recv().await {
            let store = store.clone();
            let executor = Arc::clone(&executor);
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                run_task(task, store, executor, events_tx).await;
            });
        }
        debug!("worker pool stopped (channel closed)");
    });

    tx
}

/// Run one task body and commit its terminal state.
///
/// The terminal status must be durable before the finished event is
/// emitted: the dispatcher's next readiness query may only observe a
/// dependent as ready after its dependency's commit.
async fn run_task(
    task: ClaimedTask,
    store: Store,
    executor: Arc<dyn TaskExecutor>,
    events_tx: mpsc::Sender<EngineEvent>,
) {
    let id = task.id.clone();
    info!(task = %id, task_type = %task.task_type, duration_ms = task.duration_ms, "task body started");

    let outcome = executor.execute(task).await;
    match outcome {
        TaskOutcome::Completed => info!(task = %id, "task body finished"),
        TaskOutcome::Failed => warn!(task = %id, "task body failed"),
    }

    if let Err(err) = store.complete(&id, outcome.as_status()) {
        error!(task = %id, error = %err, "failed to commit terminal status");
    }

    let event = EngineEvent::WorkerFinished {
        task: id.clone(),
        outcome,
    };
    if events_tx.send(event).await.is_err() {
        // Dispatcher already gone; the terminal state is committed, which
        // is all crash recovery needs.
        debug!(task = %id, "dispatcher gone before completion event");
    }
}

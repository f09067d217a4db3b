#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use taskdag::engine::recovery;
use taskdag::engine::{
    spawn_worker_pool, ClaimedTask, Dispatcher, EngineEvent, SchedulerHandle, TaskExecutor,
    TaskOutcome,
};
use taskdag::store::{Store, SubmitTask, TaskStatus};

/// A running engine on a scratch database, wired the same way `lib.rs`
/// wires production, minus the HTTP server.
pub struct TestEngine {
    pub handle: SchedulerHandle,
    pub store: Store,
    pub events_tx: mpsc::Sender<EngineEvent>,
    pub dispatcher: JoinHandle<anyhow::Result<()>>,
    _dir: Option<TempDir>,
}

impl TestEngine {
    /// Fresh engine on a fresh temp database.
    pub fn start(max_concurrent: usize, executor: Arc<dyn TaskExecutor>) -> Self {
        let dir = tempfile::tempdir().expect("creating scratch dir");
        let store = Store::open(dir.path().join("tasks.db")).expect("opening scratch store");
        Self::start_with(store, Some(dir), max_concurrent, executor)
    }

    /// Engine over an existing store (e.g. one "recovered" from a crash).
    pub fn start_with(
        store: Store,
        dir: Option<TempDir>,
        max_concurrent: usize,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        recovery::run(&store).expect("running recovery");

        let (events_tx, events_rx) = mpsc::channel(64);
        let workers_tx = spawn_worker_pool(store.clone(), executor, events_tx.clone());
        let dispatcher = Dispatcher::new(store.clone(), workers_tx, events_rx, max_concurrent);
        let dispatcher = tokio::spawn(dispatcher.run());

        events_tx
            .try_send(EngineEvent::TaskSubmitted)
            .expect("sending initial sweep event");

        let handle = SchedulerHandle::new(store.clone(), events_tx.clone());
        Self {
            handle,
            store,
            events_tx,
            dispatcher,
            _dir: dir,
        }
    }

    /// Poll until every task is terminal, or panic after `timeout`.
    pub async fn wait_quiesced(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let tasks = self.store.list_tasks().expect("listing tasks");
            if tasks.iter().all(|t| t.status.is_terminal()) {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                let states: Vec<_> = tasks.iter().map(|t| (t.id.clone(), t.status)).collect();
                panic!("engine did not quiesce within {timeout:?}: {states:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until the given tasks are terminal, or panic after `timeout`.
    pub async fn wait_terminal(&self, ids: &[&str], timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let done = ids.iter().all(|id| {
                self.store
                    .get_task(id)
                    .expect("fetching task")
                    .map(|t| t.status.is_terminal())
                    .unwrap_or(false)
            });
            if done {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("tasks {ids:?} not terminal within {timeout:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Test task-body executor: finishes after a configurable hold, records
/// start order, tracks peak concurrency, and fails selected ids.
pub struct TestExecutor {
    hold: Duration,
    fail: HashSet<String>,
    pub started: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    peak_seen: Arc<AtomicUsize>,
}

impl TestExecutor {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            fail: HashSet::new(),
            started: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicUsize::new(0)),
            peak_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mark task ids whose bodies should report failure.
    pub fn failing<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.fail.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Highest number of bodies observed running at the same instant.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_seen.load(Ordering::SeqCst)
    }

    pub fn started_order(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

impl TaskExecutor for TestExecutor {
    fn execute(&self, task: ClaimedTask) -> Pin<Box<dyn Future<Output = TaskOutcome> + Send>> {
        self.started.lock().unwrap().push(task.id.clone());
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_seen.fetch_max(now_running, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let fail = self.fail.contains(&task.id);
        let hold = self.hold;
        Box::pin(async move {
            tokio::time::sleep(hold).await;
            running.fetch_sub(1, Ordering::SeqCst);
            if fail {
                TaskOutcome::Failed
            } else {
                TaskOutcome::Completed
            }
        })
    }
}

/// Shorthand for building a submission.
pub fn task(id: &str, duration_ms: u64, deps: &[&str]) -> SubmitTask {
    SubmitTask {
        id: id.to_string(),
        task_type: "test".to_string(),
        duration_ms,
        dependencies: deps.iter().map(|s| s.to_string()).collect(),
    }
}

/// Assert a task's current status.
pub fn assert_status(store: &Store, id: &str, expected: TaskStatus) {
    let task = store
        .get_task(id)
        .expect("fetching task")
        .unwrap_or_else(|| panic!("task {id} not found"));
    assert_eq!(task.status, expected, "unexpected status for task {id}");
}

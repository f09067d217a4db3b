// src/store/mod.rs

//! SQLite-backed task store.
//!
//! The database is the single source of truth: every mutation commits
//! before its success is reported upward, and all components read and
//! write task state exclusively through this module. The conditional
//! update in [`Store::claim`] is the primitive that makes concurrent
//! dispatch safe.

pub mod task;

pub use task::{SubmitTask, Task, TaskStatus};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::errors::{Result, SchedulerError};

/// Current Unix time in milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Handle to the task database. Cheap to clone; all clones share one
/// serialized connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    /// In-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Recover the guard even if a holder panicked; statements are
        // individually atomic so the connection stays consistent.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS tasks (
              id TEXT PRIMARY KEY,
              type TEXT NOT NULL,
              duration_ms INTEGER NOT NULL,
              dependencies TEXT NOT NULL,
              status TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              started_at_ms INTEGER,
              finished_at_ms INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_status_created
              ON tasks(status, created_at_ms);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new task in state QUEUED.
    ///
    /// Uniqueness and dependency existence are enforced inside a single
    /// transaction, so no committed task can ever reference an id that was
    /// not already durable. Acyclicity is the caller's responsibility
    /// (admission checks it before calling in).
    pub fn create_task(&self, new: &SubmitTask) -> Result<Task> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![new.id],
            |row| row.get(0),
        )?;
        if exists {
            return Err(SchedulerError::Conflict(new.id.clone()));
        }

        for dep in &new.dependencies {
            let dep_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
                params![dep],
                |row| row.get(0),
            )?;
            if !dep_exists {
                return Err(SchedulerError::MissingDependency {
                    task: new.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let created_at = now_ms();
        let deps_json = serde_json::to_string(&new.dependencies)
            .map_err(|e| SchedulerError::Other(e.into()))?;
        tx.execute(
            "INSERT INTO tasks (id, type, duration_ms, dependencies, status, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.id,
                new.task_type,
                new.duration_ms as i64,
                deps_json,
                TaskStatus::Queued.as_str(),
                created_at
            ],
        )?;
        tx.commit()?;

        debug!(task = %new.id, deps = new.dependencies.len(), "task persisted");
        Ok(Task {
            id: new.id.clone(),
            task_type: new.task_type.clone(),
            duration_ms: new.duration_ms,
            dependencies: new.dependencies.clone(),
            status: TaskStatus::Queued,
            created_at_ms: created_at,
            started_at_ms: None,
            finished_at_ms: None,
        })
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn();
        Ok(fetch_task(&conn, id)?)
    }

    /// All tasks, oldest first.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, type, duration_ms, dependencies, status,
                    created_at_ms, started_at_ms, finished_at_ms
             FROM tasks
             ORDER BY created_at_ms ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Ids of tasks that are QUEUED with every dependency COMPLETED, FIFO
    /// by creation time.
    ///
    /// The result is a snapshot; a stale entry loses its claim instead of
    /// running twice.
    pub fn find_ready_task_ids(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT t.id FROM tasks AS t
             WHERE t.status = 'QUEUED'
               AND NOT EXISTS (
                 SELECT 1 FROM json_each(t.dependencies) AS je
                 JOIN tasks AS d ON d.id = je.value
                 WHERE d.status != 'COMPLETED'
               )
             ORDER BY t.created_at_ms ASC, t.rowid ASC
             LIMIT ?1",
        )?;
        let ids = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Attempt the QUEUED -> RUNNING transition for `id`.
    ///
    /// A single conditional update; exactly one claimant can win. Returns
    /// the claimed task, or `None` if the claim was lost (already running,
    /// already terminal, or unknown id).
    pub fn claim(&self, id: &str) -> Result<Option<Task>> {
        let conn = self.conn();
        let started_at = now_ms();
        let changed = conn.execute(
            "UPDATE tasks SET status = 'RUNNING', started_at_ms = ?2
             WHERE id = ?1 AND status = 'QUEUED'",
            params![id, started_at],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(fetch_task(&conn, id)?)
    }

    /// Commit the terminal state for a RUNNING task.
    ///
    /// `status` must be COMPLETED or FAILED. Durable before returning.
    pub fn complete(&self, id: &str, status: TaskStatus) -> Result<()> {
        debug_assert!(status.is_terminal());
        let conn = self.conn();
        let finished_at = now_ms();
        let changed = conn.execute(
            "UPDATE tasks SET status = ?2, finished_at_ms = ?3
             WHERE id = ?1 AND status = 'RUNNING'",
            params![id, status.as_str(), finished_at],
        )?;
        if changed == 0 {
            warn!(task = %id, status = %status, "no RUNNING row to complete");
        } else {
            debug!(task = %id, status = %status, "terminal status committed");
        }
        Ok(())
    }

    /// Requeue every RUNNING task. Used only by crash recovery; returns
    /// how many rows were reset.
    pub fn reset_running_to_queued(&self) -> Result<usize> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE tasks SET status = 'QUEUED', started_at_ms = NULL
             WHERE status = 'RUNNING'",
            [],
        )?;
        Ok(changed)
    }

    /// All (task, dependency) edges currently stored. Feeds the admission
    /// cycle check.
    pub fn dependency_edges(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT t.id, je.value FROM tasks AS t, json_each(t.dependencies) AS je")?;
        let edges = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }
}

fn fetch_task(conn: &Connection, id: &str) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        "SELECT id, type, duration_ms, dependencies, status,
                created_at_ms, started_at_ms, finished_at_ms
         FROM tasks WHERE id = ?1",
        params![id],
        row_to_task,
    )
    .optional()
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let deps_raw: String = row.get(3)?;
    let dependencies: Vec<String> = serde_json::from_str(&deps_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let status_raw: String = row.get(4)?;
    let status = status_raw.parse::<TaskStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Task {
        id: row.get(0)?,
        task_type: row.get(1)?,
        duration_ms: row.get::<_, i64>(2)? as u64,
        dependencies,
        status,
        created_at_ms: row.get(5)?,
        started_at_ms: row.get(6)?,
        finished_at_ms: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit(id: &str, deps: &[&str]) -> SubmitTask {
        SubmitTask {
            id: id.to_string(),
            task_type: "test".to_string(),
            duration_ms: 10,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn duplicate_id_is_a_conflict() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();
        let err = store.create_task(&submit("a", &[])).unwrap_err();
        assert!(matches!(err, SchedulerError::Conflict(_)));
    }

    #[test]
    fn unknown_dependency_is_rejected_and_rolled_back() {
        let store = Store::open_in_memory().unwrap();
        let err = store.create_task(&submit("a", &["ghost"])).unwrap_err();
        assert!(matches!(err, SchedulerError::MissingDependency { .. }));
        assert!(store.get_task("a").unwrap().is_none());
    }

    #[test]
    fn claim_admits_exactly_one_winner() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();

        let first = store.claim("a").unwrap();
        assert_eq!(first.unwrap().status, TaskStatus::Running);
        assert!(store.claim("a").unwrap().is_none());
    }

    #[test]
    fn readiness_requires_all_dependencies_completed() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();
        store.create_task(&submit("b", &["a"])).unwrap();

        assert_eq!(store.find_ready_task_ids(10).unwrap(), vec!["a"]);

        store.claim("a").unwrap();
        assert!(store.find_ready_task_ids(10).unwrap().is_empty());

        store.complete("a", TaskStatus::Completed).unwrap();
        assert_eq!(store.find_ready_task_ids(10).unwrap(), vec!["b"]);
    }

    #[test]
    fn failed_dependency_blocks_dependents() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();
        store.create_task(&submit("b", &["a"])).unwrap();

        store.claim("a").unwrap();
        store.complete("a", TaskStatus::Failed).unwrap();

        assert!(store.find_ready_task_ids(10).unwrap().is_empty());
        assert_eq!(store.get_task("b").unwrap().unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn ready_tasks_come_back_fifo() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("first", &[])).unwrap();
        store.create_task(&submit("second", &[])).unwrap();
        store.create_task(&submit("third", &[])).unwrap();

        assert_eq!(
            store.find_ready_task_ids(10).unwrap(),
            vec!["first", "second", "third"]
        );
        assert_eq!(store.find_ready_task_ids(2).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn reset_running_requeues_for_reclaim() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();
        store.claim("a").unwrap();

        assert_eq!(store.reset_running_to_queued().unwrap(), 1);
        let task = store.get_task("a").unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.started_at_ms.is_none());

        // Terminal rows are untouched.
        store.claim("a").unwrap();
        store.complete("a", TaskStatus::Completed).unwrap();
        assert_eq!(store.reset_running_to_queued().unwrap(), 0);
    }

    #[test]
    fn dependency_edges_reflect_stored_graph() {
        let store = Store::open_in_memory().unwrap();
        store.create_task(&submit("a", &[])).unwrap();
        store.create_task(&submit("b", &["a"])).unwrap();
        store.create_task(&submit("c", &["a", "b"])).unwrap();

        let mut edges = store.dependency_edges().unwrap();
        edges.sort();
        assert_eq!(
            edges,
            vec![
                ("b".to_string(), "a".to_string()),
                ("c".to_string(), "a".to_string()),
                ("c".to_string(), "b".to_string()),
            ]
        );
    }
}

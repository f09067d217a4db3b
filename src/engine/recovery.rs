// src/engine/recovery.rs

//! Startup reconciliation of state left by a previous process lifetime.

use tracing::{debug, info};

use crate::errors::Result;
use crate::store::Store;

/// Requeue every task left in RUNNING by a crash.
///
/// Each such task was claimed by a dispatcher that no longer exists;
/// resetting it to QUEUED makes it claimable again on the next sweep.
/// Must run exactly once, before the dispatcher starts consuming events.
/// Task bodies are expected to tolerate re-execution: the engine promises
/// at-most-once claim per lifetime, at-least-once attempt across them.
pub fn run(store: &Store) -> Result<usize> {
    let requeued = store.reset_running_to_queued()?;
    if requeued > 0 {
        info!(requeued, "requeued tasks left RUNNING by a previous run");
    } else {
        debug!("no tasks left RUNNING by a previous run");
    }
    Ok(requeued)
}

// src/engine/dispatcher.rs

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{ClaimedTask, EngineEvent};
use crate::store::Store;

/// The single scheduling control loop.
///
/// Waits for wake-up events, then claims ready tasks FIFO while worker
/// capacity remains. Readiness queries return snapshots; the conditional
/// claim in the store is what keeps a stale snapshot harmless, because at
/// most one claim per task ever succeeds.
pub struct Dispatcher {
    store: Store,
    workers_tx: mpsc::Sender<ClaimedTask>,
    events_rx: mpsc::Receiver<EngineEvent>,
    max_concurrent: usize,

    /// Tasks currently handed to workers. Owned and mutated only here.
    in_flight: usize,
    /// Set on shutdown: stop claiming, wait for in-flight work to finish.
    draining: bool,
}

impl Dispatcher {
    pub fn new(
        store: Store,
        workers_tx: mpsc::Sender<ClaimedTask>,
        events_rx: mpsc::Receiver<EngineEvent>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            workers_tx,
            events_rx,
            max_concurrent,
            in_flight: 0,
            draining: false,
        }
    }

    /// Run until shutdown is requested and in-flight work has drained, or
    /// until every event sender is gone.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(max_concurrent = self.max_concurrent, "dispatcher started");

        while let Some(event) = self.events_rx.recv().await {
            self.apply_event(event);

            // Coalesce: fold everything already queued into this iteration
            // so one sweep covers all pending readiness changes.
            while let Ok(event) = self.events_rx.try_recv() {
                self.apply_event(event);
            }

            if self.draining {
                if self.in_flight == 0 {
                    break;
                }
                continue;
            }

            self.dispatch_ready().await?;
        }

        info!("dispatcher stopped");
        Ok(())
    }

    fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TaskSubmitted => {}
            EngineEvent::WorkerFinished { task, outcome } => {
                debug!(task = %task, ?outcome, "worker slot released");
                self.in_flight = self.in_flight.saturating_sub(1);
            }
            EngineEvent::ShutdownRequested => {
                info!(in_flight = self.in_flight, "shutdown requested; draining workers");
                self.draining = true;
            }
        }
    }

    /// One dispatch sweep: claim and submit ready tasks while capacity
    /// remains.
    async fn dispatch_ready(&mut self) -> anyhow::Result<()> {
        while self.in_flight < self.max_concurrent {
            let free_slots = self.max_concurrent - self.in_flight;
            let ready = match self.store.find_ready_task_ids(free_slots) {
                Ok(ids) => ids,
                Err(err) => {
                    error!(error = %err, "readiness query failed; retrying on next wake-up");
                    return Ok(());
                }
            };
            if ready.is_empty() {
                break;
            }

            let mut claimed_any = false;
            for id in ready {
                if self.in_flight >= self.max_concurrent {
                    break;
                }
                match self.store.claim(&id) {
                    Ok(Some(task)) => {
                        claimed_any = true;
                        self.in_flight += 1;
                        debug!(
                            task = %task.id,
                            in_flight = self.in_flight,
                            "claimed; submitting to worker pool"
                        );
                        let claimed = ClaimedTask {
                            id: task.id,
                            task_type: task.task_type,
                            duration_ms: task.duration_ms,
                        };
                        self.workers_tx
                            .send(claimed)
                            .await
                            .map_err(|err| anyhow::anyhow!("worker pool channel closed: {err}"))?;
                    }
                    Ok(None) => {
                        // Stale snapshot; another iteration got there first.
                        debug!(task = %id, "claim lost");
                    }
                    Err(err) => {
                        error!(task = %id, error = %err, "claim failed");
                    }
                }
            }

            if !claimed_any {
                break;
            }
        }
        Ok(())
    }
}

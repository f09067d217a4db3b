// src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod store;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::CliArgs;
use crate::config::Config;
use crate::engine::{
    recovery, spawn_worker_pool, Dispatcher, EngineEvent, SchedulerHandle, SleepExecutor,
};
use crate::store::Store;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config resolution
/// - store + crash recovery
/// - worker pool and dispatcher
/// - the HTTP server with graceful shutdown
pub async fn run(args: CliArgs) -> Result<()> {
    let config = Config::resolve(&args)?;
    info!(
        db = %config.db_path.display(),
        max_concurrent = config.max_concurrent,
        "starting taskdag"
    );

    let store = Store::open(&config.db_path)
        .with_context(|| format!("opening task database at {:?}", config.db_path))?;

    // Reconcile anything a previous lifetime left RUNNING, before the
    // dispatcher can claim work.
    recovery::run(&store)?;

    let (events_tx, events_rx) = mpsc::channel::<EngineEvent>(64);

    let workers_tx = spawn_worker_pool(store.clone(), Arc::new(SleepExecutor), events_tx.clone());

    let dispatcher = Dispatcher::new(store.clone(), workers_tx, events_rx, config.max_concurrent);
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Initial sweep: covers requeued recovery work and anything already
    // ready in the database.
    events_tx
        .send(EngineEvent::TaskSubmitted)
        .await
        .map_err(|_| anyhow!("dispatcher event channel closed at startup"))?;

    let handle = SchedulerHandle::new(store.clone(), events_tx.clone());
    let app = api::build_router(handle);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.bind))?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    // Ctrl-C stops the HTTP server first, then tells the dispatcher to
    // stop claiming and drain in-flight workers.
    let shutdown_tx = events_tx.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(EngineEvent::ShutdownRequested).await;
        })
        .await
        .context("serving HTTP API")?;

    drop(events_tx);
    dispatcher_handle
        .await
        .context("joining dispatcher task")??;

    info!("taskdag stopped");
    Ok(())
}

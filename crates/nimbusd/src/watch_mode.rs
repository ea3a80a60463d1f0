//! `nimbusd watch` — watchdogs plus a logging problem consumer.

use std::path::PathBuf;
use std::sync::Arc;

use nimbus_core::NimbusConfig;
use nimbus_sync::{hardware_watchdog, image_watchdog, queue, Problem, SnapshotComputeService};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::open_store;

fn log_problem(problem: &Problem) {
    let resource = problem.resource();
    warn!(
        problem = %problem.kind(),
        resource_kind = %resource.kind,
        resource = %resource.raw_id,
        name = %resource.name,
        detected_at = problem.detected_at(),
        "problem reported"
    );
}

pub async fn run(config: &NimbusConfig, snapshot: PathBuf) -> anyhow::Result<()> {
    info!(snapshot = %snapshot.display(), "nimbus watchdogs starting");

    let store = open_store(config)?;
    let compute = Arc::new(SnapshotComputeService::new(snapshot));
    let (problems, mut receiver) = queue::bounded(config.sync.problem_queue_capacity);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let hardware = hardware_watchdog(
        compute.clone(),
        store.clone(),
        problems.clone(),
        config.sync.hardware_interval(),
    );
    let images = image_watchdog(compute, store, problems, config.sync.image_interval());

    let hardware_handle = tokio::spawn(hardware.run(shutdown_rx.clone()));
    let image_handle = tokio::spawn(images.run(shutdown_rx));

    // Ends once both watchdogs have dropped their senders and the queue is empty.
    let consumer = tokio::spawn(async move {
        let mut seen = 0u64;
        while let Some(problem) = receiver.take().await {
            log_problem(&problem);
            seen += 1;
        }
        seen
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = hardware_handle.await;
    let _ = image_handle.await;
    let seen = consumer.await.unwrap_or_default();

    info!(problems = seen, "nimbus watchdogs stopped");
    Ok(())
}

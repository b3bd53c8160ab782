//! skiff scheduler
//!
//! Runs one scheduling session for a single Docker workload. Manager events
//! arrive as JSON lines on stdin, driver calls leave as JSON lines on stdout,
//! and logs go to stderr.
//!
//! ## Architecture
//!
//! - **Event Pump**: Decodes stdin lines and forwards them to the actor
//! - **Scheduler Actor**: Applies events to the offer scheduler one at a time
//! - **Driver**: Writes launch, decline and shutdown calls to stdout

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use skiff_id::UlidTaskIdSource;
use skiff_scheduler::actors::{spawn_actor, SchedulerActor};
use skiff_scheduler::driver::JsonLinesDriver;
use skiff_scheduler::transport::pump_lines;
use skiff_scheduler::{OfferScheduler, SchedulerConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries driver calls, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting skiff scheduler");

    let config = SchedulerConfig::from_env()?;
    info!(
        image = %config.workload.image,
        cpus = config.workload.cpus,
        memory = config.workload.memory,
        force_pull_image = config.workload.force_pull_image,
        desired_instances = config.workload.desired_instances,
        constraints = %config.workload.constraints,
        volumes = config.workload.volumes.len(),
        "Configuration loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let driver = Arc::new(JsonLinesDriver::stdout());
    let task_ids = Arc::new(UlidTaskIdSource::new(config.task_prefix.clone()));
    let scheduler = OfferScheduler::from_spec(config.workload, task_ids);

    let (actor, snapshot_rx) = SchedulerActor::new(scheduler, driver);
    let (handle, mut actor_ref) = spawn_actor(actor, config.mailbox_size, shutdown_rx);

    let pump_handle = tokio::spawn({
        let handle = handle.clone();
        async move { pump_lines(tokio::io::stdin(), &handle).await }
    });
    drop(handle);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = actor_ref.task_mut() => {
            if let Err(e) = result {
                error!(error = %e, "Scheduler actor task panicked");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    pump_handle.abort();

    if actor_ref.is_running() {
        info!("Waiting for scheduler actor to stop...");
        if tokio::time::timeout(Duration::from_secs(5), actor_ref.task_mut())
            .await
            .is_err()
        {
            warn!("Scheduler actor did not stop in time, aborting");
            actor_ref.abort();
        }
    }

    let snapshot = snapshot_rx.borrow().clone();
    info!(
        session_id = %snapshot.session_id,
        complete = snapshot.complete,
        pending = snapshot.pending.len(),
        running = snapshot.running.len(),
        offers_received = snapshot.stats.offers_received,
        tasks_launched = snapshot.stats.tasks_launched,
        offers_declined = snapshot.stats.offers_declined,
        "Scheduler shutdown complete"
    );

    Ok(())
}

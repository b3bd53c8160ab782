//! Scheduler actor.
//!
//! Owns the [`OfferScheduler`] and feeds it one event at a time, so the
//! manager's asynchronous callbacks never touch scheduler state concurrently.
//! After every message the current snapshot is published on a watch channel.

use std::sync::Arc;

use async_trait::async_trait;
use skiff_events::{EventEnvelope, SchedulerEvent};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use super::framework::{Actor, ActorContext, ActorError};
use crate::driver::SchedulerDriver;
use crate::scheduler::{OfferScheduler, SchedulerSnapshot};

// =============================================================================
// Messages
// =============================================================================

/// Messages handled by the scheduler actor.
#[derive(Debug)]
pub enum SchedulerMessage {
    /// An event from the cluster manager.
    Event(EventEnvelope),

    /// Request the current snapshot.
    Snapshot {
        reply_to: oneshot::Sender<SchedulerSnapshot>,
    },
}

impl From<EventEnvelope> for SchedulerMessage {
    fn from(envelope: EventEnvelope) -> Self {
        SchedulerMessage::Event(envelope)
    }
}

impl From<SchedulerEvent> for SchedulerMessage {
    fn from(event: SchedulerEvent) -> Self {
        SchedulerMessage::Event(EventEnvelope::new(0, event))
    }
}

// =============================================================================
// Scheduler Actor
// =============================================================================

/// Serializes event delivery into one [`OfferScheduler`].
pub struct SchedulerActor {
    scheduler: OfferScheduler,
    driver: Arc<dyn SchedulerDriver>,
    snapshot_tx: watch::Sender<SchedulerSnapshot>,
    stop_when_complete: bool,
}

impl SchedulerActor {
    /// Create the actor and a receiver for its published snapshots.
    pub fn new(
        scheduler: OfferScheduler,
        driver: Arc<dyn SchedulerDriver>,
    ) -> (Self, watch::Receiver<SchedulerSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(scheduler.snapshot());
        let actor = Self {
            scheduler,
            driver,
            snapshot_tx,
            stop_when_complete: true,
        };
        (actor, snapshot_rx)
    }

    /// Keep handling events after the session completes.
    ///
    /// Offers arriving after completion are still declined.
    pub fn keep_running_after_completion(mut self) -> Self {
        self.stop_when_complete = false;
        self
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.scheduler.snapshot());
    }
}

#[async_trait]
impl Actor for SchedulerActor {
    type Message = SchedulerMessage;

    fn name(&self) -> &str {
        "scheduler"
    }

    async fn on_start(&mut self, ctx: &mut ActorContext) -> Result<(), ActorError> {
        info!(
            actor_id = %ctx.actor_id,
            session_id = %self.scheduler.session_id(),
            image = %self.scheduler.spec().image,
            desired_instances = self.scheduler.spec().desired_instances,
            "Scheduler actor starting"
        );
        Ok(())
    }

    async fn handle(&mut self, msg: SchedulerMessage, _ctx: &mut ActorContext) -> Result<bool, ActorError> {
        match msg {
            SchedulerMessage::Event(envelope) => {
                debug!(seq = envelope.seq, kind = envelope.event.kind(), "Handling event");
                self.scheduler.handle(envelope.event, self.driver.as_ref());
                self.publish();
            }
            SchedulerMessage::Snapshot { reply_to } => {
                let _ = reply_to.send(self.scheduler.snapshot());
            }
        }

        Ok(!(self.stop_when_complete && self.scheduler.is_complete()))
    }

    async fn on_stop(&mut self, ctx: &mut ActorContext) {
        self.publish();
        let snapshot = self.scheduler.snapshot();
        info!(
            actor_id = %ctx.actor_id,
            complete = snapshot.complete,
            pending = snapshot.pending.len(),
            running = snapshot.running.len(),
            offers_received = snapshot.stats.offers_received,
            tasks_launched = snapshot.stats.tasks_launched,
            "Scheduler actor stopping"
        );
    }
}

//! Core actor framework types and traits.
//!
//! Provides the building blocks for serialized event handling:
//! - `Actor` trait for defining actor behavior
//! - `ActorHandle` for sending messages to actors
//! - `spawn_actor` to run an actor on its own task

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tracing::{debug, error, info};

// =============================================================================
// Core Traits
// =============================================================================

/// Marker trait for actor messages.
pub trait Message: Send + Debug + 'static {}

impl<T: Send + Debug + 'static> Message for T {}

/// The Actor trait defines behavior for an actor.
///
/// Actors:
/// - Process messages one at a time (no internal concurrency)
/// - Own mutable state not shared with other actors
/// - Communicate only via message passing
#[async_trait]
pub trait Actor: Send + 'static {
    /// The message type this actor handles.
    type Message: Message;

    /// Actor name for logging.
    fn name(&self) -> &str;

    /// Handle a single message.
    ///
    /// Returns `Ok(true)` to continue, `Ok(false)` to stop, or `Err` on failure.
    async fn handle(&mut self, msg: Self::Message, ctx: &mut ActorContext) -> Result<bool, ActorError>;

    /// Called when the actor starts.
    async fn on_start(&mut self, _ctx: &mut ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    /// Called when the actor is about to stop.
    async fn on_stop(&mut self, _ctx: &mut ActorContext) {}
}

/// Context provided to actors during message handling.
pub struct ActorContext {
    /// Actor's unique ID.
    pub actor_id: String,

    /// Shutdown signal receiver.
    pub shutdown: watch::Receiver<bool>,

    /// Messages handled so far.
    pub messages_processed: u64,

    /// Current actor state.
    pub state: ActorState,
}

impl ActorContext {
    /// Create a new actor context.
    pub fn new(actor_id: String, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            actor_id,
            shutdown,
            messages_processed: 0,
            state: ActorState::Running,
        }
    }

    /// Check if shutdown has been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Actor lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Running,
    Stopping,
    Stopped,
    Failed,
}

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in actors.
#[derive(Debug, Error)]
pub enum ActorError {
    /// Error that stops the actor.
    #[error("permanent error: {0}")]
    Permanent(String),

    /// Actor mailbox is full.
    #[error("mailbox full")]
    MailboxFull,

    /// Actor has stopped.
    #[error("actor stopped")]
    ActorStopped,
}

// =============================================================================
// Actor Handle
// =============================================================================

/// Handle for sending messages to an actor.
pub struct ActorHandle<M: Message> {
    tx: mpsc::Sender<M>,
    actor_id: String,
}

// Manual impl: messages carrying reply channels are not `Clone`.
impl<M: Message> Clone for ActorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            actor_id: self.actor_id.clone(),
        }
    }
}

impl<M: Message> ActorHandle<M> {
    /// Send a message, waiting for mailbox capacity.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::ActorStopped)
    }

    /// Try to send a message without blocking.
    pub fn try_send(&self, msg: M) -> Result<(), ActorError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ActorError::MailboxFull,
            mpsc::error::TrySendError::Closed(_) => ActorError::ActorStopped,
        })
    }

    /// Returns true once the actor has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Get the actor ID.
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

/// Reference to a spawned actor task.
pub struct ActorRef {
    /// Actor ID.
    pub actor_id: String,

    task_handle: tokio::task::JoinHandle<()>,
}

impl ActorRef {
    /// Check if the actor task is still running.
    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// Abort the actor task immediately.
    pub fn abort(&self) {
        self.task_handle.abort();
    }

    /// Wait for the actor task to finish.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task_handle.await
    }

    /// Mutable access to the join handle, for use in `select!`.
    pub fn task_mut(&mut self) -> &mut tokio::task::JoinHandle<()> {
        &mut self.task_handle
    }
}

/// Spawn an actor on its own task.
///
/// The actor stops when it asks to, when `shutdown` turns true, or when every
/// handle is dropped.
pub fn spawn_actor<A: Actor>(
    actor: A,
    mailbox_size: usize,
    shutdown: watch::Receiver<bool>,
) -> (ActorHandle<A::Message>, ActorRef) {
    let actor_id = format!("{}_{}", actor.name(), generate_actor_id());
    let (tx, rx) = mpsc::channel(mailbox_size.max(1));

    let loop_id = actor_id.clone();
    let task_handle = tokio::spawn(async move {
        run_actor_loop(actor, rx, shutdown, loop_id).await;
    });

    info!(actor_id = %actor_id, "Spawned actor");

    (
        ActorHandle {
            tx,
            actor_id: actor_id.clone(),
        },
        ActorRef {
            actor_id,
            task_handle,
        },
    )
}

// =============================================================================
// Actor Loop
// =============================================================================

async fn run_actor_loop<A: Actor>(
    mut actor: A,
    mut rx: mpsc::Receiver<A::Message>,
    mut shutdown: watch::Receiver<bool>,
    actor_id: String,
) {
    let mut ctx = ActorContext::new(actor_id.clone(), shutdown.clone());

    if let Err(e) = actor.on_start(&mut ctx).await {
        error!(actor_id = %actor_id, error = %e, "Actor failed to start");
        return;
    }

    debug!(actor_id = %actor_id, "Actor started");

    if ctx.is_shutdown() {
        info!(actor_id = %actor_id, "Shutdown already signaled, not processing messages");
        ctx.state = ActorState::Stopping;
    }

    // A dropped shutdown sender can never signal again.
    let mut watching = true;

    while ctx.state == ActorState::Running {
        tokio::select! {
            biased;

            changed = shutdown.changed(), if watching => {
                match changed {
                    Ok(()) if *shutdown.borrow() => {
                        info!(actor_id = %actor_id, "Actor received shutdown signal");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => watching = false,
                }
            }

            msg = rx.recv() => {
                let Some(msg) = msg else {
                    debug!(actor_id = %actor_id, "Actor mailbox closed");
                    break;
                };

                ctx.messages_processed += 1;

                match actor.handle(msg, &mut ctx).await {
                    Ok(true) => {}
                    Ok(false) => {
                        info!(actor_id = %actor_id, "Actor requested stop");
                        break;
                    }
                    Err(ActorError::Permanent(reason)) => {
                        error!(actor_id = %actor_id, error = %reason, "Actor failed");
                        ctx.state = ActorState::Failed;
                    }
                    Err(e) => {
                        error!(actor_id = %actor_id, error = %e, "Actor error");
                    }
                }
            }
        }
    }

    if ctx.state != ActorState::Failed {
        ctx.state = ActorState::Stopping;
        drain_mailbox(&mut actor, &mut rx, &mut ctx).await;
    }
    actor.on_stop(&mut ctx).await;
    if ctx.state != ActorState::Failed {
        ctx.state = ActorState::Stopped;
    }

    info!(
        actor_id = %actor_id,
        messages_processed = ctx.messages_processed,
        "Actor stopped"
    );
}

/// Hand every message already accepted into the mailbox to the actor.
///
/// Senders see the mailbox as closed from here on.
async fn drain_mailbox<A: Actor>(
    actor: &mut A,
    rx: &mut mpsc::Receiver<A::Message>,
    ctx: &mut ActorContext,
) {
    rx.close();

    let mut drained = 0u64;
    while let Ok(msg) = rx.try_recv() {
        drained += 1;
        ctx.messages_processed += 1;
        if let Err(e) = actor.handle(msg, ctx).await {
            error!(actor_id = %ctx.actor_id, error = %e, "Actor error while draining mailbox");
        }
    }

    if drained > 0 {
        info!(actor_id = %ctx.actor_id, drained, "Drained queued messages");
    }
}

// =============================================================================
// Helpers
// =============================================================================

static ACTOR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn generate_actor_id() -> u64 {
    ACTOR_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Debug)]
    enum TestMessage {
        Record(u32),
        Stop,
        Fail,
    }

    struct RecordingActor {
        seen: Arc<Mutex<Vec<u32>>>,
    }

    #[async_trait]
    impl Actor for RecordingActor {
        type Message = TestMessage;

        fn name(&self) -> &str {
            "recording"
        }

        async fn handle(&mut self, msg: TestMessage, _ctx: &mut ActorContext) -> Result<bool, ActorError> {
            match msg {
                TestMessage::Record(n) => {
                    self.seen.lock().unwrap().push(n);
                    Ok(true)
                }
                TestMessage::Stop => Ok(false),
                TestMessage::Fail => Err(ActorError::Permanent("boom".to_string())),
            }
        }
    }

    fn spawn_recording(
        shutdown: watch::Receiver<bool>,
    ) -> (ActorHandle<TestMessage>, ActorRef, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let actor = RecordingActor { seen: seen.clone() };
        let (handle, actor_ref) = spawn_actor(actor, 4, shutdown);
        (handle, actor_ref, seen)
    }

    #[tokio::test]
    async fn test_actor_handle_send() {
        let (tx, mut rx) = mpsc::channel::<TestMessage>(16);
        let handle = ActorHandle {
            tx,
            actor_id: "test".to_string(),
        };

        handle.send(TestMessage::Record(7)).await.unwrap();

        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, TestMessage::Record(7)));
    }

    #[tokio::test]
    async fn test_try_send_full_mailbox() {
        let (tx, _rx) = mpsc::channel::<TestMessage>(1);
        let handle = ActorHandle {
            tx,
            actor_id: "test".to_string(),
        };

        handle.try_send(TestMessage::Record(1)).unwrap();
        assert!(matches!(
            handle.try_send(TestMessage::Record(2)),
            Err(ActorError::MailboxFull)
        ));
    }

    #[tokio::test]
    async fn test_messages_handled_in_order() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, actor_ref, seen) = spawn_recording(shutdown_rx);

        for n in 0..10 {
            handle.send(TestMessage::Record(n)).await.unwrap();
        }
        handle.send(TestMessage::Stop).await.unwrap();
        actor_ref.join().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_queued_messages_drained_after_stop() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, actor_ref, seen) = spawn_recording(shutdown_rx);

        // Queued before the actor task gets to run.
        handle.try_send(TestMessage::Record(1)).unwrap();
        handle.try_send(TestMessage::Stop).unwrap();
        handle.try_send(TestMessage::Record(2)).unwrap();

        tokio::time::timeout(Duration::from_secs(5), actor_ref.join())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert!(matches!(
            handle.try_send(TestMessage::Record(3)),
            Err(ActorError::ActorStopped)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_actor() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, actor_ref, _) = spawn_recording(shutdown_rx);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), actor_ref.join())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            handle.send(TestMessage::Record(1)).await,
            Err(ActorError::ActorStopped)
        ));
    }

    #[tokio::test]
    async fn test_dropped_shutdown_sender_keeps_actor_alive() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, actor_ref, seen) = spawn_recording(shutdown_rx);
        drop(shutdown_tx);

        handle.send(TestMessage::Record(3)).await.unwrap();
        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), actor_ref.join())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_actor() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (handle, actor_ref, seen) = spawn_recording(shutdown_rx);

        handle.send(TestMessage::Fail).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), actor_ref.join())
            .await
            .unwrap()
            .unwrap();

        assert!(seen.lock().unwrap().is_empty());
    }
}

//! Offer scheduler: the decision core.
//!
//! The scheduler is responsible for:
//! - Answering every offer exactly once (launch or decline)
//! - Launching at most one task per offer until the target count is reached
//! - Moving tasks from pending to running on status updates
//! - Ending the session on the first terminal task state
//!
//! All entry points take `&mut self` and must be called serially; see
//! [`crate::actors::SchedulerActor`] for the serializing wrapper.

use std::sync::Arc;

use serde::Serialize;
use skiff_constraints::ConstraintEvaluator;
use skiff_events::{
    Filters, MasterInfo, Offer, OfferError, SchedulerEvent, TaskInfo, TaskState, TaskStatus,
};
use skiff_id::{AgentId, ExecutorId, FrameworkId, OfferId, SessionId, TaskId, TaskIdSource};
use tracing::{debug, error, info, instrument, warn};

use crate::config::WorkloadSpec;
use crate::driver::SchedulerDriver;
use crate::state::{Promotion, SchedulerState, TaskPhase};
use crate::task::build_task;

/// Seconds the manager should hold back resources we answered.
pub const REFUSE_SECONDS: f64 = 1.0;

/// What to do with one offer.
#[derive(Debug, Clone, PartialEq)]
pub enum OfferDecision {
    Launch(TaskInfo),
    Decline(DeclineReason),
}

/// Why an offer was declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    /// The offer could not be parsed into something launchable.
    Malformed(OfferError),
    /// A task already reached a terminal state.
    SessionComplete,
    /// Placement constraints rejected the offer.
    ConstraintsRejected,
    /// Pending plus running already meets the target.
    TargetReached,
    /// The task ID source handed out an ID that is already tracked.
    DuplicateTaskId(TaskId),
}

/// Counts for one offer batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OfferRoundStats {
    pub offers: usize,
    pub launched: usize,
    pub declined: usize,
}

/// Result of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Pending task confirmed running.
    Promoted,
    /// Duplicate running report.
    AlreadyRunning,
    /// Running report for a task we are not tracking.
    UnknownTask,
    /// Task reached a terminal state.
    Terminal {
        previous: Option<TaskPhase>,
        shutdown_requested: bool,
    },
    /// Non-actionable state tag.
    Ignored,
}

/// Lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub offers_received: u64,
    pub tasks_launched: u64,
    pub offers_declined: u64,
    pub status_updates: u64,
}

/// Point-in-time view of the scheduler for logs and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub session_id: SessionId,
    pub framework_id: Option<FrameworkId>,
    pub master: Option<MasterInfo>,
    pub desired_instances: u32,
    pub pending: Vec<TaskId>,
    pub running: Vec<TaskId>,
    pub complete: bool,
    pub last_launched: Option<TaskId>,
    pub last_status: Option<TaskStatus>,
    pub stats: SchedulerStats,
}

/// Keeps one workload at its target task count using offers.
pub struct OfferScheduler {
    spec: WorkloadSpec,
    constraints: Arc<dyn ConstraintEvaluator>,
    task_ids: Arc<dyn TaskIdSource>,
    state: SchedulerState,
    session_id: SessionId,
    framework_id: Option<FrameworkId>,
    master: Option<MasterInfo>,
    last_launched: Option<TaskId>,
    last_status: Option<TaskStatus>,
    stats: SchedulerStats,
}

impl OfferScheduler {
    /// Create a scheduler with explicit collaborators.
    pub fn new(
        spec: WorkloadSpec,
        constraints: Arc<dyn ConstraintEvaluator>,
        task_ids: Arc<dyn TaskIdSource>,
    ) -> Self {
        Self {
            spec,
            constraints,
            task_ids,
            state: SchedulerState::new(),
            session_id: SessionId::new(),
            framework_id: None,
            master: None,
            last_launched: None,
            last_status: None,
            stats: SchedulerStats::default(),
        }
    }

    /// Create a scheduler that evaluates the workload's own constraint set.
    pub fn from_spec(spec: WorkloadSpec, task_ids: Arc<dyn TaskIdSource>) -> Self {
        let constraints = Arc::new(spec.constraints.clone());
        Self::new(spec, constraints, task_ids)
    }

    pub fn spec(&self) -> &WorkloadSpec {
        &self.spec
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn framework_id(&self) -> Option<&FrameworkId> {
        self.framework_id.as_ref()
    }

    pub fn master(&self) -> Option<&MasterInfo> {
        self.master.as_ref()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// True once any task reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            session_id: self.session_id,
            framework_id: self.framework_id.clone(),
            master: self.master.clone(),
            desired_instances: self.spec.desired_instances,
            pending: self.state.pending_ids(),
            running: self.state.running_ids(),
            complete: self.state.is_complete(),
            last_launched: self.last_launched.clone(),
            last_status: self.last_status.clone(),
            stats: self.stats,
        }
    }

    /// Dispatch one event to its handler.
    pub fn handle(&mut self, event: SchedulerEvent, driver: &dyn SchedulerDriver) {
        match event {
            SchedulerEvent::Registered {
                framework_id,
                master,
            } => self.on_registered(framework_id, master),
            SchedulerEvent::Reregistered { master } => self.on_reregistered(master),
            SchedulerEvent::Offers { offers } => {
                self.on_offers(&offers, driver);
            }
            SchedulerEvent::OfferRescinded { offer_id } => self.on_offer_rescinded(&offer_id),
            SchedulerEvent::StatusUpdate { status } => {
                self.on_status_update(status, driver);
            }
            SchedulerEvent::FrameworkMessage {
                executor_id,
                agent_id,
                data,
            } => self.on_framework_message(&executor_id, &agent_id, &data),
            SchedulerEvent::Disconnected => self.on_disconnected(),
            SchedulerEvent::AgentLost { agent_id } => self.on_agent_lost(&agent_id),
            SchedulerEvent::ExecutorLost {
                executor_id,
                agent_id,
                status,
            } => self.on_executor_lost(&executor_id, &agent_id, status),
            SchedulerEvent::Error { message } => self.on_error(&message),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Record the manager identity. Tracked tasks are kept.
    pub fn on_registered(&mut self, framework_id: FrameworkId, master: MasterInfo) {
        info!(
            session_id = %self.session_id,
            framework_id = %framework_id,
            master = %master.address(),
            "Registered"
        );
        self.framework_id = Some(framework_id);
        self.master = Some(master);
    }

    /// Record the new manager leader. Tracked tasks are kept.
    pub fn on_reregistered(&mut self, master: MasterInfo) {
        info!(
            session_id = %self.session_id,
            master = %master.address(),
            pending = self.state.pending_count(),
            running = self.state.running_count(),
            "Re-registered"
        );
        self.master = Some(master);
    }

    // =========================================================================
    // Offers
    // =========================================================================

    /// Answer every offer in the batch, in order.
    #[instrument(skip_all, fields(session_id = %self.session_id, offer_count = offers.len()))]
    pub fn on_offers(&mut self, offers: &[Offer], driver: &dyn SchedulerDriver) -> OfferRoundStats {
        info!("Resource offers with {} offers", offers.len());

        let mut round = OfferRoundStats {
            offers: offers.len(),
            ..Default::default()
        };

        for offer in offers {
            self.stats.offers_received += 1;
            match self.decide(offer) {
                OfferDecision::Launch(task) => {
                    round.launched += 1;
                    self.stats.tasks_launched += 1;
                    self.launch(offer, task, driver);
                }
                OfferDecision::Decline(reason) => {
                    round.declined += 1;
                    self.stats.offers_declined += 1;
                    self.decline(offer, &reason, driver);
                }
            }
        }

        debug!(
            launched = round.launched,
            declined = round.declined,
            pending = self.state.pending_count(),
            running = self.state.running_count(),
            "Offer round complete"
        );

        round
    }

    /// Decide what to do with one offer, reserving a task slot on launch.
    fn decide(&mut self, offer: &Offer) -> OfferDecision {
        if let Err(e) = offer.validate() {
            warn!(offer_id = %offer.id, error = %e, "Declining malformed offer");
            return OfferDecision::Decline(DeclineReason::Malformed(e));
        }

        if self.state.is_complete() {
            return OfferDecision::Decline(DeclineReason::SessionComplete);
        }

        if !self.constraints.allows(offer) {
            return OfferDecision::Decline(DeclineReason::ConstraintsRejected);
        }

        let desired = self.spec.desired_instances as usize;
        if self.state.active_count() >= desired {
            return OfferDecision::Decline(DeclineReason::TargetReached);
        }

        let task_id = self.task_ids.next_id();
        if !self.state.add_pending(task_id.clone()) {
            error!(task_id = %task_id, "Task ID source returned an ID already in use");
            return OfferDecision::Decline(DeclineReason::DuplicateTaskId(task_id));
        }

        OfferDecision::Launch(build_task(&self.spec, &offer.agent_id, &task_id))
    }

    fn launch(&mut self, offer: &Offer, task: TaskInfo, driver: &dyn SchedulerDriver) {
        info!(
            task_id = %task.task_id,
            offer_id = %offer.id,
            agent_id = %offer.agent_id,
            hostname = %offer.hostname,
            "Launching task"
        );
        self.last_launched = Some(task.task_id.clone());

        if let Err(e) = driver.launch_tasks(&offer.id, vec![task], refusal_filter()) {
            error!(offer_id = %offer.id, error = %e, "Driver failed to launch task");
        }
    }

    fn decline(&self, offer: &Offer, reason: &DeclineReason, driver: &dyn SchedulerDriver) {
        debug!(offer_id = %offer.id, reason = ?reason, "Declining offer");

        if let Err(e) = driver.decline_offer(&offer.id, refusal_filter()) {
            error!(offer_id = %offer.id, error = %e, "Driver failed to decline offer");
        }
    }

    // =========================================================================
    // Status Updates
    // =========================================================================

    /// Apply a task status update.
    ///
    /// Any terminal state ends the session: the workload is a finite job, so
    /// success and failure both stop scheduling. Only the first terminal
    /// update issues the shutdown request.
    #[instrument(skip_all, fields(session_id = %self.session_id, task_id = %status.task_id))]
    pub fn on_status_update(
        &mut self,
        status: TaskStatus,
        driver: &dyn SchedulerDriver,
    ) -> StatusOutcome {
        self.stats.status_updates += 1;
        let task_id = status.task_id.as_str();

        info!(state = %status.state, "Status update task {} is in state {}", task_id, status.state);

        let outcome = match &status.state {
            TaskState::Running => match self.state.mark_running(task_id) {
                Promotion::Promoted => StatusOutcome::Promoted,
                Promotion::AlreadyRunning => StatusOutcome::AlreadyRunning,
                Promotion::Unknown => {
                    warn!("Running update for a task this session is not tracking");
                    StatusOutcome::UnknownTask
                }
            },
            TaskState::Failed | TaskState::Lost | TaskState::Killed | TaskState::Finished => {
                let previous = self.state.remove(task_id);
                let first = self.state.mark_complete();
                if first {
                    info!(
                        state = %status.state,
                        message = status.message.as_deref().unwrap_or(""),
                        "Task reached terminal state, ending session"
                    );
                    self.request_shutdown(driver);
                } else {
                    debug!("Session already complete, not requesting shutdown again");
                }
                StatusOutcome::Terminal {
                    previous,
                    shutdown_requested: first,
                }
            }
            other => {
                info!(state = %other, "No action for state");
                StatusOutcome::Ignored
            }
        };

        self.last_status = Some(status);

        info!(
            pending = self.state.pending_count(),
            running = self.state.running_count(),
            "Number of instances"
        );

        outcome
    }

    fn request_shutdown(&self, driver: &dyn SchedulerDriver) {
        if let Err(e) = driver.request_shutdown(false) {
            error!(error = %e, "Driver failed to accept shutdown request");
        }
    }

    // =========================================================================
    // Lifecycle Notifications
    // =========================================================================

    pub fn on_offer_rescinded(&mut self, offer_id: &OfferId) {
        info!(offer_id = %offer_id, "Offer rescinded");
    }

    pub fn on_framework_message(&mut self, executor_id: &ExecutorId, agent_id: &AgentId, data: &[u8]) {
        info!(
            executor_id = %executor_id,
            agent_id = %agent_id,
            bytes = data.len(),
            "Framework message"
        );
    }

    pub fn on_disconnected(&mut self) {
        warn!(session_id = %self.session_id, "Disconnected");
    }

    pub fn on_agent_lost(&mut self, agent_id: &AgentId) {
        warn!(agent_id = %agent_id, "Agent lost");
    }

    pub fn on_executor_lost(&mut self, executor_id: &ExecutorId, agent_id: &AgentId, status: i32) {
        warn!(
            executor_id = %executor_id,
            agent_id = %agent_id,
            status,
            "Executor lost"
        );
    }

    pub fn on_error(&mut self, message: &str) {
        error!(session_id = %self.session_id, "Error: {}", message);
    }
}

fn refusal_filter() -> Filters {
    Filters::refuse_for(REFUSE_SECONDS)
}

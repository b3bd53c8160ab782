//! Replica tracking state.
//!
//! Each launched task is tracked in exactly one phase. Terminal tasks are
//! dropped from tracking, so a task can never be both pending and running.

use std::collections::HashMap;

use serde::Serialize;
use skiff_id::TaskId;

/// Phase of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Launched, not yet confirmed running.
    Pending,
    /// Confirmed running.
    Running,
}

/// Result of applying a `Running` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Task moved from pending to running.
    Promoted,
    /// Task was already running.
    AlreadyRunning,
    /// Task is not tracked.
    Unknown,
}

/// Pending/running task sets plus the session completion flag.
#[derive(Debug, Default)]
pub struct SchedulerState {
    tasks: HashMap<TaskId, TaskPhase>,
    complete: bool,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, task_id: &str) -> Option<TaskPhase> {
        self.tasks.get(task_id).copied()
    }

    pub fn is_pending(&self, task_id: &str) -> bool {
        self.phase(task_id) == Some(TaskPhase::Pending)
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.phase(task_id) == Some(TaskPhase::Running)
    }

    pub fn pending_count(&self) -> usize {
        self.count(TaskPhase::Pending)
    }

    pub fn running_count(&self) -> usize {
        self.count(TaskPhase::Running)
    }

    /// Pending plus running.
    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    /// Pending task IDs, sorted.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.ids(TaskPhase::Pending)
    }

    /// Running task IDs, sorted.
    pub fn running_ids(&self) -> Vec<TaskId> {
        self.ids(TaskPhase::Running)
    }

    /// Start tracking a freshly launched task.
    ///
    /// Returns false if the ID is already tracked; the existing phase is kept.
    pub fn add_pending(&mut self, task_id: TaskId) -> bool {
        if self.tasks.contains_key(&task_id) {
            return false;
        }
        self.tasks.insert(task_id, TaskPhase::Pending);
        true
    }

    /// Apply a `Running` report. Unknown IDs are left untracked.
    pub fn mark_running(&mut self, task_id: &str) -> Promotion {
        match self.tasks.get_mut(task_id) {
            Some(phase) if *phase == TaskPhase::Pending => {
                *phase = TaskPhase::Running;
                Promotion::Promoted
            }
            Some(_) => Promotion::AlreadyRunning,
            None => Promotion::Unknown,
        }
    }

    /// Stop tracking a task. Returns the phase it was in, if tracked.
    pub fn remove(&mut self, task_id: &str) -> Option<TaskPhase> {
        self.tasks.remove(task_id)
    }

    /// Mark the session complete. Returns true on the first call only.
    pub fn mark_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.complete, true)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn count(&self, phase: TaskPhase) -> usize {
        self.tasks.values().filter(|p| **p == phase).count()
    }

    fn ids(&self, phase: TaskPhase) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|(_, p)| **p == phase)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_to_running() {
        let mut state = SchedulerState::new();
        assert!(state.add_pending(TaskId::from("t-1")));
        assert!(state.is_pending("t-1"));

        assert_eq!(state.mark_running("t-1"), Promotion::Promoted);
        assert!(state.is_running("t-1"));
        assert!(!state.is_pending("t-1"));
        assert_eq!(state.active_count(), 1);

        assert_eq!(state.mark_running("t-1"), Promotion::AlreadyRunning);
        assert_eq!(state.running_count(), 1);
    }

    #[test]
    fn test_duplicate_add_keeps_phase() {
        let mut state = SchedulerState::new();
        state.add_pending(TaskId::from("t-1"));
        state.mark_running("t-1");

        assert!(!state.add_pending(TaskId::from("t-1")));
        assert!(state.is_running("t-1"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut state = SchedulerState::new();
        assert_eq!(state.mark_running("ghost"), Promotion::Unknown);
        assert_eq!(state.remove("ghost"), None);
        assert_eq!(state.active_count(), 0);
    }

    #[test]
    fn test_ids_sorted() {
        let mut state = SchedulerState::new();
        for id in ["t-3", "t-1", "t-2"] {
            state.add_pending(TaskId::from(id));
        }
        state.mark_running("t-2");

        assert_eq!(
            state.pending_ids(),
            vec![TaskId::from("t-1"), TaskId::from("t-3")]
        );
        assert_eq!(state.running_ids(), vec![TaskId::from("t-2")]);
    }

    #[test]
    fn test_mark_complete_once() {
        let mut state = SchedulerState::new();
        assert!(!state.is_complete());
        assert!(state.mark_complete());
        assert!(!state.mark_complete());
        assert!(state.is_complete());
    }
}

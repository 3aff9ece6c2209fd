//! Status tracker: shared state of the current dispatch run.
//!
//! Readers get copies through [`StatusTracker::snapshot`]. Writes go through
//! a [`StatusWriter`], and the only way to obtain one is
//! [`StatusTracker::try_begin`], which checks and claims the running flag
//! under a single lock acquisition. At most one writer exists at a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use herald_common::types::{DispatchStatus, MessageResult, RunPhase};

pub const STEP_INITIALIZING: &str = "Initializing...";
pub const STEP_COMPLETED: &str = "Completed";
pub const STEP_SESSION_FAILED: &str = "Session check failed";

fn lock(inner: &Mutex<DispatchStatus>) -> MutexGuard<'_, DispatchStatus> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-wide dispatch status. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<Mutex<DispatchStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DispatchStatus {
        lock(&self.inner).clone()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner).is_running
    }

    /// Claim the tracker for a new run.
    ///
    /// Returns `None` if a run is already active. Otherwise resets every field,
    /// marks the run as started and hands back the writer for it.
    pub fn try_begin(&self) -> Option<StatusWriter> {
        let mut status = lock(&self.inner);
        if status.is_running {
            return None;
        }

        *status = DispatchStatus {
            is_running: true,
            current_step: STEP_INITIALIZING.to_string(),
            phase: RunPhase::Initializing,
            started_at: Some(Utc::now()),
            ..DispatchStatus::default()
        };

        Some(StatusWriter {
            inner: Arc::clone(&self.inner),
            finished: false,
        })
    }
}

/// Exclusive write access to the tracker for the duration of one run.
///
/// Dropping a writer without calling [`complete`](Self::complete) or
/// [`fail`](Self::fail) marks the run as failed.
#[derive(Debug)]
pub struct StatusWriter {
    inner: Arc<Mutex<DispatchStatus>>,
    finished: bool,
}

impl StatusWriter {
    /// Move to a new phase with a human-readable step description.
    pub fn enter(&self, phase: RunPhase, step: &str) {
        let mut status = lock(&self.inner);
        status.phase = phase;
        status.current_step = step.to_string();
    }

    pub fn set_total(&self, total: usize) {
        lock(&self.inner).total = total;
    }

    /// Append the result for the `index`-th due recipient.
    pub fn record(&self, index: usize, result: MessageResult) {
        let mut status = lock(&self.inner);
        status.messages.push(result);
        status.progress = index + 1;
    }

    pub fn complete(mut self) {
        self.finish(RunPhase::Completed, STEP_COMPLETED.to_string());
    }

    /// End the run in the failed state with `step` as the visible reason.
    pub fn fail(mut self, step: impl Into<String>) {
        self.finish(RunPhase::Failed, step.into());
    }

    fn finish(&mut self, phase: RunPhase, step: String) {
        let mut status = lock(&self.inner);
        status.phase = phase;
        status.current_step = step;
        status.is_running = false;
        status.finished_at = Some(Utc::now());
        self.finished = true;
    }
}

impl Drop for StatusWriter {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(
                RunPhase::Failed,
                "Error: dispatch worker stopped unexpectedly".to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use herald_common::types::MessageOutcome;

    use super::*;

    fn result(client: &str, status: MessageOutcome) -> MessageResult {
        MessageResult {
            client: client.to_string(),
            contact: "1".to_string(),
            status,
        }
    }

    #[test]
    fn test_initial_state() {
        let tracker = StatusTracker::new();
        let status = tracker.snapshot();
        assert!(!status.is_running);
        assert_eq!(status.phase, RunPhase::Idle);
        assert_eq!(status.progress, 0);
    }

    #[test]
    fn test_single_writer() {
        let tracker = StatusTracker::new();
        let writer = tracker.try_begin().expect("first claim succeeds");
        assert!(tracker.try_begin().is_none());
        assert!(tracker.is_running());

        writer.complete();
        assert!(!tracker.is_running());
        assert!(tracker.try_begin().is_some());
    }

    #[test]
    fn test_begin_resets_previous_run() {
        let tracker = StatusTracker::new();
        let writer = tracker.try_begin().unwrap();
        writer.set_total(2);
        writer.record(0, result("a", MessageOutcome::Success));
        writer.complete();
        assert_eq!(tracker.snapshot().messages.len(), 1);

        let _writer = tracker.try_begin().unwrap();
        let status = tracker.snapshot();
        assert!(status.is_running);
        assert_eq!(status.current_step, STEP_INITIALIZING);
        assert_eq!(status.total, 0);
        assert_eq!(status.progress, 0);
        assert!(status.messages.is_empty());
        assert!(status.finished_at.is_none());
    }

    #[test]
    fn test_writes_visible_to_snapshots() {
        let tracker = StatusTracker::new();
        let writer = tracker.try_begin().unwrap();

        writer.enter(RunPhase::Sending, "Sending messages...");
        writer.set_total(2);
        writer.record(0, result("a", MessageOutcome::Success));
        let mid = tracker.snapshot();
        assert_eq!(mid.phase, RunPhase::Sending);
        assert_eq!(mid.progress, 1);
        assert_eq!(mid.total, 2);

        writer.record(1, result("b", MessageOutcome::Failed));
        writer.complete();

        let done = tracker.snapshot();
        assert_eq!(done.current_step, STEP_COMPLETED);
        assert_eq!(done.phase, RunPhase::Completed);
        assert_eq!(done.progress, 2);
        assert_eq!(done.messages[1].status, MessageOutcome::Failed);
        assert!(done.finished_at.is_some());
        // Mid-run snapshot is a copy, not a live view
        assert_eq!(mid.messages.len(), 1);
    }

    #[test]
    fn test_fail_keeps_recorded_results() {
        let tracker = StatusTracker::new();
        let writer = tracker.try_begin().unwrap();
        writer.record(0, result("a", MessageOutcome::Success));
        writer.fail("Error: disk full");

        let status = tracker.snapshot();
        assert!(!status.is_running);
        assert_eq!(status.phase, RunPhase::Failed);
        assert_eq!(status.current_step, "Error: disk full");
        assert_eq!(status.messages.len(), 1);
    }

    #[test]
    fn test_dropped_writer_marks_failure() {
        let tracker = StatusTracker::new();
        drop(tracker.try_begin().unwrap());

        let status = tracker.snapshot();
        assert!(!status.is_running);
        assert_eq!(status.phase, RunPhase::Failed);
        assert!(status.current_step.starts_with("Error:"));
    }
}

//! Run state, progress and notifications
//!
//! The orchestrator owns a [`RunReporter`]; observers hold the matching
//! [`RunObserver`]. State and progress are `watch` channels (only the latest
//! value matters), notifications are an unbounded queue so none is lost.

use serde::Serialize;
use tokio::sync::{mpsc, watch};

/// Orchestration state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Initializing,
    FundingWallets,
    /// 1-based wallet index
    LaunchingToken { index: usize, total: usize },
    StoringRecord,
    SweepingBack,
    Done,
    Failed { error: String },
}

/// Latest progress snapshot, overwritten on every step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
    pub status: String,
}

impl ProgressState {
    pub fn new(current: usize, total: usize, status: impl Into<String>) -> Self {
        Self {
            current,
            total,
            status: status.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    /// 1-based wallet index when the message concerns a single wallet
    pub wallet: Option<usize>,
    pub message: String,
}

/// Publishing side held by the orchestrator
#[derive(Debug, Clone)]
pub struct RunReporter {
    state: watch::Sender<RunState>,
    progress: watch::Sender<ProgressState>,
    notifications: mpsc::UnboundedSender<Notification>,
}

/// Observing side
#[derive(Debug)]
pub struct RunObserver {
    pub state: watch::Receiver<RunState>,
    pub progress: watch::Receiver<ProgressState>,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl RunObserver {
    /// Every notification queued so far
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            drained.push(n);
        }
        drained
    }
}

impl RunReporter {
    pub fn channel() -> (RunReporter, RunObserver) {
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let (progress_tx, progress_rx) = watch::channel(ProgressState::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        (
            RunReporter {
                state: state_tx,
                progress: progress_tx,
                notifications: notify_tx,
            },
            RunObserver {
                state: state_rx,
                progress: progress_rx,
                notifications: notify_rx,
            },
        )
    }

    /// Reporter whose observer is dropped immediately
    pub fn detached() -> RunReporter {
        Self::channel().0
    }

    pub fn set_state(&self, state: RunState) {
        // send_replace never fails, even without receivers
        self.state.send_replace(state);
    }

    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    pub fn set_progress(&self, progress: ProgressState) {
        self.progress.send_replace(progress);
    }

    pub fn success(&self, wallet: Option<usize>, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, wallet, message.into());
    }

    pub fn error(&self, wallet: Option<usize>, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, wallet, message.into());
    }

    fn notify(&self, level: NotificationLevel, wallet: Option<usize>, message: String) {
        // A dropped observer is expected; the run never waits on listeners
        let _ = self.notifications.send(Notification {
            level,
            wallet,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_last_write_wins() {
        let (reporter, observer) = RunReporter::channel();
        reporter.set_progress(ProgressState::new(1, 3, "Processing wallet 1"));
        reporter.set_progress(ProgressState::new(2, 3, "Processing wallet 2"));

        assert_eq!(
            *observer.progress.borrow(),
            ProgressState::new(2, 3, "Processing wallet 2")
        );
    }

    #[test]
    fn test_notifications_are_queued() {
        let (reporter, mut observer) = RunReporter::channel();
        reporter.success(Some(1), "Processed wallet 1");
        reporter.error(Some(2), "Failed to process wallet 2");

        let drained = observer.drain_notifications();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].level, NotificationLevel::Error);
        assert_eq!(drained[1].wallet, Some(2));
    }

    #[test]
    fn test_detached_reporter_does_not_fail() {
        let reporter = RunReporter::detached();
        reporter.set_state(RunState::Done);
        reporter.error(None, "nobody listening");
        assert_eq!(reporter.state(), RunState::Done);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(RunState::LaunchingToken { index: 2, total: 5 }).unwrap();
        assert_eq!(json["state"], "launching_token");
        assert_eq!(json["index"], 2);

        let json = serde_json::to_value(RunState::Failed {
            error: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["error"], "x");
    }
}

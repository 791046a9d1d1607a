use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::message::CommandMessage;
use crate::commands::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug)]
struct WatchdogState {
    status: WatchdogStatus,
    response: Option<CommandMessage>,
}

/// Tracks one in-flight request and hands its response to the waiting caller.
///
/// The deadline is fixed when the watchdog is created. If no response arrives by
/// then, the caller receives the original message with its context failed by a
/// timeout cause; a late response is ignored.
#[derive(Debug)]
pub struct MessageWatchdog {
    original: CommandMessage,
    state: Mutex<WatchdogState>,
    completed: Notify,
    timeout: Duration,
    poll_interval: Duration,
    created_at: Instant,
}

impl MessageWatchdog {
    pub fn new(original: CommandMessage, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            original,
            state: Mutex::new(WatchdogState {
                status: WatchdogStatus::InProgress,
                response: None,
            }),
            completed: Notify::new(),
            timeout,
            poll_interval,
            created_at: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.original.correlation_id
    }

    pub fn status(&self) -> WatchdogStatus {
        self.state.lock().status
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Deliver the response. Returns false when the watchdog already expired or completed.
    pub fn complete(&self, response: CommandMessage) -> bool {
        {
            let mut state = self.state.lock();
            if state.status != WatchdogStatus::InProgress {
                warn!(
                    correlation_id = %self.original.correlation_id,
                    status = ?state.status,
                    "Ignoring response for watchdog that is no longer waiting"
                );
                return false;
            }
            state.status = WatchdogStatus::Completed;
            state.response = Some(response);
        }
        self.completed.notify_waiters();
        true
    }

    /// Wait until the response arrives or the deadline passes
    pub async fn wait_for_message_complete(&self) -> CommandMessage {
        let deadline = self.created_at + self.timeout;

        loop {
            let notified = self.completed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(response) = self.completed_response() {
                return response;
            }

            let now = Instant::now();
            if now >= deadline {
                return self.expire();
            }

            let wait = (deadline - now).min(self.poll_interval);
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    fn completed_response(&self) -> Option<CommandMessage> {
        let state = self.state.lock();
        match state.status {
            WatchdogStatus::InProgress => None,
            _ => state.response.clone(),
        }
    }

    fn expire(&self) -> CommandMessage {
        let mut state = self.state.lock();
        if let Some(response) = state.response.clone() {
            return response;
        }

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut timed_out = self.original.clone();
        timed_out.context.fail_if_not_failed(CommandError::timeout(
            self.original.correlation_id.clone(),
            timeout_ms,
        ));

        debug!(
            correlation_id = %self.original.correlation_id,
            command_id = %self.original.command_id(),
            timeout_ms,
            "Watchdog expired"
        );

        state.status = WatchdogStatus::Expired;
        state.response = Some(timed_out.clone());
        timed_out
    }
}

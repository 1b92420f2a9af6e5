//! Task-status polling.
//!
//! DESIGN
//! ======
//! A [`TaskWatch`] owns one spawned timer task that asks a [`TaskSource`]
//! for the job's log snapshot every interval and publishes what it saw on
//! an unbounded channel. The first request goes out one full interval after
//! the watch starts; there is no backoff, jitter, or attempt cap. The loop
//! ends on its own after a terminal snapshot or a failed request, and the
//! watch aborts it when dropped, so a torn-down view never leaves a timer
//! running.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use records::{Id, TaskInfo};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::net::api::ApiClient;
use crate::net::dispatch::ApiError;

/// Where polled task snapshots come from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn task_info(&self, task_id: &Id) -> Result<TaskInfo, ApiError>;
}

#[async_trait]
impl TaskSource for ApiClient {
    async fn task_info(&self, task_id: &Id) -> Result<TaskInfo, ApiError> {
        ApiClient::task_info(self, task_id).await
    }
}

#[derive(Debug)]
pub enum PollEvent {
    /// Job still in progress.
    Update(TaskInfo),
    /// Completion marker or error logs seen. No further events follow.
    Finished(TaskInfo),
    /// The status request failed. No further events follow.
    Failed(ApiError),
}

/// Handle to a running poll loop for one task.
pub struct TaskWatch {
    task_id: Id,
    events: mpsc::UnboundedReceiver<PollEvent>,
    handle: JoinHandle<()>,
}

impl TaskWatch {
    /// Start polling `task_id` every `interval`.
    #[must_use]
    pub fn spawn(source: Arc<dyn TaskSource>, task_id: Id, interval: Duration) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let period = interval.max(Duration::from_millis(1));
        info!(%task_id, interval_secs = period.as_secs_f64(), "task poll started");
        let handle = tokio::spawn(poll_loop(source, task_id.clone(), period, tx));
        Self { task_id, events, handle }
    }

    #[must_use]
    pub fn task_id(&self) -> &Id {
        &self.task_id
    }

    /// Next published event, or `None` once the loop has ended.
    pub async fn next(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// True once the timer task is no longer running.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop polling now.
    pub fn cancel(self) {
        debug!(task_id = %self.task_id, "task poll cancelled");
    }
}

impl Drop for TaskWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn poll_loop(source: Arc<dyn TaskSource>, task_id: Id, period: Duration, tx: mpsc::UnboundedSender<PollEvent>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = tx.closed() => {
                debug!(%task_id, "task poll receiver dropped");
                break;
            }
            _ = ticker.tick() => {}
        }

        let event = match source.task_info(&task_id).await {
            Ok(info) if info.is_terminal() => {
                info!(%task_id, failed = info.error().is_some(), "task reached terminal state");
                PollEvent::Finished(info)
            }
            Ok(info) => PollEvent::Update(info),
            Err(error) => {
                warn!(%task_id, error = %error, "task poll request failed");
                PollEvent::Failed(error)
            }
        };

        let last = !matches!(event, PollEvent::Update(_));
        if tx.send(event).is_err() || last {
            break;
        }
    }
}

#[cfg(test)]
#[path = "poll_test.rs"]
mod tests;

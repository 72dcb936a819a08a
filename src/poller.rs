//! Async Task Poller
//!
//! Blocks the calling flow until a vendor-side task reaches a terminal state.
//! The wait schedule is jittered to avoid request storms and bounded by a
//! configurable deadline; deadline exhaustion while the task is still pending
//! surfaces as its own error kind so callers can decide to retry versus abort.

use crate::config::PollerConfig;
use crate::error::{Error, Result};
use crate::vcd::{TaskRef, TaskState, VcdApi, VcdApiRef};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Polls vendor tasks to completion
#[derive(Clone)]
pub struct TaskPoller {
    api: VcdApiRef,
    config: PollerConfig,
}

impl TaskPoller {
    pub fn new(api: VcdApiRef, config: PollerConfig) -> Self {
        Self { api, config }
    }

    /// Block until the task is terminal.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` when the vendor reports the
    /// task failed or aborted. A still-pending task past the deadline yields
    /// [`Error::DeadlineExceeded`]; a cancelled token yields
    /// [`Error::Cancelled`]. The caller must not proceed to a dependent step
    /// until this returns.
    pub async fn await_completion(
        &self,
        task: &TaskRef,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let mut schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.interval)
            .with_max_interval(self.config.interval)
            .with_multiplier(1.0)
            .with_randomization_factor(self.config.randomization_factor)
            .with_max_elapsed_time(Some(self.config.deadline))
            .build();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    task: task.id.clone(),
                });
            }

            let info = self.api.get_task(task).await?;
            match info.state {
                TaskState::Success => {
                    debug!("Task {} ({}) completed", task.id, task.operation);
                    return Ok(true);
                }
                TaskState::Error | TaskState::Aborted => {
                    warn!(
                        "Task {} ({}) failed: {}",
                        task.id,
                        task.operation,
                        info.detail.as_deref().unwrap_or("no detail")
                    );
                    return Ok(false);
                }
                TaskState::Queued | TaskState::Running => {}
            }

            let delay = match schedule.next_backoff() {
                Some(delay) => delay,
                None => {
                    return Err(Error::DeadlineExceeded {
                        task: task.id.clone(),
                    })
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::Cancelled { task: task.id.clone() });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

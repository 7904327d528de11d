//! ExpiryWorker - Background service that reclaims lapsed manual holds.
//!
//! Take-over schedules an expiry check for every hold; this worker polls
//! for due checks and runs them through the [`ExpireControlHandler`]:
//! 1. Take-over inserts a task (same transaction as the hold)
//! 2. **ExpiryWorker polls due tasks and settles them** ← This module
//!
//! Every check outcome consumes its task, including the quiet no-ops
//! (released in the meantime, replaced by a newer hold, extended). Only
//! a store failure leaves the task pending: it is postponed with growing
//! backoff and abandoned after too many attempts.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 1s | How often to check for due tasks |
//! | `batch_size` | 50 | Max tasks to settle per poll cycle |
//! | `retry_base` | 5s | First retry delay; doubles per attempt |
//! | `max_attempts` | 5 | Attempts before a task is abandoned |
//!
//! ## Graceful Shutdown
//!
//! The worker listens for a shutdown signal and completes the current
//! batch before stopping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use crate::application::handlers::handoff::{
    ExpireControlCommand, ExpireControlHandler, ExpireControlOutcome,
};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ConversationStore, DeliveryGateway, EventPublisher, ExpiryQueue};

/// Backoff doubles per attempt, capped at `retry_base * 2^6`.
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Configuration for the ExpiryWorker service.
#[derive(Debug, Clone)]
pub struct ExpiryWorkerConfig {
    /// How often to poll for due tasks.
    pub poll_interval: Duration,

    /// Maximum tasks to settle per poll cycle.
    pub batch_size: u32,

    /// Delay before the first retry of a failed check.
    pub retry_base: Duration,

    /// Attempts before a failing task is abandoned.
    pub max_attempts: u32,
}

impl Default for ExpiryWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 50,
            retry_base: Duration::from_secs(5),
            max_attempts: 5,
        }
    }
}

impl ExpiryWorkerConfig {
    /// Create config with custom poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create config with custom batch size.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }

    /// Create config with custom retry base delay.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Create config with custom attempt limit.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Background service that settles due expiry checks.
pub struct ExpiryWorker<Q, S, G, P>
where
    Q: ExpiryQueue,
    S: ConversationStore,
    G: DeliveryGateway,
    P: EventPublisher,
{
    queue: Arc<Q>,
    handler: ExpireControlHandler<S, G, P>,
    config: ExpiryWorkerConfig,
}

impl<Q, S, G, P> ExpiryWorker<Q, S, G, P>
where
    Q: ExpiryQueue + 'static,
    S: ConversationStore + 'static,
    G: DeliveryGateway + 'static,
    P: EventPublisher + 'static,
{
    /// Create a new ExpiryWorker with default configuration.
    pub fn new(queue: Arc<Q>, handler: ExpireControlHandler<S, G, P>) -> Self {
        Self {
            queue,
            handler,
            config: ExpiryWorkerConfig::default(),
        }
    }

    /// Create a new ExpiryWorker with custom configuration.
    pub fn with_config(
        queue: Arc<Q>,
        handler: ExpireControlHandler<S, G, P>,
        config: ExpiryWorkerConfig,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Run the worker loop until the shutdown signal is received.
    ///
    /// A failed poll is logged and retried on the next tick; it never
    /// stops the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Expiry worker started"
        );

        let mut interval = time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                // Check for shutdown signal
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        // Shutdown requested - settle one final batch then exit
                        if let Err(e) = self.process_batch().await {
                            tracing::warn!(error = %e, "Final expiry poll failed during shutdown");
                        }
                        tracing::info!("Expiry worker stopped");
                        return;
                    }
                }

                // Poll interval elapsed
                _ = interval.tick() => {
                    if let Err(e) = self.process_batch().await {
                        tracing::warn!(error = %e, "Expiry poll failed; retrying next tick");
                    }
                }
            }
        }
    }

    /// Settle a single batch of due tasks.
    ///
    /// Returns the number of tasks consumed. Tasks whose check failed
    /// stay pending (postponed) or get abandoned, and do not count.
    pub async fn process_batch(&self) -> Result<usize, DomainError> {
        let now = Timestamp::now();
        let tasks = self.queue.due(now, self.config.batch_size).await?;
        let mut settled = 0;

        for task in tasks {
            match self.handler.handle(ExpireControlCommand::from_task(&task)).await {
                Ok(outcome) => {
                    self.queue.complete(&task.id).await?;
                    settled += 1;

                    match &outcome {
                        ExpireControlOutcome::Released {
                            holder_id,
                            held_minutes,
                        } => {
                            tracing::info!(
                                conversation_id = %task.conversation_id,
                                holder_id = %holder_id,
                                held_minutes = *held_minutes,
                                "Reclaimed expired hold"
                            );
                        }
                        other => {
                            tracing::debug!(
                                conversation_id = %task.conversation_id,
                                outcome = ?other,
                                "Expiry check settled without release"
                            );
                        }
                    }
                }
                Err(e) => {
                    if task.attempts + 1 >= self.config.max_attempts {
                        tracing::error!(
                            task_id = %task.id,
                            conversation_id = %task.conversation_id,
                            attempts = task.attempts + 1,
                            error = %e,
                            "Giving up on expiry check"
                        );
                        self.queue.abandon(&task.id, &e.to_string()).await?;
                    } else {
                        let delay = retry_delay(self.config.retry_base, task.attempts);
                        let retry_at = Timestamp::now().plus_secs(delay.as_secs() as i64);
                        tracing::warn!(
                            task_id = %task.id,
                            conversation_id = %task.conversation_id,
                            retry_in_secs = delay.as_secs(),
                            error = %e,
                            "Expiry check failed; postponed"
                        );
                        self.queue.postpone(&task.id, retry_at, &e.to_string()).await?;
                    }
                }
            }
        }

        Ok(settled)
    }

    /// Run exactly one poll cycle (for testing).
    pub async fn poll_once(&self) -> Result<usize, DomainError> {
        self.process_batch().await
    }
}

/// Delay before retrying a task that has already failed `attempts` times.
fn retry_delay(base: Duration, attempts: u32) -> Duration {
    base * 2u32.saturating_pow(attempts.min(MAX_BACKOFF_DOUBLINGS))
}

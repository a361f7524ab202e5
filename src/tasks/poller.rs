use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::NotificationConfig;
use crate::notification::NotificationQueue;

/// Background task that drives notification queue passes
pub struct QueuePoller {
    config: NotificationConfig,
    queue: Arc<NotificationQueue>,
    shutdown: broadcast::Receiver<()>,
}

impl QueuePoller {
    pub fn new(
        config: NotificationConfig,
        queue: Arc<NotificationQueue>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            queue,
            shutdown,
        }
    }

    /// Run passes on every tick or wakeup until shutdown is signalled
    pub async fn run(mut self) {
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs.max(1));
        let cleanup_interval = Duration::from_secs(self.config.cleanup_interval_secs.max(1));

        let mut poll_timer = tokio::time::interval(poll_interval);
        let mut cleanup_timer = tokio::time::interval(cleanup_interval);

        // Skip immediate first tick
        poll_timer.tick().await;
        cleanup_timer.tick().await;

        tracing::info!(
            poll_interval_secs = self.config.poll_interval_secs,
            cleanup_interval_secs = self.config.cleanup_interval_secs,
            retention_secs = self.config.retention_secs,
            "Notification poller started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Notification poller received shutdown signal");
                    break;
                }
                _ = poll_timer.tick() => {
                    self.run_pass().await;
                }
                _ = self.queue.wait_for_work() => {
                    self.run_pass().await;
                }
                _ = cleanup_timer.tick() => {
                    self.queue.evict_expired(Utc::now());
                }
            }
        }

        tracing::info!("Notification poller stopped");
    }

    async fn run_pass(&self) {
        match self.queue.process_queue().await {
            Some(summary) if summary.attempted > 0 => {
                tracing::debug!(?summary, "Poller pass finished");
            }
            Some(_) => {}
            None => tracing::debug!("Poller pass skipped, another pass is running"),
        }
    }
}

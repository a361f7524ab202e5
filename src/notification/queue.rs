//! In-memory notification job queue.
//!
//! Jobs are keyed by id in a `DashMap`. A processing pass selects eligible
//! jobs in enqueue order and attempts them one at a time; only one pass runs
//! at any moment. Failed channels are retried with exponential backoff until
//! `maxAttempts` is reached, except for permanent failures which end the job
//! straight away. Sent and failed jobs stay inspectable until the retention
//! sweep removes them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::metrics::QueueMetrics;

use super::backoff::RetryBackoff;
use super::template::TemplateRegistry;
use super::transport::{EmailMessage, EmailTransport, SmsMessage, SmsTransport};
use super::types::{
    Channel, ChannelDeliveries, ChannelState, DeliveryError, ErrorKind, JobStatus, NewJob,
    NotificationJob, NotificationType,
};

/// Rejections at enqueue time. Nothing is stored when these occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    #[error("Template is required")]
    MissingTemplate,

    #[error("Email address required for email notifications")]
    MissingEmail,

    #[error("Phone number required for SMS notifications")]
    MissingPhone,

    #[error("Email address or phone number required")]
    MissingContact,

    #[error("maxAttempts must be between 1 and {limit}")]
    InvalidMaxAttempts { limit: u32 },
}

/// Queue tuning derived from [`NotificationConfig`]
#[derive(Debug, Clone)]
struct QueueSettings {
    pub default_max_attempts: u32,
    pub max_attempts_limit: u32,
    pub max_retained_jobs: usize,
    pub retention: Duration,
    pub delivery_timeout: std::time::Duration,
    pub from_address: String,
    pub from_name: String,
}

impl From<&NotificationConfig> for QueueSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            default_max_attempts: config.default_max_attempts.max(1),
            max_attempts_limit: config.max_attempts_limit.max(1),
            max_retained_jobs: config.max_retained_jobs,
            retention: Duration::seconds(config.retention_secs as i64),
            delivery_timeout: std::time::Duration::from_secs(config.delivery_timeout_secs.max(1)),
            from_address: config.from_address.clone(),
            from_name: config.from_name.clone(),
        }
    }
}

/// Result of one processing pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub attempted: usize,
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub scheduled: usize,
    pub sent: usize,
    pub failed: usize,
    pub processing: bool,
}

/// Filter for [`NotificationQueue::jobs`]
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<NotificationJob>,
    /// Matching jobs before truncation
    pub total: usize,
}

/// Holds the processing flag for the lifetime of a pass.
struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct NotificationQueue {
    jobs: DashMap<String, NotificationJob>,
    next_seq: AtomicU64,
    processing: AtomicBool,
    wakeup: Notify,
    templates: TemplateRegistry,
    email: Arc<dyn EmailTransport>,
    sms: Arc<dyn SmsTransport>,
    backoff: RetryBackoff,
    settings: QueueSettings,
}

impl NotificationQueue {
    pub fn new(
        config: &NotificationConfig,
        email: Arc<dyn EmailTransport>,
        sms: Arc<dyn SmsTransport>,
    ) -> Self {
        Self {
            jobs: DashMap::new(),
            next_seq: AtomicU64::new(0),
            processing: AtomicBool::new(false),
            wakeup: Notify::new(),
            templates: TemplateRegistry::builtin(),
            email,
            sms,
            backoff: RetryBackoff::new(config.backoff.clone()),
            settings: QueueSettings::from(config),
        }
    }

    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Resolves once new work was signalled (enqueue or retry).
    pub async fn wait_for_work(&self) {
        self.wakeup.notified().await;
    }

    pub fn enqueue(&self, new_job: NewJob) -> Result<String, EnqueueError> {
        self.enqueue_at(new_job, Utc::now())
    }

    /// Validate and store a job, then wake the processing loop.
    pub fn enqueue_at(&self, new_job: NewJob, now: DateTime<Utc>) -> Result<String, EnqueueError> {
        validate(&new_job, &self.settings)?;
        if !self.templates.contains(&new_job.template) {
            // Accepted anyway; the first attempt fails it permanently
            tracing::warn!(template = %new_job.template, "Enqueued job uses an unknown template");
        }

        let max_attempts = new_job
            .max_attempts
            .unwrap_or(self.settings.default_max_attempts);
        let status = match new_job.scheduled_for {
            Some(at) if at > now => JobStatus::Scheduled,
            _ => JobStatus::Pending,
        };

        self.make_room();

        let id = format!("notif_{}", Uuid::new_v4().simple());
        let job = NotificationJob {
            id: id.clone(),
            kind: new_job.kind,
            template: new_job.template,
            recipient: new_job.recipient,
            data: new_job.data,
            scheduled_for: new_job.scheduled_for,
            attempts: 0,
            max_attempts,
            status,
            channels: ChannelDeliveries::for_type(new_job.kind),
            created_at: now,
            last_attempt: None,
            next_attempt_at: None,
            error: None,
            error_kind: None,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        tracing::info!(
            job_id = %id,
            kind = job.kind.as_str(),
            template = %job.template,
            status = job.status.as_str(),
            scheduled_for = ?job.scheduled_for,
            "Notification job enqueued"
        );

        QueueMetrics::record_enqueued(job.kind.as_str());
        self.jobs.insert(id.clone(), job);
        self.wakeup.notify_one();

        Ok(id)
    }

    pub async fn process_queue(&self) -> Option<PassSummary> {
        self.process_due(Utc::now()).await
    }

    /// Attempt every job eligible at `now`, oldest first.
    ///
    /// Returns `None` without doing anything when another pass is running.
    pub async fn process_due(&self, now: DateTime<Utc>) -> Option<PassSummary> {
        let Some(_guard) = ProcessingGuard::acquire(&self.processing) else {
            tracing::debug!("Queue pass already in progress, skipping");
            return None;
        };

        let start = Instant::now();

        let mut due: Vec<(u64, String)> = self
            .jobs
            .iter()
            .filter(|entry| entry.is_eligible(now))
            .map(|entry| (entry.seq, entry.id.clone()))
            .collect();
        due.sort_unstable();

        let mut summary = PassSummary::default();
        for (_, id) in due {
            let Some(status) = self.execute_job(&id, now).await else {
                continue;
            };
            summary.attempted += 1;
            match status {
                JobStatus::Sent => summary.sent += 1,
                JobStatus::Failed => summary.failed += 1,
                JobStatus::Pending | JobStatus::Scheduled => summary.retrying += 1,
            }
        }

        QueueMetrics::record_pass_duration(start.elapsed().as_secs_f64());
        if summary.attempted > 0 {
            tracing::info!(
                attempted = summary.attempted,
                sent = summary.sent,
                retrying = summary.retrying,
                failed = summary.failed,
                duration_ms = start.elapsed().as_millis() as u64,
                "Notification queue pass completed"
            );
        }

        Some(summary)
    }

    /// One delivery attempt for one job; returns the job's resulting status.
    async fn execute_job(&self, id: &str, now: DateTime<Utc>) -> Option<JobStatus> {
        let snapshot = {
            let mut job = self.jobs.get_mut(id)?;
            if !job.is_eligible(now) {
                return None;
            }
            job.attempts += 1;
            job.last_attempt = Some(now);
            job.value().clone()
        };

        let mut results = Vec::new();
        for channel in snapshot.channels.pending() {
            let result = self.deliver(&snapshot, channel).await;
            let label = match &result {
                Ok(()) => "sent",
                Err(e) if e.is_permanent() => "permanent",
                Err(_) => "transient",
            };
            QueueMetrics::record_attempt(channel.as_str(), label);
            results.push((channel, result));
        }

        let mut job = self.jobs.get_mut(id)?;
        let mut errors = Vec::new();
        let mut any_permanent = false;

        for (channel, result) in results {
            match result {
                Ok(()) => job.channels.set(channel, ChannelState::Sent),
                Err(err) => {
                    if err.is_permanent() {
                        any_permanent = true;
                        job.channels.set(channel, ChannelState::Failed);
                    }
                    errors.push(format!("{channel}: {err}"));
                }
            }
        }

        if job.channels.all_sent() {
            job.status = JobStatus::Sent;
            job.error = None;
            job.error_kind = None;
            job.next_attempt_at = None;
            QueueMetrics::record_completed("sent");
            tracing::info!(job_id = %job.id, attempts = job.attempts, "Notification sent");
            return Some(JobStatus::Sent);
        }

        job.error = Some(errors.join("; "));
        let retryable = !job.channels.pending().is_empty() && job.attempts < job.max_attempts;

        if retryable {
            let delay = self.backoff.delay_after(job.attempts);
            job.status = JobStatus::Pending;
            job.error_kind = Some(ErrorKind::Transient);
            job.next_attempt_at = Some(now + delay);
            tracing::warn!(
                job_id = %job.id,
                attempt = job.attempts,
                max_attempts = job.max_attempts,
                retry_in_secs = delay.num_seconds(),
                error = ?job.error,
                "Notification attempt failed, will retry"
            );
            Some(JobStatus::Pending)
        } else {
            for channel in job.channels.pending() {
                job.channels.set(channel, ChannelState::Failed);
            }
            job.status = JobStatus::Failed;
            job.error_kind = Some(if any_permanent {
                ErrorKind::Permanent
            } else {
                ErrorKind::Transient
            });
            job.next_attempt_at = None;
            QueueMetrics::record_completed("failed");
            tracing::error!(
                job_id = %job.id,
                attempts = job.attempts,
                error_kind = ?job.error_kind,
                error = ?job.error,
                "Notification failed"
            );
            Some(JobStatus::Failed)
        }
    }

    async fn deliver(&self, job: &NotificationJob, channel: Channel) -> Result<(), DeliveryError> {
        let address = job.recipient.address(channel).ok_or_else(|| {
            DeliveryError::permanent(match channel {
                Channel::Email => "No email address provided",
                Channel::Sms => "No phone number provided",
            })
        })?;
        let rendered = self.templates.render(&job.template, channel, &job.data)?;

        let send = async {
            match channel {
                Channel::Email => {
                    let message = EmailMessage {
                        from: format!("\"{}\" <{}>", self.settings.from_name, self.settings.from_address),
                        to: address.to_string(),
                        subject: rendered.subject.unwrap_or_default(),
                        html: rendered.body,
                    };
                    self.email.send(&message).await
                }
                Channel::Sms => {
                    let message = SmsMessage {
                        to: address.to_string(),
                        body: rendered.body,
                    };
                    self.sms.send(&message).await
                }
            }
        };

        let timeout = self.settings.delivery_timeout;
        match tokio::time::timeout(timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::transient(format!(
                "delivery timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Reset a failed job to pending with a fresh attempt budget.
    ///
    /// Channels that were already delivered are not sent again. Returns
    /// `false` when the job is unknown or not failed.
    pub fn retry_failed_job(&self, id: &str) -> bool {
        {
            let Some(mut job) = self.jobs.get_mut(id) else {
                return false;
            };
            if job.status != JobStatus::Failed {
                return false;
            }

            job.status = JobStatus::Pending;
            job.attempts = 0;
            job.error = None;
            job.error_kind = None;
            job.next_attempt_at = None;
            job.channels.reset_failed();
        }

        tracing::info!(job_id = %id, "Failed notification reset for retry");
        self.wakeup.notify_one();
        true
    }

    pub fn job(&self, id: &str) -> Option<NotificationJob> {
        self.jobs.get(id).map(|job| job.value().clone())
    }

    /// Snapshot of jobs in enqueue order
    pub fn jobs(&self, filter: &JobFilter) -> Vec<NotificationJob> {
        self.page(filter).jobs
    }

    /// Like [`jobs`](Self::jobs), also reporting how many jobs matched
    /// before the limit was applied.
    pub fn page(&self, filter: &JobFilter) -> JobPage {
        let mut jobs: Vec<NotificationJob> = self
            .jobs
            .iter()
            .filter(|job| filter.status.map_or(true, |s| job.status == s))
            .map(|job| job.value().clone())
            .collect();
        jobs.sort_unstable_by_key(|job| job.seq);

        let total = jobs.len();
        if let Some(limit) = filter.limit {
            jobs.truncate(limit);
        }
        JobPage { jobs, total }
    }

    pub fn all_jobs(&self) -> Vec<NotificationJob> {
        self.jobs(&JobFilter::default())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            processing: self.is_processing(),
            ..Default::default()
        };

        for job in self.jobs.iter() {
            stats.total += 1;
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Scheduled => stats.scheduled += 1,
                JobStatus::Sent => stats.sent += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }

        stats
    }

    /// Drop sent/failed jobs that finished more than the retention period ago.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = self.settings.retention;
        let before = self.jobs.len();

        self.jobs.retain(|_, job| match job.finished_at() {
            Some(finished) => finished + retention > now,
            None => true,
        });

        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            QueueMetrics::record_evicted(removed as u64);
            tracing::info!(
                removed = removed,
                remaining = self.jobs.len(),
                "Evicted finished notification jobs"
            );
        }
        removed
    }

    /// Evict the oldest finished jobs when the store is at capacity.
    fn make_room(&self) {
        let capacity = self.settings.max_retained_jobs;
        let len = self.jobs.len();
        if capacity == 0 || len < capacity {
            return;
        }

        let mut finished: Vec<(DateTime<Utc>, u64, String)> = self
            .jobs
            .iter()
            .filter_map(|job| job.finished_at().map(|at| (at, job.seq, job.id.clone())))
            .collect();

        if finished.is_empty() {
            tracing::warn!(
                jobs = len,
                capacity = capacity,
                "Notification queue at capacity with no finished jobs to evict"
            );
            return;
        }

        finished.sort_unstable();
        let excess = len + 1 - capacity;
        let mut removed = 0;
        for (_, _, id) in finished.into_iter().take(excess) {
            if self.jobs.remove(&id).is_some() {
                removed += 1;
            }
        }

        QueueMetrics::record_evicted(removed as u64);
        tracing::debug!(removed = removed, "Evicted finished jobs to make room");
    }
}

fn validate(job: &NewJob, settings: &QueueSettings) -> Result<(), EnqueueError> {
    if job.template.trim().is_empty() {
        return Err(EnqueueError::MissingTemplate);
    }

    let has_email = job.recipient.address(Channel::Email).is_some();
    let has_phone = job.recipient.address(Channel::Sms).is_some();
    match job.kind {
        NotificationType::Email if !has_email => return Err(EnqueueError::MissingEmail),
        NotificationType::Sms if !has_phone => return Err(EnqueueError::MissingPhone),
        NotificationType::Both if !has_email && !has_phone => {
            return Err(EnqueueError::MissingContact)
        }
        _ => {}
    }

    if let Some(max) = job.max_attempts {
        if max == 0 || max > settings.max_attempts_limit {
            return Err(EnqueueError::InvalidMaxAttempts {
                limit: settings.max_attempts_limit,
            });
        }
    }

    Ok(())
}

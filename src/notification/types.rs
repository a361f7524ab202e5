//! Notification job types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Delivery channel of a single send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channels a job targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Email,
    Sms,
    Both,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Sms => "sms",
            NotificationType::Both => "both",
        }
    }

    pub fn channels(&self) -> &'static [Channel] {
        match self {
            NotificationType::Email => &[Channel::Email],
            NotificationType::Sms => &[Channel::Sms],
            NotificationType::Both => &[Channel::Email, Channel::Sms],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub name: String,
}

impl Recipient {
    /// Address for `channel`, ignoring blank values
    pub fn address(&self, channel: Channel) -> Option<&str> {
        let value = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Sms => self.phone.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Sent,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::Sent,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Sent => "sent",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Sent | JobStatus::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "scheduled" => Ok(JobStatus::Scheduled),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Delivery state of one channel of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Pending,
    Sent,
    Failed,
}

/// Per-channel progress; a channel the job does not target stays `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDeliveries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<ChannelState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms: Option<ChannelState>,
}

impl ChannelDeliveries {
    pub fn for_type(kind: NotificationType) -> Self {
        let mut deliveries = Self::default();
        for channel in kind.channels() {
            deliveries.set(*channel, ChannelState::Pending);
        }
        deliveries
    }

    pub fn get(&self, channel: Channel) -> Option<ChannelState> {
        match channel {
            Channel::Email => self.email,
            Channel::Sms => self.sms,
        }
    }

    pub fn set(&mut self, channel: Channel, state: ChannelState) {
        match channel {
            Channel::Email => self.email = Some(state),
            Channel::Sms => self.sms = Some(state),
        }
    }

    /// Channels still waiting for a successful send
    pub fn pending(&self) -> Vec<Channel> {
        [Channel::Email, Channel::Sms]
            .into_iter()
            .filter(|c| self.get(*c) == Some(ChannelState::Pending))
            .collect()
    }

    fn targeted(&self) -> impl Iterator<Item = ChannelState> {
        [self.email, self.sms].into_iter().flatten()
    }

    pub fn all_sent(&self) -> bool {
        self.targeted().all(|s| s == ChannelState::Sent)
    }

    pub fn any_failed(&self) -> bool {
        self.targeted().any(|s| s == ChannelState::Failed)
    }

    /// Put failed channels back to pending; sent channels stay sent.
    pub fn reset_failed(&mut self) {
        for state in [&mut self.email, &mut self.sms].into_iter().flatten() {
            if *state == ChannelState::Failed {
                *state = ChannelState::Pending;
            }
        }
    }
}

/// Whether a failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Will fail the same way every time (unknown template, missing address)
    Permanent,
    /// Transport trouble that may clear up (network, provider outage, timeout)
    Transient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DeliveryError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DeliveryError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == ErrorKind::Permanent
    }
}

/// Input to [`NotificationQueue::enqueue`](super::NotificationQueue::enqueue)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    pub template: String,
    pub recipient: Recipient,
    pub data: serde_json::Value,
    #[serde(default, deserialize_with = "deserialize_schedule")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Parse a schedule timestamp. Offset-less times and bare dates are UTC.
pub fn parse_schedule(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(input, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

pub fn deserialize_schedule<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_schedule(&raw).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "scheduledFor must be an ISO 8601 timestamp, got '{raw}'"
            ))
        }),
    }
}

/// A notification job as held by the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationJob {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub template: String,
    pub recipient: Recipient,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: JobStatus,
    pub channels: ChannelDeliveries,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    /// Earliest time of the next retry after a transient failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Enqueue order
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl NotificationJob {
    /// Whether a processing pass at `now` should attempt this job
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Scheduled)
            && self.scheduled_for.map_or(true, |at| at <= now)
            && self.next_attempt_at.map_or(true, |at| at <= now)
            && self.attempts < self.max_attempts
    }

    /// Time this job reached a terminal status
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        if self.status.is_terminal() {
            self.last_attempt.or(Some(self.created_at))
        } else {
            None
        }
    }
}

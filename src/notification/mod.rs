//! Email/SMS notification delivery.
//!
//! Producers enqueue [`NewJob`]s on the [`NotificationQueue`]; a background
//! poller drives processing passes that render the job's template and hand
//! the result to the configured transports.

mod backoff;
mod queue;
mod service;
mod template;
mod transport;
mod types;

pub use backoff::RetryBackoff;
pub use queue::{EnqueueError, JobFilter, JobPage, NotificationQueue, PassSummary, QueueStats};
pub use service::{BookingDetails, CheckInReminder, HotelStatusUpdate, NotificationService, RoomReady};
pub use template::{
    substitute, EmailTemplate, RenderedMessage, TemplateEntry, TemplateError, TemplateRegistry,
};
pub use transport::{
    EmailMessage, EmailTransport, HttpEmailTransport, LogEmailTransport, LogSmsTransport,
    SmsMessage, SmsTransport,
};
pub use types::{
    deserialize_schedule, parse_schedule, Channel, ChannelDeliveries, ChannelState, DeliveryError, ErrorKind, JobStatus, NewJob,
    NotificationJob, NotificationType, Recipient,
};

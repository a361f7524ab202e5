//! Typed producers for the built-in notification templates.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use super::queue::{EnqueueError, NotificationQueue};
use super::types::{Channel, NewJob, NotificationType, Recipient};

const MAX_ATTEMPTS: u32 = 3;
const REMINDER_HOUR: u32 = 10;

#[derive(Debug, Clone)]
pub struct BookingDetails {
    pub booking_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub hotel_name: String,
    pub room_type: String,
    pub room_number: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub adults: u32,
    pub children: u32,
    pub total_amount: u64,
}

#[derive(Debug, Clone)]
pub struct CheckInReminder {
    pub booking_id: String,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub hotel_name: String,
    pub hotel_address: String,
    pub hotel_phone: String,
    pub room_type: String,
    pub room_number: String,
    pub check_in: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct RoomReady {
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub hotel_name: String,
    pub room_type: String,
    pub room_number: String,
    pub floor: i32,
}

#[derive(Debug, Clone)]
pub struct HotelStatusUpdate {
    pub hotel_name: String,
    pub old_status: String,
    pub new_status: String,
    pub updated_by: String,
    pub notes: Option<String>,
    pub admin_email: String,
    pub updated_at: DateTime<Utc>,
}

/// Enqueues guest and admin notifications with the right template and channels.
#[derive(Clone)]
pub struct NotificationService {
    queue: Arc<NotificationQueue>,
}

impl NotificationService {
    pub fn new(queue: Arc<NotificationQueue>) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &Arc<NotificationQueue> {
        &self.queue
    }

    pub fn send_booking_confirmation(&self, booking: &BookingDetails) -> Result<String, EnqueueError> {
        let recipient = guest(&booking.guest_name, &booking.guest_email, &booking.guest_phone);
        self.queue.enqueue(NewJob {
            kind: guest_channels(&recipient),
            template: "booking_confirmation".into(),
            recipient,
            data: json!({
                "bookingId": booking.booking_id,
                "guestName": booking.guest_name,
                "hotelName": booking.hotel_name,
                "roomType": booking.room_type,
                "roomNumber": booking.room_number,
                "checkIn": booking.check_in.to_string(),
                "checkOut": booking.check_out.to_string(),
                "nights": booking.nights,
                "adults": booking.adults,
                "children": booking.children,
                "totalAmount": booking.total_amount,
            }),
            scheduled_for: None,
            max_attempts: Some(MAX_ATTEMPTS),
        })
    }

    /// Scheduled for 10:00 UTC on the day before check-in.
    pub fn send_check_in_reminder(&self, reminder: &CheckInReminder) -> Result<String, EnqueueError> {
        let recipient = guest(&reminder.guest_name, &reminder.guest_email, &reminder.guest_phone);
        self.queue.enqueue(NewJob {
            kind: guest_channels(&recipient),
            template: "booking_reminder".into(),
            recipient,
            data: json!({
                "bookingId": reminder.booking_id,
                "guestName": reminder.guest_name,
                "hotelName": reminder.hotel_name,
                "hotelAddress": reminder.hotel_address,
                "hotelPhone": reminder.hotel_phone,
                "roomType": reminder.room_type,
                "roomNumber": reminder.room_number,
                "checkIn": reminder.check_in.to_string(),
            }),
            scheduled_for: reminder_time(reminder.check_in),
            max_attempts: Some(MAX_ATTEMPTS),
        })
    }

    pub fn send_room_ready(&self, room: &RoomReady) -> Result<String, EnqueueError> {
        let recipient = guest(&room.guest_name, &room.guest_email, &room.guest_phone);
        self.queue.enqueue(NewJob {
            kind: guest_channels(&recipient),
            template: "room_ready".into(),
            recipient,
            data: json!({
                "guestName": room.guest_name,
                "hotelName": room.hotel_name,
                "roomType": room.room_type,
                "roomNumber": room.room_number,
                "floor": room.floor,
            }),
            scheduled_for: None,
            max_attempts: Some(MAX_ATTEMPTS),
        })
    }

    pub fn send_hotel_status_update(&self, update: &HotelStatusUpdate) -> Result<String, EnqueueError> {
        self.queue.enqueue(NewJob {
            kind: NotificationType::Email,
            template: "status_update".into(),
            recipient: Recipient {
                email: Some(update.admin_email.clone()),
                phone: None,
                name: "Hotel Administrator".into(),
            },
            data: json!({
                "hotelName": update.hotel_name,
                "oldStatus": update.old_status,
                "newStatus": update.new_status,
                "updatedBy": update.updated_by,
                "updatedAt": update.updated_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                "notes": update.notes,
            }),
            scheduled_for: None,
            max_attempts: Some(MAX_ATTEMPTS),
        })
    }
}

fn guest(name: &str, email: &str, phone: &Option<String>) -> Recipient {
    Recipient {
        email: Some(email.to_string()),
        phone: phone.clone(),
        name: name.to_string(),
    }
}

/// Email always; SMS too when the guest left a phone number.
fn guest_channels(recipient: &Recipient) -> NotificationType {
    match recipient.address(Channel::Sms) {
        Some(_) => NotificationType::Both,
        None => NotificationType::Email,
    }
}

fn reminder_time(check_in: NaiveDate) -> Option<DateTime<Utc>> {
    check_in
        .pred_opt()
        .and_then(|day| day.and_hms_opt(REMINDER_HOUR, 0, 0))
        .map(|at| at.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use crate::notification::transport::{LogEmailTransport, LogSmsTransport};
    use crate::notification::types::JobStatus;
    use chrono::{Duration, TimeZone};

    fn service() -> NotificationService {
        let queue = NotificationQueue::new(
            &NotificationConfig::default(),
            Arc::new(LogEmailTransport),
            Arc::new(LogSmsTransport),
        );
        NotificationService::new(Arc::new(queue))
    }

    fn booking() -> BookingDetails {
        BookingDetails {
            booking_id: "BK-1001".into(),
            guest_name: "Ada Obi".into(),
            guest_email: "ada@example.com".into(),
            guest_phone: Some("+2347077775545".into()),
            hotel_name: "Eko Hotel".into(),
            room_type: "Deluxe".into(),
            room_number: "305".into(),
            check_in: NaiveDate::from_ymd_opt(2030, 3, 10).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2030, 3, 12).unwrap(),
            nights: 2,
            adults: 2,
            children: 0,
            total_amount: 170_000,
        }
    }

    #[tokio::test]
    async fn test_booking_confirmation_targets_both_channels() {
        let service = service();
        let id = service.send_booking_confirmation(&booking()).unwrap();

        let job = service.queue().job(&id).unwrap();
        assert_eq!(job.kind, NotificationType::Both);
        assert_eq!(job.template, "booking_confirmation");
        assert_eq!(job.max_attempts, 3);
        assert_eq!(job.data["totalAmount"], 170_000);

        service.queue().process_queue().await.unwrap();
        assert_eq!(service.queue().job(&id).unwrap().status, JobStatus::Sent);
    }

    #[test]
    fn test_reminder_scheduled_day_before_at_ten() {
        let at = reminder_time(NaiveDate::from_ymd_opt(2030, 3, 1).unwrap()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2030, 2, 28, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_reminder_waits_until_scheduled() {
        let service = service();
        let b = booking();
        let id = service
            .send_check_in_reminder(&CheckInReminder {
                booking_id: b.booking_id,
                guest_name: b.guest_name,
                guest_email: b.guest_email,
                guest_phone: b.guest_phone,
                hotel_name: b.hotel_name,
                hotel_address: "Plot 1415 Adetokunbo Ademola St".into(),
                hotel_phone: "+234 1 277 2700".into(),
                room_type: b.room_type,
                room_number: b.room_number,
                check_in: b.check_in,
            })
            .unwrap();

        let job = service.queue().job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);

        let scheduled = job.scheduled_for.unwrap();
        service.queue().process_due(scheduled - Duration::minutes(1)).await.unwrap();
        assert_eq!(service.queue().job(&id).unwrap().status, JobStatus::Scheduled);

        service.queue().process_due(scheduled).await.unwrap();
        assert_eq!(service.queue().job(&id).unwrap().status, JobStatus::Sent);
    }

    #[tokio::test]
    async fn test_status_update_is_email_only() {
        let service = service();
        let id = service
            .send_hotel_status_update(&HotelStatusUpdate {
                hotel_name: "Eko Hotel".into(),
                old_status: "active".into(),
                new_status: "maintenance".into(),
                updated_by: "ops@hotelsaver.ng".into(),
                notes: None,
                admin_email: "admin@hotelsaver.ng".into(),
                updated_at: Utc::now(),
            })
            .unwrap();

        let job = service.queue().job(&id).unwrap();
        assert_eq!(job.kind, NotificationType::Email);
        assert_eq!(job.recipient.name, "Hotel Administrator");
        assert!(job.data["notes"].is_null());

        service.queue().process_queue().await.unwrap();
        assert_eq!(service.queue().job(&id).unwrap().status, JobStatus::Sent);
    }

    #[tokio::test]
    async fn test_booking_without_phone_is_email_only() {
        let service = service();
        let mut b = booking();
        b.guest_phone = None;
        let id = service.send_booking_confirmation(&b).unwrap();

        assert_eq!(service.queue().job(&id).unwrap().kind, NotificationType::Email);

        service.queue().process_queue().await.unwrap();
        let job = service.queue().job(&id).unwrap();
        assert_eq!(job.status, JobStatus::Sent);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_room_ready_without_phone() {
        let service = service();
        let id = service
            .send_room_ready(&RoomReady {
                guest_name: "Ada".into(),
                guest_email: "ada@example.com".into(),
                guest_phone: None,
                hotel_name: "Eko Hotel".into(),
                room_type: "Deluxe".into(),
                room_number: "305".into(),
                floor: 3,
            })
            .unwrap();

        let job = service.queue().job(&id).unwrap();
        assert!(job.recipient.phone.is_none());
        assert_eq!(job.kind, NotificationType::Email);
    }
}

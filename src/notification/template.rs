//! Email and SMS templates.
//!
//! Templates use `{{variable}}` placeholders resolved against the job's
//! `data` object. Missing variables render as empty strings, and a
//! `{{#variable}}...{{/variable}}` section renders only when the variable is
//! present and not null, false or empty. Integers of
//! 1000 and above are rendered with thousands separators so naira amounts
//! read naturally (`₦{{totalAmount}}` -> `₦100,000`).

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Channel, DeliveryError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Template '{template}' has no {channel} variant")]
    ChannelUnsupported { template: String, channel: Channel },

    #[error("Template data must be a JSON object")]
    InvalidData,
}

impl From<TemplateError> for DeliveryError {
    fn from(err: TemplateError) -> Self {
        // Re-rendering will never fix a template problem
        DeliveryError::permanent(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateEntry {
    pub email: Option<EmailTemplate>,
    pub sms: Option<String>,
}

/// Output of rendering one channel variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Email subject; `None` for SMS
    pub subject: Option<String>,
    pub body: String,
}

/// Fixed set of named templates
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: HashMap<String, TemplateEntry>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, entry: TemplateEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn render(
        &self,
        name: &str,
        channel: Channel,
        data: &Value,
    ) -> Result<RenderedMessage, TemplateError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        let vars = data.as_object().ok_or(TemplateError::InvalidData)?;

        let unsupported = || TemplateError::ChannelUnsupported {
            template: name.to_string(),
            channel,
        };

        match channel {
            Channel::Email => {
                let email = entry.email.as_ref().ok_or_else(unsupported)?;
                Ok(RenderedMessage {
                    subject: Some(substitute(&email.subject, vars, false)),
                    body: substitute(&email.html, vars, true),
                })
            }
            Channel::Sms => {
                let text = entry.sms.as_ref().ok_or_else(unsupported)?;
                Ok(RenderedMessage {
                    subject: None,
                    body: substitute(text, vars, false),
                })
            }
        }
    }

    /// Booking, reminder, room-ready and admin status templates.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.register(
            "booking_confirmation",
            TemplateEntry {
                email: Some(EmailTemplate {
                    subject: "Booking Confirmation - HotelSaver.ng".into(),
                    html: wrap_html(
                        "Booking Confirmed!",
                        r#"<h2>Dear {{guestName}},</h2>
<p>Your hotel booking has been confirmed. Here are your booking details:</p>
<div style="background: white; padding: 15px; border-radius: 5px; margin: 20px 0;">
  <h3>Booking Details</h3>
  <p><strong>Booking ID:</strong> {{bookingId}}</p>
  <p><strong>Hotel:</strong> {{hotelName}}</p>
  <p><strong>Room:</strong> {{roomType}} - Room {{roomNumber}}</p>
  <p><strong>Check-in:</strong> {{checkIn}}</p>
  <p><strong>Check-out:</strong> {{checkOut}}</p>
  <p><strong>Nights:</strong> {{nights}}</p>
  <p><strong>Guests:</strong> {{adults}} Adults, {{children}} Children</p>
  <p><strong>Total Amount:</strong> ₦{{totalAmount}}</p>
</div>
<h3>What's Next?</h3>
<ul>
  <li>Save this confirmation email for your records</li>
  <li>Arrive at the hotel by 3:00 PM on your check-in date</li>
  <li>Bring a valid ID for check-in</li>
  <li>Contact us on WhatsApp: +234 707 777 5545 for any changes</li>
</ul>
<p>We look forward to welcoming you!</p>
<p>Best regards,<br>HotelSaver.ng Team</p>"#,
                    ),
                }),
                sms: Some(
                    "🏨 HotelSaver.ng - Booking Confirmed!\n\nBooking ID: {{bookingId}}\nHotel: {{hotelName}}\nRoom: {{roomNumber}}\nCheck-in: {{checkIn}}\n\nTotal: ₦{{totalAmount}}\n\nNeed help? Reply to this message!"
                        .into(),
                ),
            },
        );

        let reminder_sms = "🏨 Reminder: Check-in tomorrow at {{hotelName}}!\n\nRoom: {{roomNumber}}\nTime: From 3:00 PM\nBooking: {{bookingId}}\n\nSee you soon!";

        registry.register(
            "booking_reminder",
            TemplateEntry {
                email: Some(EmailTemplate {
                    subject: "Check-in Reminder - Your Stay is Tomorrow!".into(),
                    html: wrap_html(
                        "🏨 Check-in Tomorrow!",
                        r#"<h2>Hello {{guestName}}!</h2>
<p>Just a friendly reminder that your check-in is tomorrow.</p>
<div style="background: white; padding: 15px; border-radius: 5px; margin: 20px 0;">
  <h3>Your Booking</h3>
  <p><strong>Hotel:</strong> {{hotelName}}</p>
  <p><strong>Check-in:</strong> Tomorrow, {{checkIn}}</p>
  <p><strong>Room:</strong> {{roomType}} - Room {{roomNumber}}</p>
  <p><strong>Booking ID:</strong> {{bookingId}}</p>
</div>
<h3>Check-in Information</h3>
<ul>
  <li><strong>Check-in Time:</strong> From 3:00 PM</li>
  <li><strong>Location:</strong> {{hotelAddress}}</li>
  <li><strong>Contact:</strong> {{hotelPhone}}</li>
</ul>
<div style="background: #e8fff1; padding: 15px; border-radius: 5px; margin: 20px 0;">
  <p><strong>Need Help?</strong> Contact us on WhatsApp: +234 707 777 5545</p>
</div>"#,
                    ),
                }),
                sms: Some(reminder_sms.into()),
            },
        );

        registry.register(
            "check_in_reminder",
            TemplateEntry {
                email: None,
                sms: Some(reminder_sms.into()),
            },
        );

        registry.register(
            "room_ready",
            TemplateEntry {
                email: Some(EmailTemplate {
                    subject: "Your Room is Ready! 🏨".into(),
                    html: wrap_html(
                        "🎉 Your Room is Ready!",
                        r#"<h2>Good news, {{guestName}}!</h2>
<p>Your room is now ready for early check-in.</p>
<div style="background: white; padding: 15px; border-radius: 5px; margin: 20px 0;">
  <p><strong>Room:</strong> {{roomType}} - Room {{roomNumber}}</p>
  <p><strong>Available:</strong> Now</p>
  <p><strong>Floor:</strong> {{floor}}</p>
</div>
<p>Please proceed to the front desk with your ID for check-in.</p>
<p>Enjoy your stay!</p>"#,
                    ),
                }),
                sms: Some(
                    "🎉 Great news! Your room {{roomNumber}} is ready for early check-in at {{hotelName}}. Proceed to front desk with ID. Enjoy your stay!"
                        .into(),
                ),
            },
        );

        registry.register(
            "status_update",
            TemplateEntry {
                email: Some(EmailTemplate {
                    subject: "Hotel Status Update".into(),
                    html: r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h2>Hotel Status Update</h2>
  <p><strong>Hotel:</strong> {{hotelName}}</p>
  <p><strong>Status:</strong> {{oldStatus}} → {{newStatus}}</p>
  <p><strong>Updated by:</strong> {{updatedBy}}</p>
  <p><strong>Time:</strong> {{updatedAt}}</p>
{{#notes}}  <p><strong>Notes:</strong> {{notes}}</p>
{{/notes}}</div>"#
                        .into(),
                }),
                sms: None,
            },
        );

        registry
    }
}

fn wrap_html(heading: &str, body: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<div style="background: #009739; color: white; padding: 20px; text-align: center; border-radius: 8px 8px 0 0;">
  <h1>{heading}</h1>
</div>
<div style="background: #f9f9f9; padding: 20px; border: 1px solid #ddd; border-radius: 0 0 8px 8px;">
{body}
</div>
</div>"#
    )
}

/// Replace `{{key}}` placeholders with values from `vars`.
pub fn substitute(template: &str, vars: &Map<String, Value>, escape_html: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find("}}") else {
            // Unterminated placeholder, emit verbatim
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = after[..end].trim();
        rest = &after[end + 2..];

        if let Some(section) = key.strip_prefix('#') {
            let section = section.trim();
            let close = format!("{{{{/{section}}}}}");
            if let Some(close_at) = rest.find(&close) {
                if is_present(vars.get(section)) {
                    out.push_str(&substitute(&rest[..close_at], vars, escape_html));
                }
                rest = &rest[close_at + close.len()..];
            }
            continue;
        }

        if let Some(value) = vars.get(key) {
            let rendered = render_value(value);
            if escape_html {
                out.push_str(&html_escape(&rendered));
            } else {
                out.push_str(&rendered);
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => group_thousands(i),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For arrays and objects, use JSON representation
        _ => value.to_string(),
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

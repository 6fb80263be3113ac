//! Turns raw table changes into user-facing notifications.
//!
//! Records are opaque JSON. Every field lookup falls back to `"Unknown"`, so a
//! malformed or partial record still yields a notification.

use crate::domain::entities::{ChangeEvent, ChangeKind, NotificationData, NotificationType};
use serde_json::Value;

const UNKNOWN: &str = "Unknown";

/// Which subscribed stream a change arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSource {
    Maintenance,
    Payment,
}

impl ChangeSource {
    fn id_prefix(&self) -> &'static str {
        match self {
            ChangeSource::Maintenance => "maintenance",
            ChangeSource::Payment => "payment",
        }
    }
}

/// Map a change on one of the subscribed tables to a notification
pub fn map_change(source: ChangeSource, event: &ChangeEvent) -> NotificationData {
    let record = event.record();

    let (notification_type, title, message) = match source {
        ChangeSource::Maintenance => describe_maintenance(event.event_type, record),
        ChangeSource::Payment => describe_payment(event.event_type, record),
    };

    let source_id = format!("{}-{}", source.id_prefix(), text_field(record, "id"));

    NotificationData::from_source(
        &source_id,
        notification_type,
        title,
        message,
        serde_json::to_value(event).ok(),
    )
}

fn describe_maintenance(
    kind: ChangeKind,
    record: Option<&Value>,
) -> (NotificationType, String, String) {
    let title = text_field(record, "title");

    match kind {
        ChangeKind::Insert => {
            let priority = text_field(record, "priority");
            if priority.eq_ignore_ascii_case("emergency") {
                (
                    NotificationType::Emergency,
                    "Emergency Maintenance Request".to_string(),
                    format!("{} requires immediate attention", title),
                )
            } else {
                (
                    NotificationType::MaintenanceRequest,
                    "New Maintenance Request".to_string(),
                    format!("{} (priority: {})", title, priority),
                )
            }
        }
        ChangeKind::Update => (
            NotificationType::MaintenanceRequest,
            "Maintenance Request Updated".to_string(),
            format!("{} is now {}", title, text_field(record, "status")),
        ),
        ChangeKind::Delete => (
            NotificationType::MaintenanceRequest,
            "Maintenance Request Removed".to_string(),
            format!("{} was removed", title),
        ),
    }
}

fn describe_payment(kind: ChangeKind, record: Option<&Value>) -> (NotificationType, String, String) {
    let amount = amount_field(record);

    let (title, message) = match kind {
        ChangeKind::Insert => ("Payment Received", format!("Payment of {} received", amount)),
        ChangeKind::Update => (
            "Payment Updated",
            format!("Payment of {} is now {}", amount, text_field(record, "status")),
        ),
        ChangeKind::Delete => ("Payment Removed", format!("Payment of {} was removed", amount)),
    };

    (NotificationType::PaymentUpdate, title.to_string(), message)
}

/// String or number field as text, `"Unknown"` when absent or of another type
fn text_field(record: Option<&Value>, key: &str) -> String {
    match record.and_then(|r| r.get(key)) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn amount_field(record: Option<&Value>) -> String {
    match record.and_then(|r| r.get("amount")) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(amount) => format!("${:.2}", amount),
            None => n.to_string(),
        },
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => UNKNOWN.to_string(),
    }
}

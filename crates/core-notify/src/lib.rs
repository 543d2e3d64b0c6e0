//! Notification Sink (C10, §4.10). A narrow output port; the chat-bot
//! transport, message localization, and admin panel rendering that
//! consume it are out of scope (§1 Non-goals) — this crate only defines
//! the seam and two reference implementations.

use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

#[derive(Clone, Debug)]
pub enum NotificationEvent {
    User { external_id: i64, message: String, critical: bool },
    Admin { category: String, priority: Priority, title: String, details: String },
}

/// Output port used by every engine to emit user- and admin-visible
/// events. Delivery is best-effort (§4.10): a failure here must never be
/// allowed to convert an otherwise-successful engine operation into a
/// failure (§7 propagation policy).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_user(&self, external_id: i64, message: &str, critical: bool);
    async fn notify_admins(&self, category: &str, priority: Priority, title: &str, details: &str);
}

/// No-op sink, used in tests and anywhere notifications are genuinely
/// uninteresting (e.g. a dry-run consolidation report).
#[derive(Default)]
pub struct NullNotificationSink;

#[async_trait]
impl NotificationSink for NullNotificationSink {
    async fn notify_user(&self, _external_id: i64, _message: &str, _critical: bool) {}
    async fn notify_admins(&self, _category: &str, _priority: Priority, _title: &str, _details: &str) {}
}

/// Pushes onto a bounded channel for a worker pool to drain, replacing the
/// original's async-generator batched broadcast sender (Design Note
/// "Async-generator batched sends"). If the channel is full, the event is
/// dropped and logged rather than applying backpressure to the caller —
/// notification delivery must never block a financial operation.
pub struct ChannelNotificationSink {
    sender: tokio::sync::mpsc::Sender<NotificationEvent>,
}

impl ChannelNotificationSink {
    pub fn new(capacity: usize) -> (Self, tokio::sync::mpsc::Receiver<NotificationEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    fn push(&self, event: NotificationEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!(error = %err, "notification channel full, dropping event");
        }
    }
}

#[async_trait]
impl NotificationSink for ChannelNotificationSink {
    async fn notify_user(&self, external_id: i64, message: &str, critical: bool) {
        self.push(NotificationEvent::User {
            external_id,
            message: message.to_string(),
            critical,
        });
    }

    async fn notify_admins(&self, category: &str, priority: Priority, title: &str, details: &str) {
        self.push(NotificationEvent::Admin {
            category: category.to_string(),
            priority,
            title: title.to_string(),
            details: details.to_string(),
        });
    }
}

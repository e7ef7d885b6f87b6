use crate::database::models::AttendanceStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    AttendanceCheckedIn {
        user_id: String,
        date: NaiveDate,
        status: AttendanceStatus,
        via_face: bool,
    },
    AttendanceCheckedOut {
        user_id: String,
        date: NaiveDate,
        work_hours: f64,
        via_face: bool,
    },
    AttendanceCorrected {
        user_id: String,
        date: NaiveDate,
        actor_id: String,
        reason: String,
        corrected_at: DateTime<Utc>,
    },
    AttendanceStatusOverridden {
        user_id: String,
        date: NaiveDate,
        status: AttendanceStatus,
        actor_id: String,
    },
}

/// Fire-and-forget consumer of domain events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "attendance_events", "{}", json),
            Err(e) => tracing::warn!("Failed to serialize event {:?}: {}", event, e),
        }
    }
}

/// Hands events to a background consumer task.
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: DomainEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::warn!("Event consumer is gone, dropping {:?}", e.0);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::run::RequestSource;

/// Closed event taxonomy. `RECORD_*`/`ERROR_*`/`FORCE_RESTART` are reserved for
/// future per-record granularity and are not emitted by the current orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    RequestReceived,
    RequestAccepted,
    RequestRejected,
    IngestionStarted,
    IngestionRunning,
    IngestionSucceeded,
    IngestionFailed,
    IngestionSkippedWindow,
    IngestionSkippedDuplicate,
    MetricsUpdated,
    ForceRestart,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub audit_id: i64,
    pub run_id: Option<i64>,
    pub request_id: String,
    pub request_source: RequestSource,
    pub event_type: AuditEventType,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// An event not yet persisted; `occurred_at` and `audit_id` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub run_id: Option<i64>,
    pub request_id: String,
    pub request_source: RequestSource,
    pub event_type: AuditEventType,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail {
    pub request_id: String,
    pub event_count: usize,
    pub first_event: Option<DateTime<Utc>>,
    pub last_event: Option<DateTime<Utc>>,
    pub events: Vec<AuditEvent>,
}

impl AuditTrail {
    pub fn from_events(request_id: String, mut events: Vec<AuditEvent>) -> Self {
        events.sort_by_key(|e| e.occurred_at);
        let first_event = events.first().map(|e| e.occurred_at);
        let last_event = events.last().map(|e| e.occurred_at);
        Self {
            request_id,
            event_count: events.len(),
            first_event,
            last_event,
            events,
        }
    }
}

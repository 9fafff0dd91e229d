use crate::domain::audit::{AuditEventType, NewAuditEvent};
use crate::domain::method::IngestionMethod;
use crate::domain::run::RequestSource;

/// Correlation id, method, window key, and request source carried explicitly across audit
/// writes for the duration of one invocation. An immutable value threaded through calls rather
/// than a thread-local or other ambient global.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub request_id: String,
    pub request_source: RequestSource,
    pub method: IngestionMethod,
    pub window_key: Option<String>,
    pub run_id: Option<i64>,
}

impl RunContext {
    pub fn new(request_id: String, request_source: RequestSource, method: IngestionMethod) -> Self {
        Self {
            request_id,
            request_source,
            method,
            window_key: None,
            run_id: None,
        }
    }

    pub fn audit_event(&self, event_type: AuditEventType, message: impl Into<String>) -> NewAuditEvent {
        NewAuditEvent {
            run_id: self.run_id,
            request_id: self.request_id.clone(),
            request_source: self.request_source,
            event_type,
            message: message.into(),
        }
    }
}

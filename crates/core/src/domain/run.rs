use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum RunStatus {
    Started,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum RequestSource {
    Manual,
    Scheduled,
    System,
}

/// Identity of one execution attempt, bound to `(method_name, window_key)`.
#[derive(Debug, Clone)]
pub struct Run {
    pub run_id: i64,
    pub method_name: String,
    pub window_key: String,
    pub request_id: String,
    pub request_source: RequestSource,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub seen: i64,
    pub inserted: i64,
    pub updated: i64,
    pub rejected: i64,
    pub last_error_message: Option<String>,
    pub last_error_http_status: Option<i32>,
    pub last_error_soap_fault_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateRunRequest {
    pub method_name: String,
    pub window_key: String,
    pub request_id: String,
    pub request_source: RequestSource,
    pub force: bool,
}

/// Running counters accumulated across a single execution; flushed to the `runs` row once at
/// terminal time via `ControlStore::update_metrics`.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub seen: i64,
    pub inserted: i64,
    pub updated: i64,
    pub rejected: i64,
}

impl RunMetrics {
    pub fn record_seen(&mut self) {
        self.seen += 1;
    }

    pub fn record_inserted(&mut self, n: i64) {
        self.inserted += n;
    }

    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }
}

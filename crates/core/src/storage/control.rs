use chrono::Utc;
use sqlx::PgPool;

use crate::domain::audit::{AuditEvent, NewAuditEvent};
use crate::domain::reject::Reject;
use crate::domain::run::{CreateRunRequest, RunMetrics, RunStatus};
use crate::error::IngestionError;

const REJECT_FLUSH_CHUNK: usize = 500;

/// Durable `runs`/`audit`/`rejects` store. Every public method opens and commits its own
/// transaction (or, for single-statement updates, runs directly against the pool) so a failure
/// anywhere in the ingestion's logical unit never erases a run's status, metrics, or audit trail.
#[derive(Debug, Clone)]
pub struct ControlStore {
    pool: PgPool,
}

impl ControlStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a fresh run for `(methodName, windowKey)`, or resets an existing non-SUCCEEDED run
    /// when `force` is set. Two callers racing on the same window are serialized: the first insert
    /// wins the unique constraint, the second blocks on `SELECT ... FOR UPDATE` of the now-existing
    /// row and observes its post-commit status.
    pub async fn create_or_restart_run(
        &self,
        req: &CreateRunRequest,
    ) -> Result<i64, IngestionError> {
        let mut tx = self.pool.begin().await?;

        let inserted: Option<(i64,)> = sqlx::query_as(
            "INSERT INTO runs \
                (method_name, window_key, request_id, request_source, status, start_time, \
                 seen, inserted, updated, rejected) \
             VALUES ($1, $2, $3, $4, 'STARTED', now(), 0, 0, 0, 0) \
             ON CONFLICT (method_name, window_key) DO NOTHING \
             RETURNING run_id",
        )
        .bind(&req.method_name)
        .bind(&req.window_key)
        .bind(&req.request_id)
        .bind(req.request_source)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((run_id,)) = inserted {
            tx.commit().await?;
            return Ok(run_id);
        }

        let (run_id, status): (i64, RunStatus) = sqlx::query_as(
            "SELECT run_id, status FROM runs \
             WHERE method_name = $1 AND window_key = $2 \
             FOR UPDATE",
        )
        .bind(&req.method_name)
        .bind(&req.window_key)
        .fetch_one(&mut *tx)
        .await?;

        if status == RunStatus::Succeeded && !req.force {
            return Err(IngestionError::DuplicateRun(format!(
                "{} already succeeded for window {}",
                req.method_name, req.window_key
            )));
        }

        if status != RunStatus::Failed && !req.force {
            return Err(IngestionError::DuplicateRun(format!(
                "{} is already {status:?} for window {}",
                req.method_name, req.window_key
            )));
        }

        sqlx::query(
            "UPDATE runs SET \
                request_id = $1, request_source = $2, status = 'STARTED', \
                start_time = now(), end_time = NULL, \
                seen = 0, inserted = 0, updated = 0, rejected = 0, \
                last_error_message = NULL, last_error_http_status = NULL, \
                last_error_soap_fault_code = NULL \
             WHERE run_id = $3",
        )
        .bind(&req.request_id)
        .bind(req.request_source)
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(run_id)
    }

    pub async fn update_status(
        &self,
        run_id: i64,
        status: RunStatus,
    ) -> Result<(), IngestionError> {
        if status.is_terminal() {
            sqlx::query("UPDATE runs SET status = $1, end_time = now() WHERE run_id = $2")
                .bind(status)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("UPDATE runs SET status = $1 WHERE run_id = $2")
                .bind(status)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn update_metrics(
        &self,
        run_id: i64,
        metrics: &RunMetrics,
    ) -> Result<(), IngestionError> {
        sqlx::query(
            "UPDATE runs SET seen = $1, inserted = $2, updated = $3, rejected = $4 \
             WHERE run_id = $5",
        )
        .bind(metrics.seen)
        .bind(metrics.inserted)
        .bind(metrics.updated)
        .bind(metrics.rejected)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn log_error(
        &self,
        run_id: i64,
        message: &str,
        http_status: Option<i32>,
        fault_code: Option<&str>,
    ) -> Result<(), IngestionError> {
        sqlx::query(
            "UPDATE runs SET \
                last_error_message = $1, last_error_http_status = $2, \
                last_error_soap_fault_code = $3 \
             WHERE run_id = $4",
        )
        .bind(message)
        .bind(http_status)
        .bind(fault_code)
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flushes accumulated rejects for one run in batched inserts. Called once at run
    /// finalization regardless of outcome; the caller treats failures here as best-effort.
    pub async fn append_rejects(
        &self,
        run_id: i64,
        rejects: &[Reject],
    ) -> Result<(), IngestionError> {
        if rejects.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for chunk in rejects.chunks(REJECT_FLUSH_CHUNK) {
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO rejects (run_id, raw_data, reason, is_parse_error, created_at) ",
            );
            let now = Utc::now();
            qb.push_values(chunk, |mut b, reject| {
                b.push_bind(run_id)
                    .push_bind(&reject.raw_data)
                    .push_bind(&reject.reason)
                    .push_bind(reject.is_parse_error)
                    .push_bind(now);
            });
            qb.build().persistent(false).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn is_window_complete(
        &self,
        method_name: &str,
        window_key: &str,
    ) -> Result<bool, IngestionError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT run_id FROM runs \
             WHERE method_name = $1 AND window_key = $2 AND status = 'SUCCEEDED'",
        )
        .bind(method_name)
        .bind(window_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Appends one row to the append-only audit timeline. Never modified or deleted afterward.
    pub async fn record_audit(&self, event: NewAuditEvent) -> Result<(), IngestionError> {
        sqlx::query(
            "INSERT INTO audit (run_id, request_id, request_source, event_type, message, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, now())",
        )
        .bind(event.run_id)
        .bind(&event.request_id)
        .bind(event.request_source)
        .bind(event.event_type)
        .bind(&event.message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn audit_by_request(
        &self,
        request_id: &str,
    ) -> Result<Vec<AuditEvent>, IngestionError> {
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT audit_id, run_id, request_id, request_source, event_type, message, occurred_at \
             FROM audit WHERE request_id = $1 ORDER BY occurred_at ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn audit_by_run(&self, run_id: i64) -> Result<Vec<AuditEvent>, IngestionError> {
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT audit_id, run_id, request_id, request_source, event_type, message, occurred_at \
             FROM audit WHERE run_id = $1 ORDER BY occurred_at ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn audit_recent(&self, limit: i64) -> Result<Vec<AuditEvent>, IngestionError> {
        let events = sqlx::query_as::<_, AuditEvent>(
            "SELECT audit_id, run_id, request_id, request_source, event_type, message, occurred_at \
             FROM audit ORDER BY occurred_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }
}

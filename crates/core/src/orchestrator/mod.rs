pub mod context;
pub mod pipeline;

pub use context::RunContext;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::config::Config;
use crate::domain::audit::AuditEventType;
use crate::domain::method::IngestionMethod;
use crate::domain::reject::Reject;
use crate::domain::run::{CreateRunRequest, RequestSource, RunMetrics, RunStatus};
use crate::error::IngestionError;
use crate::soap::SoapSource;
use crate::storage::ControlStore;
use crate::window::WindowPolicy;

/// Coordinates WindowPolicy → run creation → parser → batch upsert → threshold validation →
/// status finalization → audit persistence for one `(method, requestId)` invocation.
pub struct IngestionJob {
    window: WindowPolicy,
    control: ControlStore,
    soap: SoapSource,
    pipelines: HashMap<IngestionMethod, Arc<dyn pipeline::MethodPipeline>>,
    batch_size: usize,
    max_child_elements: usize,
    max_reject_count: i64,
    max_reject_rate: f64,
}

impl IngestionJob {
    pub fn new(config: &Config, pool: PgPool) -> Result<Self, IngestionError> {
        Ok(Self {
            window: WindowPolicy::from_config(config),
            control: ControlStore::new(pool.clone()),
            soap: SoapSource::from_config(&config.soap)?,
            pipelines: pipeline::registry(pool),
            batch_size: config.batch_size,
            max_child_elements: config.soap.max_child_elements,
            max_reject_count: config.max_reject_count,
            max_reject_rate: config.max_reject_rate,
        })
    }

    /// Runs the full state machine for one invocation. Returns `Ok(())` on a SUCCEEDED run;
    /// any other terminal outcome (window violation, duplicate, parse/fault/threshold failure)
    /// is returned as an `Err` after the corresponding audit event has already been written.
    pub async fn execute(
        &self,
        method: IngestionMethod,
        request_id: String,
        request_source: RequestSource,
        force: bool,
    ) -> Result<(), IngestionError> {
        let mut ctx = RunContext::new(request_id.clone(), request_source, method);

        let window_key = match self.window.validate_and_get_key(method, Utc::now(), force) {
            Ok(key) => key,
            Err(err) => {
                self.audit_best_effort(
                    &ctx,
                    AuditEventType::IngestionSkippedWindow,
                    err.to_string(),
                )
                .await;
                return Err(err);
            }
        };
        ctx.window_key = Some(window_key.clone());

        if !force
            && self
                .control
                .is_window_complete(method.as_str(), &window_key)
                .await?
        {
            self.audit_best_effort(
                &ctx,
                AuditEventType::IngestionSkippedDuplicate,
                format!("window {window_key} already complete"),
            )
            .await;
            return Err(IngestionError::DuplicateRun(format!(
                "{method} already succeeded for window {window_key}"
            )));
        }

        let create_req = CreateRunRequest {
            method_name: method.as_str().to_string(),
            window_key: window_key.clone(),
            request_id: request_id.clone(),
            request_source,
            force,
        };

        let run_id = match self.control.create_or_restart_run(&create_req).await {
            Ok(id) => id,
            Err(err) => {
                self.audit_best_effort(
                    &ctx,
                    AuditEventType::IngestionSkippedDuplicate,
                    err.to_string(),
                )
                .await;
                return Err(err);
            }
        };
        ctx.run_id = Some(run_id);

        self.audit_best_effort(
            &ctx,
            AuditEventType::IngestionStarted,
            format!("run {run_id} started for window {window_key}"),
        )
        .await;

        if let Err(err) = self.control.update_status(run_id, RunStatus::Running).await {
            tracing::warn!(run_id, error = %err, "failed to mark run RUNNING");
        }
        self.audit_best_effort(&ctx, AuditEventType::IngestionRunning, "processing".to_string())
            .await;

        let mut metrics = RunMetrics::default();
        let mut rejects: Vec<Reject> = Vec::new();

        let pipeline = self
            .pipelines
            .get(&method)
            .expect("registry covers every IngestionMethod variant");

        let outcome = pipeline
            .run(
                &self.soap,
                method,
                run_id,
                self.batch_size,
                self.max_child_elements,
                &mut metrics,
                &mut rejects,
            )
            .await
            .and_then(|_| self.validate_thresholds(&metrics));

        let final_status = if outcome.is_ok() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        if let Err(err) = &outcome {
            if let Err(log_err) = self.control.log_error(run_id, &err.to_string(), None, None).await {
                tracing::warn!(run_id, error = %log_err, "failed to log run error");
            }
        }

        if let Err(err) = self.control.update_status(run_id, final_status).await {
            tracing::warn!(run_id, error = %err, "failed to finalize run status");
        }

        let event_type = if final_status == RunStatus::Succeeded {
            AuditEventType::IngestionSucceeded
        } else {
            AuditEventType::IngestionFailed
        };
        let summary = format!(
            "seen={}, inserted={}, updated={}, rejected={}",
            metrics.seen, metrics.inserted, metrics.updated, metrics.rejected
        );
        let event_message = match &outcome {
            Ok(()) => summary.clone(),
            Err(err) => err.to_string(),
        };
        self.audit_best_effort(&ctx, event_type, event_message).await;

        // Always runs, regardless of the outcome above: metrics and rejects capture partial
        // progress even on a FAILED run.
        if let Err(err) = self.control.update_metrics(run_id, &metrics).await {
            tracing::warn!(run_id, error = %err, "failed to persist final metrics");
        }
        if let Err(err) = self.control.append_rejects(run_id, &rejects).await {
            tracing::warn!(run_id, error = %err, "failed to flush rejects");
        }
        self.audit_best_effort(&ctx, AuditEventType::MetricsUpdated, summary).await;

        outcome
    }

    fn validate_thresholds(&self, metrics: &RunMetrics) -> Result<(), IngestionError> {
        if metrics.rejected > self.max_reject_count {
            return Err(IngestionError::ThresholdExceeded(format!(
                "rejected {} exceeds maxRejectCount {}",
                metrics.rejected, self.max_reject_count
            )));
        }

        if metrics.seen > 0 {
            let rate = metrics.rejected as f64 / metrics.seen as f64;
            if rate > self.max_reject_rate {
                return Err(IngestionError::ThresholdExceeded(format!(
                    "reject rate {rate:.4} exceeds maxRejectRate {:.4}",
                    self.max_reject_rate
                )));
            }
        }

        Ok(())
    }

    /// The audit subsystem must never break ingestion: failures here are logged, not escalated.
    async fn audit_best_effort(&self, ctx: &RunContext, event_type: AuditEventType, message: String) {
        if let Err(err) = self.control.record_audit(ctx.audit_event(event_type, message)).await {
            tracing::warn!(request_id = %ctx.request_id, error = %err, "audit write failed");
        }
    }
}

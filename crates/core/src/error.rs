use thiserror::Error;

/// Closed error taxonomy for the ingestion control plane. The orchestrator matches on these
/// variants to decide which audit event and terminal run status to record; everything above
/// `core` (the worker CLI, the scheduler, the HTTP trigger) threads plain `anyhow::Result`.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("window violation: {0}")]
    WindowViolation(String),

    #[error("duplicate run: {0}")]
    DuplicateRun(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("SOAP fault: {0}")]
    SoapFault(String),

    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("reject threshold exceeded: {0}")]
    ThresholdExceeded(String),

    #[error("integrity conflict: {0}")]
    IntegrityConflict(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl IngestionError {
    /// Stable machine-checkable name for this error's kind, used in log fields and
    /// `runs.last_error_message` prefixes.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestionError::WindowViolation(_) => "WINDOW_VIOLATION",
            IngestionError::DuplicateRun(_) => "DUPLICATE_RUN",
            IngestionError::ParseError(_) => "PARSE_ERROR",
            IngestionError::SoapFault(_) => "SOAP_FAULT",
            IngestionError::ExternalUnavailable(_) => "EXTERNAL_UNAVAILABLE",
            IngestionError::ThresholdExceeded(_) => "THRESHOLD_EXCEEDED",
            IngestionError::IntegrityConflict(_) => "INTEGRITY_CONFLICT",
            IngestionError::ValidationError(_) => "VALIDATION_ERROR",
            IngestionError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            IngestionError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Translates a Postgres unique-violation (SQLSTATE 23505) into `true`. Generalizes the
/// `is_unique_violation` check a caller would otherwise have to hand-roll at every call site.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some("23505"),
        _ => false,
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;

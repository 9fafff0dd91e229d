use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sipsa_core::domain::audit::{AuditEvent, AuditTrail};
use sipsa_core::domain::method::IngestionMethod;
use sipsa_core::domain::run::RequestSource;
use sipsa_core::storage::ControlStore;
use sipsa_core::{Config, IngestionJob};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    job: Arc<IngestionJob>,
    control: ControlStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let _sentry_guard = init_sentry(&config);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(config.require_database_url()?)
        .await?;

    sipsa_core::storage::migrate(&pool).await?;

    let state = AppState {
        job: Arc::new(IngestionJob::new(&config, pool.clone())?),
        control: ControlStore::new(pool),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/internal/ingestion/run", post(trigger_run))
        .route("/internal/ingestion/methods", get(list_methods))
        .route("/internal/audit/request/:request_id", get(audit_by_request))
        .route("/internal/audit/run/:run_id", get(audit_by_run))
        .route("/internal/audit/recent", get(audit_recent))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct TriggerQuery {
    method: Option<String>,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct TriggerAccepted {
    request_id: String,
    status: &'static str,
    method: String,
    force: bool,
}

#[derive(Debug, Serialize)]
struct TriggerRejected {
    error: String,
    available_methods: Vec<&'static str>,
    request_id: String,
}

/// `POST /internal/ingestion/run?method=<name>&force=<bool>`. Records `REQUEST_RECEIVED`
/// synchronously, validates the method, then either `REQUEST_REJECTED` (400) or
/// `REQUEST_ACCEPTED` (202) and hands off to asynchronous execution. Never waits for the
/// ingestion run itself to finish.
async fn trigger_run(
    State(state): State<AppState>,
    Query(query): Query<TriggerQuery>,
) -> Result<(StatusCode, Json<TriggerAccepted>), (StatusCode, Json<TriggerRejected>)> {
    let request_id = Uuid::new_v4().to_string();
    let raw_method = query.method.unwrap_or_default();

    audit_best_effort(
        &state.control,
        &request_id,
        None,
        sipsa_core::domain::audit::AuditEventType::RequestReceived,
        format!("method={raw_method}, force={}", query.force),
    )
    .await;

    let Some(method) = (!raw_method.trim().is_empty())
        .then(|| IngestionMethod::parse(&raw_method))
        .flatten()
    else {
        audit_best_effort(
            &state.control,
            &request_id,
            None,
            sipsa_core::domain::audit::AuditEventType::RequestRejected,
            format!("unknown or blank method '{raw_method}'"),
        )
        .await;
        return Err((
            StatusCode::BAD_REQUEST,
            Json(TriggerRejected {
                error: format!("unknown or blank method '{raw_method}'"),
                available_methods: IngestionMethod::available_methods(),
                request_id,
            }),
        ));
    };

    audit_best_effort(
        &state.control,
        &request_id,
        None,
        sipsa_core::domain::audit::AuditEventType::RequestAccepted,
        format!("method={method}, force={}", query.force),
    )
    .await;

    let job = state.job.clone();
    let spawned_request_id = request_id.clone();
    let force = query.force;
    tokio::spawn(async move {
        if let Err(err) = job
            .execute(method, spawned_request_id, RequestSource::Manual, force)
            .await
        {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::warn!(%method, error = %err, "ingestion run did not succeed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerAccepted {
            request_id,
            status: "ACCEPTED",
            method: method.as_str().to_string(),
            force,
        }),
    ))
}

async fn audit_best_effort(
    control: &ControlStore,
    request_id: &str,
    run_id: Option<i64>,
    event_type: sipsa_core::domain::audit::AuditEventType,
    message: String,
) {
    let event = sipsa_core::domain::audit::NewAuditEvent {
        run_id,
        request_id: request_id.to_string(),
        request_source: RequestSource::Manual,
        event_type,
        message,
    };
    if let Err(err) = control.record_audit(event).await {
        tracing::warn!(request_id, error = %err, "audit write failed");
    }
}

#[derive(Debug, Serialize)]
struct MethodsResponse {
    methods: Vec<&'static str>,
    count: usize,
}

async fn list_methods() -> Json<MethodsResponse> {
    let methods = IngestionMethod::available_methods();
    Json(MethodsResponse {
        count: methods.len(),
        methods,
    })
}

async fn audit_by_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<AuditTrail>, StatusCode> {
    let events = state
        .control
        .audit_by_request(&request_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if events.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(AuditTrail::from_events(request_id, events)))
}

async fn audit_by_run(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
) -> Result<Json<Vec<AuditEvent>>, StatusCode> {
    let events = state
        .control
        .audit_by_run(run_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if events.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(events))
}

async fn audit_recent(State(state): State<AppState>) -> Result<Json<Vec<AuditEvent>>, StatusCode> {
    let events = state
        .control
        .audit_recent(100)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(events))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

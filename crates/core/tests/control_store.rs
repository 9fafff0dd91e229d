use sipsa_core::domain::run::{CreateRunRequest, RequestSource, RunMetrics, RunStatus};
use sipsa_core::storage::ControlStore;
use sqlx::PgPool;

fn request(method_name: &str, window_key: &str, request_id: &str, force: bool) -> CreateRunRequest {
    CreateRunRequest {
        method_name: method_name.to_string(),
        window_key: window_key.to_string(),
        request_id: request_id.to_string(),
        request_source: RequestSource::Manual,
        force,
    }
}

#[sqlx::test]
async fn create_or_restart_run_is_idempotent_for_same_window(pool: PgPool) {
    let control = ControlStore::new(pool.clone());

    let first = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-29", "req-1", false))
        .await
        .expect("first create should succeed");

    let second = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-29", "req-2", false))
        .await;

    assert!(
        second.is_err(),
        "a non-SUCCEEDED, non-FAILED run should reject a concurrent request for the same window"
    );

    let row: (String,) = sqlx::query_as("SELECT request_id FROM runs WHERE run_id = $1")
        .bind(first)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "req-1", "the rejected racer must not have overwritten the original run");
}

#[sqlx::test]
async fn succeeded_run_rejects_retrigger_without_force(pool: PgPool) {
    let control = ControlStore::new(pool);

    let run_id = control
        .create_or_restart_run(&request("promediosSipsaParcial", "2026-07-29", "req-1", false))
        .await
        .unwrap();
    control
        .update_status(run_id, RunStatus::Succeeded)
        .await
        .unwrap();

    let retry = control
        .create_or_restart_run(&request("promediosSipsaParcial", "2026-07-29", "req-2", false))
        .await;

    assert!(retry.is_err(), "a SUCCEEDED run must reject a retrigger without force");
}

#[sqlx::test]
async fn succeeded_run_restarts_with_force(pool: PgPool) {
    let control = ControlStore::new(pool);

    let run_id = control
        .create_or_restart_run(&request("promediosSipsaParcial", "2026-07-29", "req-1", false))
        .await
        .unwrap();
    control
        .update_status(run_id, RunStatus::Succeeded)
        .await
        .unwrap();
    control
        .update_metrics(
            run_id,
            &RunMetrics {
                seen: 10,
                inserted: 8,
                updated: 0,
                rejected: 2,
            },
        )
        .await
        .unwrap();

    let restarted_id = control
        .create_or_restart_run(&request("promediosSipsaParcial", "2026-07-29", "req-2", true))
        .await
        .expect("force should restart a SUCCEEDED run");

    assert_eq!(restarted_id, run_id, "restart reuses the same run row, not a new one");

    let events = control.audit_by_request("req-1").await.unwrap();
    assert!(events.is_empty(), "no audit rows were written by this helper test");
}

#[sqlx::test]
async fn failed_run_restarts_without_force_and_resets_counters(pool: PgPool) {
    let control = ControlStore::new(pool);

    let run_id = control
        .create_or_restart_run(&request("promediosSipsaMayorista", "2026-07-29", "req-1", false))
        .await
        .unwrap();
    control
        .update_metrics(
            run_id,
            &RunMetrics {
                seen: 5,
                inserted: 1,
                updated: 0,
                rejected: 4,
            },
        )
        .await
        .unwrap();
    control.update_status(run_id, RunStatus::Failed).await.unwrap();

    let restarted_id = control
        .create_or_restart_run(&request("promediosSipsaMayorista", "2026-07-29", "req-2", false))
        .await
        .expect("a FAILED run restarts without needing force");

    assert_eq!(restarted_id, run_id);
}

#[sqlx::test]
async fn distinct_window_keys_create_independent_runs(pool: PgPool) {
    let control = ControlStore::new(pool);

    let first = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-29", "req-1", false))
        .await
        .unwrap();
    let second = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-30", "req-2", false))
        .await
        .unwrap();

    assert_ne!(first, second, "different calendar windows never share a run row");
}

#[sqlx::test]
async fn audit_trail_round_trips_in_occurred_at_order(pool: PgPool) {
    use sipsa_core::domain::audit::{AuditEventType, NewAuditEvent};

    let control = ControlStore::new(pool);
    let run_id = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-29", "req-1", false))
        .await
        .unwrap();

    for (event_type, message) in [
        (AuditEventType::RequestReceived, "received"),
        (AuditEventType::RequestAccepted, "accepted"),
        (AuditEventType::IngestionStarted, "started"),
        (AuditEventType::IngestionSucceeded, "succeeded"),
    ] {
        control
            .record_audit(NewAuditEvent {
                run_id: Some(run_id),
                request_id: "req-1".to_string(),
                request_source: RequestSource::Manual,
                event_type,
                message: message.to_string(),
            })
            .await
            .unwrap();
    }

    let events = control.audit_by_request("req-1").await.unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events.first().unwrap().event_type, AuditEventType::RequestReceived);
    assert_eq!(events.last().unwrap().event_type, AuditEventType::IngestionSucceeded);

    let by_run = control.audit_by_run(run_id).await.unwrap();
    assert_eq!(by_run.len(), 4);
}

#[sqlx::test]
async fn append_rejects_persists_every_row(pool: PgPool) {
    use sipsa_core::domain::reject::Reject;

    let control = ControlStore::new(pool.clone());
    let run_id = control
        .create_or_restart_run(&request("promediosSipsaParcial", "2026-07-29", "req-1", false))
        .await
        .unwrap();

    let rejects: Vec<Reject> = (0..3)
        .map(|i| Reject {
            raw_data: format!("<record id=\"{i}\"/>"),
            reason: "Missing: articuloId".to_string(),
            is_parse_error: false,
        })
        .collect();

    control.append_rejects(run_id, &rejects).await.unwrap();

    let count: (i64,) = sqlx::query_as("SELECT count(*) FROM rejects WHERE run_id = $1")
        .bind(run_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 3);
}

#[sqlx::test]
async fn is_window_complete_reflects_succeeded_status_only(pool: PgPool) {
    let control = ControlStore::new(pool);

    let run_id = control
        .create_or_restart_run(&request("promediosSipsaCiudad", "2026-07-29", "req-1", false))
        .await
        .unwrap();

    assert!(!control
        .is_window_complete("promediosSipsaCiudad", "2026-07-29")
        .await
        .unwrap());

    control.update_status(run_id, RunStatus::Succeeded).await.unwrap();

    assert!(control
        .is_window_complete("promediosSipsaCiudad", "2026-07-29")
        .await
        .unwrap());
}

use std::sync::Arc;

use clap::Parser;
use sipsa_core::domain::method::IngestionMethod;
use sipsa_core::domain::run::RequestSource;
use sipsa_core::{Config, IngestionJob};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Cron-driven scheduler for the five SIPSA pull methods, plus a one-shot CLI trigger for
/// manual/local invocation without standing up the HTTP API.
#[derive(Debug, Parser)]
#[command(name = "sipsa_worker")]
struct Args {
    /// Run a single method once instead of starting the scheduler.
    #[arg(long)]
    method: Option<String>,

    /// Bypass the window check and reset a non-SUCCEEDED run.
    #[arg(long)]
    force: bool,
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

    let job = Arc::new(IngestionJob::new(&config, pool)?);

    let args = Args::parse();
    if let Some(method_name) = args.method {
        let method = IngestionMethod::parse(&method_name).ok_or_else(|| {
            anyhow::anyhow!(
                "unknown method '{method_name}'; available: {:?}",
                IngestionMethod::available_methods()
            )
        })?;
        run_one(job, method, RequestSource::Manual, args.force).await;
        return Ok(());
    }

    run_scheduler(job, &config).await
}

async fn run_one(job: Arc<IngestionJob>, method: IngestionMethod, source: RequestSource, force: bool) {
    let request_id = Uuid::new_v4().to_string();
    tracing::info!(%method, %request_id, force, "manual trigger");
    if let Err(err) = job.execute(method, request_id, source, force).await {
        let err = anyhow::Error::new(err);
        sentry_anyhow::capture_anyhow(&err);
        tracing::warn!(%method, error = %err, "ingestion run did not succeed");
    }
}

async fn run_scheduler(job: Arc<IngestionJob>, config: &Config) -> anyhow::Result<()> {
    let scheduler = JobScheduler::new().await?;

    let daily_job = job.clone();
    scheduler
        .add(Job::new_async(config.daily_cron.as_str(), move |_uuid, _l| {
            let job = daily_job.clone();
            Box::pin(async move {
                // The daily batch fires city, partial, and weekly sequentially; a failure in
                // one method does not prevent the next from running.
                for method in IngestionMethod::daily_batch() {
                    run_one(job.clone(), method, RequestSource::Scheduled, false).await;
                }
            })
        })?)
        .await?;

    for cron in [&config.monthly_cron_primary, &config.monthly_cron_grace] {
        let wholesale_job = job.clone();
        scheduler
            .add(Job::new_async(cron.as_str(), move |_uuid, _l| {
                let job = wholesale_job.clone();
                Box::pin(async move {
                    run_one(
                        job,
                        IngestionMethod::PromedioMayoristaSipsaMesMadr,
                        RequestSource::Scheduled,
                        false,
                    )
                    .await;
                })
            })?)
            .await?;

        let supply_job = job.clone();
        scheduler
            .add(Job::new_async(cron.as_str(), move |_uuid, _l| {
                let job = supply_job.clone();
                Box::pin(async move {
                    run_one(
                        job,
                        IngestionMethod::PromedioAbasSipsaMesMadr,
                        RequestSource::Scheduled,
                        false,
                    )
                    .await;
                })
            })?)
            .await?;
    }

    scheduler.start().await?;
    tracing::info!("scheduler started; waiting for cron ticks");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    Ok(())
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

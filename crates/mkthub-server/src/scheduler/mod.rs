//! Background job scheduler.
//!
//! Registers the recurring order sync for every active integration and the
//! nightly Mercado Livre listing sync.

use std::sync::Arc;

use mkthub_core::{AppConfig, Marketplace};
use mkthub_ingest::{SyncOptions, TriggerSource};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_order_sync_job(&scheduler, pool.clone(), Arc::clone(&config)).await?;
    register_listing_sync_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Order sync on `MKTHUB_SYNC_CRON`. A tick is skipped while the previous
/// run is still going.
async fn register_order_sync_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let running = Arc::new(Mutex::new(()));
    let cron = config.sync_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous order sync still running; skipping tick");
                return;
            };
            run_order_sync(&pool, &config).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: order sync registered");
    Ok(())
}

async fn run_order_sync(pool: &PgPool, config: &AppConfig) {
    tracing::info!("scheduler: starting order sync");
    let options = SyncOptions::triggered_by(TriggerSource::Scheduler);
    match mkthub_ingest::sync_all_integrations(pool, config, None, &options).await {
        Ok(results) => {
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            tracing::info!(
                integrations = results.len(),
                failed,
                "scheduler: order sync complete"
            );
        }
        Err(e) => tracing::error!(error = %e, "scheduler: failed to load integrations"),
    }
}

/// Mercado Livre listing sync on `MKTHUB_ITEMS_SYNC_CRON`.
async fn register_listing_sync_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.items_sync_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            run_listing_sync(&pool, &config).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: listing sync registered");
    Ok(())
}

async fn run_listing_sync(pool: &PgPool, config: &AppConfig) {
    let integrations =
        match mkthub_db::list_active_integrations(pool, Some(Marketplace::MercadoLivre)).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "scheduler: failed to load Mercado Livre integrations");
                return;
            }
        };

    if integrations.is_empty() {
        tracing::info!("scheduler: no Mercado Livre integrations; skipping listing sync");
        return;
    }

    for integration in &integrations {
        match mkthub_ingest::sync_listings(pool, config, integration, TriggerSource::Scheduler).await
        {
            Ok(summary) => tracing::info!(
                integration_id = %integration.id,
                listings = summary.listings,
                links_created = summary.links_created,
                "scheduler: listing sync complete"
            ),
            Err(e) => tracing::error!(
                integration_id = %integration.id,
                error = %e,
                "scheduler: listing sync failed"
            ),
        }
    }
}

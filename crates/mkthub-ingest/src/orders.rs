//! Order ingestion and order sync runs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use mkthub_core::{AppConfig, Marketplace, MAX_LOOKBACK_HOURS};
use mkthub_db::IntegrationRow;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::connector::Connector;
use crate::error::IngestError;
use crate::present::{present_and_store, StoredOrder};

/// Orders fetched concurrently within one integration.
const ORDER_CONCURRENCY: usize = 4;

/// What started a sync run. Stored in `sync_runs.trigger_source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Cli,
    Scheduler,
    Api,
    Webhook,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Cli => "cli",
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Api => "api",
            TriggerSource::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cli" => Ok(TriggerSource::Cli),
            "scheduler" => Ok(TriggerSource::Scheduler),
            "api" => Ok(TriggerSource::Api),
            "webhook" => Ok(TriggerSource::Webhook),
            other => Err(format!("unknown trigger source '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Overrides the computed window start.
    pub since: Option<DateTime<Utc>>,
    pub trigger: TriggerSource,
    /// List changed orders without fetching or writing anything.
    pub dry_run: bool,
}

impl SyncOptions {
    #[must_use]
    pub fn triggered_by(trigger: TriggerSource) -> Self {
        Self {
            since: None,
            trigger,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub integration_id: Uuid,
    pub marketplace: Marketplace,
    /// `None` for dry runs.
    pub run_id: Option<i64>,
    pub since: DateTime<Utc>,
    pub listed: usize,
    pub processed: i32,
    pub failed: i32,
}

/// `now - hours`, or `None` when `hours` is outside `1..=MAX_LOOKBACK_HOURS`.
#[must_use]
pub fn hours_before(now: DateTime<Utc>, hours: i64) -> Option<DateTime<Utc>> {
    if !(1..=MAX_LOOKBACK_HOURS).contains(&hours) {
        return None;
    }
    Duration::try_hours(hours).and_then(|d| now.checked_sub_signed(d))
}

/// Start of the order-sync window: the later of the last successful sync
/// and `now - lookback_hours`. The lookback is clamped to
/// `1..=MAX_LOOKBACK_HOURS`.
#[must_use]
pub fn sync_window_start(
    last_synced_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lookback_hours: i64,
) -> DateTime<Utc> {
    let floor = hours_before(now, lookback_hours.clamp(1, MAX_LOOKBACK_HOURS)).unwrap_or(now);
    last_synced_at.map_or(floor, |last| last.max(floor))
}

/// Fetches one order from the vendor, stores the raw bundle and presents it.
///
/// # Errors
///
/// Returns the client error, a normalizer error or [`IngestError::Db`].
pub async fn ingest_order(
    pool: &PgPool,
    connector: &Connector,
    integration: &IntegrationRow,
    order_id: &str,
) -> Result<StoredOrder, IngestError> {
    let marketplace = integration.marketplace()?;
    if marketplace != connector.marketplace() {
        return Err(IngestError::WrongMarketplace {
            integration_id: integration.id,
            expected: connector.marketplace(),
            actual: marketplace,
        });
    }

    let bundle = connector.fetch_order_bundle(order_id).await?;
    mkthub_db::upsert_raw_order(
        pool,
        integration.organization_id,
        integration.id,
        marketplace,
        order_id,
        &bundle,
    )
    .await?;

    let stored = present_and_store(pool, &bundle, integration).await?;
    tracing::debug!(
        integration_id = %integration.id,
        marketplace = %marketplace,
        order_id,
        status = %stored.status_interno,
        "order ingested"
    );
    Ok(stored)
}

/// Rebuilds the presented order from the stored raw payload without calling
/// the vendor.
///
/// # Errors
///
/// Returns [`IngestError::RawOrderMissing`] if the order was never fetched,
/// or any error from [`present_and_store`].
pub async fn process_presented(
    pool: &PgPool,
    marketplace: Marketplace,
    order_id: &str,
) -> Result<StoredOrder, IngestError> {
    let raw = mkthub_db::get_raw_order(pool, marketplace, order_id)
        .await?
        .ok_or_else(|| IngestError::RawOrderMissing {
            marketplace,
            order_id: order_id.to_owned(),
        })?;
    let integration = mkthub_db::get_integration(pool, raw.integration_id).await?;
    present_and_store(pool, &raw.payload, &integration).await
}

/// Ingests one order for the active integration owning a vendor account.
/// Returns `None` when no integration matches, as webhooks for unknown
/// accounts are acknowledged and dropped.
///
/// # Errors
///
/// Returns any error from building the connector or [`ingest_order`].
pub async fn ingest_for_account(
    pool: &PgPool,
    config: &AppConfig,
    marketplace: Marketplace,
    external_account_id: &str,
    order_id: &str,
) -> Result<Option<StoredOrder>, IngestError> {
    let Some(integration) =
        mkthub_db::find_integration_by_account(pool, marketplace, external_account_id).await?
    else {
        tracing::warn!(
            marketplace = %marketplace,
            account = external_account_id,
            order_id,
            "no active integration for account"
        );
        return Ok(None);
    };
    let connector = Connector::for_integration(pool, config, &integration).await?;
    ingest_order(pool, &connector, &integration, order_id)
        .await
        .map(Some)
}

/// Lists orders changed since the window start and ingests each one.
///
/// Per-order failures are logged and counted. The integration's
/// `last_synced_at` advances to the time the listing started when at least
/// one order succeeded or nothing changed.
///
/// # Errors
///
/// Returns an error when the connector cannot be built, the sync run cannot
/// be recorded, or listing changed orders fails.
pub async fn sync_integration_orders(
    pool: &PgPool,
    config: &AppConfig,
    integration: &IntegrationRow,
    options: &SyncOptions,
) -> Result<SyncSummary, IngestError> {
    let connector = Connector::for_integration(pool, config, integration).await?;
    sync_with_connector(pool, config, &connector, integration, options).await
}

/// [`sync_integration_orders`] with an already built connector.
///
/// # Errors
///
/// See [`sync_integration_orders`].
pub async fn sync_with_connector(
    pool: &PgPool,
    config: &AppConfig,
    connector: &Connector,
    integration: &IntegrationRow,
    options: &SyncOptions,
) -> Result<SyncSummary, IngestError> {
    let marketplace = integration.marketplace()?;
    let now = Utc::now();
    let since = options.since.unwrap_or_else(|| {
        sync_window_start(integration.last_synced_at, now, config.sync_lookback_hours)
    });

    if options.dry_run {
        let ids = connector.changed_order_ids(since, now).await?;
        tracing::info!(
            integration_id = %integration.id,
            marketplace = %marketplace,
            listed = ids.len(),
            "dry run: changed orders listed, nothing written"
        );
        return Ok(SyncSummary {
            integration_id: integration.id,
            marketplace,
            run_id: None,
            since,
            listed: ids.len(),
            processed: 0,
            failed: 0,
        });
    }

    let run = mkthub_db::create_sync_run(pool, integration.id, "orders", options.trigger.as_str())
        .await?;
    if let Err(e) = mkthub_db::start_sync_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, &e.to_string()).await;
        return Err(e.into());
    }

    let ids = match connector.changed_order_ids(since, now).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(
                integration_id = %integration.id,
                marketplace = %marketplace,
                error = %e,
                "failed to list changed orders"
            );
            fail_run_best_effort(pool, run.id, &e.to_string()).await;
            return Err(e);
        }
    };

    let results: Vec<(String, Result<StoredOrder, IngestError>)> = stream::iter(ids.clone())
        .map(|order_id| async move {
            let result = ingest_order(pool, connector, integration, &order_id).await;
            (order_id, result)
        })
        .buffer_unordered(ORDER_CONCURRENCY)
        .collect()
        .await;

    let mut processed: i32 = 0;
    let mut failed: i32 = 0;
    for (order_id, result) in &results {
        match result {
            Ok(_) => processed = processed.saturating_add(1),
            Err(e) => {
                failed = failed.saturating_add(1);
                tracing::warn!(
                    integration_id = %integration.id,
                    marketplace = %marketplace,
                    order_id = %order_id,
                    error = %e,
                    "order ingest failed"
                );
            }
        }
    }

    if let Err(e) = mkthub_db::complete_sync_run(pool, run.id, processed, failed).await {
        fail_run_best_effort(pool, run.id, &e.to_string()).await;
        return Err(e.into());
    }

    if processed > 0 || ids.is_empty() {
        mkthub_db::mark_integration_synced(pool, integration.id, now).await?;
    } else {
        tracing::warn!(
            integration_id = %integration.id,
            failed,
            "every changed order failed, sync window not advanced"
        );
    }

    tracing::info!(
        integration_id = %integration.id,
        marketplace = %marketplace,
        run_id = run.id,
        listed = ids.len(),
        processed,
        failed,
        "order sync finished"
    );

    Ok(SyncSummary {
        integration_id: integration.id,
        marketplace,
        run_id: Some(run.id),
        since,
        listed: ids.len(),
        processed,
        failed,
    })
}

/// Syncs every active integration, optionally of one marketplace. Errors are
/// reported per integration.
///
/// # Errors
///
/// Returns [`IngestError::Db`] only if the integrations cannot be listed.
pub async fn sync_all_integrations(
    pool: &PgPool,
    config: &AppConfig,
    marketplace: Option<Marketplace>,
    options: &SyncOptions,
) -> Result<Vec<(Uuid, Result<SyncSummary, IngestError>)>, IngestError> {
    let integrations = mkthub_db::list_active_integrations(pool, marketplace).await?;
    let mut results = Vec::with_capacity(integrations.len());
    for integration in &integrations {
        let result = sync_integration_orders(pool, config, integration, options).await;
        if let Err(e) = &result {
            tracing::error!(
                integration_id = %integration.id,
                error = %e,
                "integration order sync failed"
            );
        }
        results.push((integration.id, result));
    }
    Ok(results)
}

pub(crate) async fn fail_run_best_effort(pool: &PgPool, run_id: i64, message: &str) {
    if let Err(e) = mkthub_db::fail_sync_run(pool, run_id, message).await {
        tracing::error!(run_id, error = %e, "failed to mark sync run as failed");
    }
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mkthub_core::MAX_LOOKBACK_HOURS;
use mkthub_ingest::{ListingSyncSummary, SyncOptions, SyncSummary, TriggerSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{OrgContext, RequestId};

use super::{map_db_error, map_ingest_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum SyncKind {
    #[default]
    Orders,
    Listings,
}

#[derive(Debug, Deserialize)]
pub(super) struct SyncQuery {
    pub kind: Option<SyncKind>,
    pub since_hours: Option<i64>,
    pub dry_run: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(super) enum SyncResult {
    Orders(SyncSummary),
    Listings(ListingSyncSummary),
}

#[derive(Debug, Deserialize)]
pub(super) struct SyncRunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct SyncRunItem {
    sync_run_id: Uuid,
    integration_id: Uuid,
    run_type: String,
    trigger_source: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    records_processed: i32,
    records_failed: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

fn since_from_hours(request_id: &str, hours: i64) -> Result<DateTime<Utc>, ApiError> {
    mkthub_ingest::hours_before(Utc::now(), hours).ok_or_else(|| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("since_hours must be between 1 and {MAX_LOOKBACK_HOURS}"),
        )
    })
}

/// Runs an order or listing sync for one integration and waits for it.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<ApiResponse<SyncResult>>, ApiError> {
    let integration = mkthub_db::get_integration(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if integration.organization_id != org {
        return Err(ApiError::new(req_id.0, "not_found", "resource not found"));
    }

    let result = match query.kind.unwrap_or_default() {
        SyncKind::Orders => {
            let since = query
                .since_hours
                .map(|h| since_from_hours(&req_id.0, h))
                .transpose()?;
            let options = SyncOptions {
                since,
                trigger: TriggerSource::Api,
                dry_run: query.dry_run.unwrap_or(false),
            };
            mkthub_ingest::sync_integration_orders(&state.pool, &state.config, &integration, &options)
                .await
                .map(SyncResult::Orders)
        }
        SyncKind::Listings => {
            mkthub_ingest::sync_listings(&state.pool, &state.config, &integration, TriggerSource::Api)
                .await
                .map(SyncResult::Listings)
        }
    }
    .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(result, req_id.0))
}

pub(super) async fn list_sync_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Query(query): Query<SyncRunsQuery>,
) -> Result<Json<ApiResponse<Vec<SyncRunItem>>>, ApiError> {
    let rows = mkthub_db::list_sync_runs(&state.pool, org, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| SyncRunItem {
            sync_run_id: row.public_id,
            integration_id: row.integration_id,
            run_type: row.run_type,
            trigger_source: row.trigger_source,
            status: row.status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            records_processed: row.records_processed,
            records_failed: row.records_failed,
            error_message: row.error_message,
            created_at: row.created_at,
        })
        .collect();

    Ok(ApiResponse::new(data, req_id.0))
}

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use mkthub_core::Marketplace;
use mkthub_ingest::ArrangedShipment;
use mkthub_shopee::ShipmentMode;
use serde::Deserialize;

use crate::middleware::{OrgContext, RequestId};

use super::{map_db_error, map_ingest_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct ArrangeShipmentQuery {
    /// `pickup` (default) or `dropoff`.
    pub mode: Option<ShipmentMode>,
}

/// Arranges shipment for a stored Shopee order of the caller's organization.
pub(super) async fn arrange_shipment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Path(order_sn): Path<String>,
    Query(query): Query<ArrangeShipmentQuery>,
) -> Result<Json<ApiResponse<ArrangedShipment>>, ApiError> {
    let order = mkthub_db::get_presented_order(&state.pool, org, Marketplace::Shopee, &order_sn)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("Shopee order {order_sn} not found"),
            )
        })?;
    let integration = mkthub_db::get_integration(&state.pool, order.integration_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let mode = query.mode.unwrap_or_default();
    let arranged =
        mkthub_ingest::arrange_shopee_shipment(&state.pool, &state.config, &integration, &order_sn, mode)
            .await
            .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;

    tracing::info!(
        integration_id = %integration.id,
        order_sn = %order_sn,
        mode = %arranged.mode,
        "shipment arranged"
    );
    Ok(ApiResponse::new(arranged, req_id.0))
}

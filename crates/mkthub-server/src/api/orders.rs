use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use mkthub_core::{Marketplace, StatusInterno};
use mkthub_db::{PresentedItemRow, PresentedOrderFilter, PresentedOrderRow};
use mkthub_ingest::StoredOrder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{OrgContext, RequestId};

use super::{map_db_error, map_ingest_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct OrdersQuery {
    pub marketplace: Option<String>,
    /// A `status_interno` label, e.g. `A enviar`.
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderSummary {
    marketplace: String,
    order_id: String,
    pack_id: Option<String>,
    status_interno: String,
    vendor_status: String,
    vendor_substatus: Option<String>,
    ordered_at: Option<DateTime<Utc>>,
    ship_by: Option<DateTime<Utc>>,
    currency: String,
    total_amount: Decimal,
    buyer_nickname: Option<String>,
    tracking_number: Option<String>,
    updated_at: DateTime<Utc>,
}

impl From<PresentedOrderRow> for OrderSummary {
    fn from(row: PresentedOrderRow) -> Self {
        Self {
            marketplace: row.marketplace,
            order_id: row.marketplace_order_id,
            pack_id: row.pack_id,
            status_interno: row.status_interno,
            vendor_status: row.vendor_status,
            vendor_substatus: row.vendor_substatus,
            ordered_at: row.ordered_at,
            ship_by: row.ship_by,
            currency: row.currency,
            total_amount: row.total_amount,
            buyer_nickname: row.buyer_nickname,
            tracking_number: row.tracking_number,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OrderLine {
    line_no: i32,
    listing_id: String,
    variation_id: Option<String>,
    title: String,
    sku: Option<String>,
    variation_label: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    sale_fee: Option<Decimal>,
    linked_product_id: Option<uuid::Uuid>,
    link_kind: Option<String>,
}

impl From<PresentedItemRow> for OrderLine {
    fn from(row: PresentedItemRow) -> Self {
        Self {
            line_no: row.line_no,
            listing_id: row.listing_id,
            variation_id: row.variation_id,
            title: row.title,
            sku: row.sku,
            variation_label: row.variation_label,
            quantity: row.quantity,
            unit_price: row.unit_price,
            sale_fee: row.sale_fee,
            linked_product_id: row.linked_product_id,
            link_kind: row.link_kind,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct BuyerView {
    id: Option<String>,
    nickname: Option<String>,
    name: Option<String>,
    document: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ShippingView {
    shipment_id: Option<String>,
    logistic_type: Option<String>,
    carrier: Option<String>,
    tracking_number: Option<String>,
    status: Option<String>,
    substatus: Option<String>,
    receiver_name: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderDetail {
    marketplace: String,
    order_id: String,
    pack_id: Option<String>,
    integration_id: uuid::Uuid,
    status_interno: String,
    vendor_status: String,
    vendor_substatus: Option<String>,
    ordered_at: Option<DateTime<Utc>>,
    vendor_updated_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    ship_by: Option<DateTime<Utc>>,
    currency: String,
    total_amount: Decimal,
    items_total: Decimal,
    shipping_cost: Option<Decimal>,
    marketplace_fee: Option<Decimal>,
    net_amount: Option<Decimal>,
    payment_method: Option<String>,
    installments: Option<i32>,
    buyer: BuyerView,
    shipping: ShippingView,
    items: Vec<OrderLine>,
    updated_at: DateTime<Utc>,
}

impl OrderDetail {
    fn new(row: PresentedOrderRow, items: Vec<PresentedItemRow>) -> Self {
        Self {
            marketplace: row.marketplace,
            order_id: row.marketplace_order_id,
            pack_id: row.pack_id,
            integration_id: row.integration_id,
            status_interno: row.status_interno,
            vendor_status: row.vendor_status,
            vendor_substatus: row.vendor_substatus,
            ordered_at: row.ordered_at,
            vendor_updated_at: row.vendor_updated_at,
            paid_at: row.paid_at,
            ship_by: row.ship_by,
            currency: row.currency,
            total_amount: row.total_amount,
            items_total: row.items_total,
            shipping_cost: row.shipping_cost,
            marketplace_fee: row.marketplace_fee,
            net_amount: row.net_amount,
            payment_method: row.payment_method,
            installments: row.installments,
            buyer: BuyerView {
                id: row.buyer_id,
                nickname: row.buyer_nickname,
                name: row.buyer_name,
                document: row.buyer_document,
            },
            shipping: ShippingView {
                shipment_id: row.shipment_id,
                logistic_type: row.logistic_type,
                carrier: row.carrier,
                tracking_number: row.tracking_number,
                status: row.shipment_status,
                substatus: row.shipment_substatus,
                receiver_name: row.receiver_name,
                address: row.shipping_address,
                city: row.shipping_city,
                state: row.shipping_state,
                zip_code: row.shipping_zip_code,
                estimated_delivery: row.estimated_delivery,
            },
            items: items.into_iter().map(OrderLine::from).collect(),
            updated_at: row.updated_at,
        }
    }
}

pub(super) fn parse_marketplace(request_id: &str, raw: &str) -> Result<Marketplace, ApiError> {
    raw.parse()
        .map_err(|e: mkthub_core::CoreError| ApiError::new(request_id, "bad_request", e.to_string()))
}

pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderSummary>>>, ApiError> {
    let marketplace = query
        .marketplace
        .as_deref()
        .map(|m| parse_marketplace(&req_id.0, m))
        .transpose()?;
    let status_interno = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<StatusInterno>()
                .map_err(|e| ApiError::new(req_id.0.clone(), "bad_request", e.to_string()))
        })
        .transpose()?;

    let filter = PresentedOrderFilter {
        marketplace,
        status_interno,
        limit: normalize_limit(query.limit),
    };
    let rows = mkthub_db::list_presented_orders(&state.pool, org, &filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(OrderSummary::from).collect();
    Ok(ApiResponse::new(data, req_id.0))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Path((marketplace, order_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<OrderDetail>>, ApiError> {
    let marketplace = parse_marketplace(&req_id.0, &marketplace)?;
    let row = mkthub_db::get_presented_order(&state.pool, org, marketplace, &order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("{marketplace} order {order_id} not found"),
            )
        })?;
    let items = mkthub_db::get_presented_order_items(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(OrderDetail::new(row, items), req_id.0))
}

/// Rebuilds the presented order from its stored raw payload.
pub(super) async fn reprocess_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(OrgContext(org)): Extension<OrgContext>,
    Path((marketplace, order_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<StoredOrder>>, ApiError> {
    let marketplace = parse_marketplace(&req_id.0, &marketplace)?;
    let owned = mkthub_db::get_raw_order(&state.pool, marketplace, &order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .is_some_and(|raw| raw.organization_id == org);
    if !owned {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("no raw payload stored for {marketplace} order {order_id}"),
        ));
    }

    let stored = mkthub_ingest::process_presented(&state.pool, marketplace, &order_id)
        .await
        .map_err(|e| map_ingest_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(stored, req_id.0))
}

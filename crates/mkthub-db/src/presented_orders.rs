//! Database operations for `presented_orders` and `presented_order_items`.

use chrono::{DateTime, Utc};
use mkthub_core::{Marketplace, PresentedOrder, StatusInterno};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `presented_orders`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PresentedOrderRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub marketplace: String,
    pub marketplace_order_id: String,
    pub pack_id: Option<String>,
    pub vendor_status: String,
    pub vendor_substatus: Option<String>,
    pub status_interno: String,
    pub ordered_at: Option<DateTime<Utc>>,
    pub vendor_updated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ship_by: Option<DateTime<Utc>>,
    pub currency: String,
    pub total_amount: Decimal,
    pub items_total: Decimal,
    pub shipping_cost: Option<Decimal>,
    pub marketplace_fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub installments: Option<i32>,
    pub buyer_id: Option<String>,
    pub buyer_nickname: Option<String>,
    pub buyer_name: Option<String>,
    pub buyer_document: Option<String>,
    pub shipment_id: Option<String>,
    pub logistic_type: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipment_status: Option<String>,
    pub shipment_substatus: Option<String>,
    pub receiver_name: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_zip_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from `presented_order_items`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PresentedItemRow {
    pub id: i64,
    pub presented_order_id: i64,
    pub line_no: i32,
    pub listing_id: String,
    pub variation_id: Option<String>,
    pub title: String,
    pub sku: Option<String>,
    pub variation_label: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub sale_fee: Option<Decimal>,
    pub linked_product_id: Option<Uuid>,
    pub link_kind: Option<String>,
}

/// Result of [`upsert_presented_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub presented_order_id: i64,
    /// `None` when the order was inserted for the first time.
    pub previous_status: Option<StatusInterno>,
    /// The status actually stored after applying [`StatusInterno::advance`].
    pub status_interno: StatusInterno,
}

impl UpsertOutcome {
    #[must_use]
    pub fn status_changed(&self) -> bool {
        self.previous_status != Some(self.status_interno)
    }
}

/// Filters for [`list_presented_orders`].
#[derive(Debug, Clone, Default)]
pub struct PresentedOrderFilter {
    pub marketplace: Option<Marketplace>,
    pub status_interno: Option<StatusInterno>,
    pub limit: i64,
}

const ORDER_COLUMNS: &str = "id, organization_id, integration_id, marketplace, \
     marketplace_order_id, pack_id, vendor_status, vendor_substatus, status_interno, \
     ordered_at, vendor_updated_at, paid_at, ship_by, currency, total_amount, items_total, \
     shipping_cost, marketplace_fee, net_amount, payment_method, installments, buyer_id, \
     buyer_nickname, buyer_name, buyer_document, shipment_id, logistic_type, carrier, \
     tracking_number, shipment_status, shipment_substatus, receiver_name, shipping_address, \
     shipping_city, shipping_state, shipping_zip_code, estimated_delivery, created_at, updated_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Upserts a presented order and its items in one transaction.
///
/// Writers of the same order are serialized with a transaction-scoped
/// advisory lock, including the first insert. The stored `status_interno`
/// is combined with the incoming one through [`StatusInterno::advance`] and
/// written back, so concurrent webhook and scheduler runs cannot regress an
/// order. Items are keyed by
/// `(presented_order_id, line_no)`; lines beyond the new item count are
/// removed.
///
/// Re-running with identical input leaves the database unchanged apart from
/// `updated_at`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails, or
/// [`DbError::InvalidColumn`] if the stored status label is unknown.
pub async fn upsert_presented_order(
    pool: &PgPool,
    order: &PresentedOrder,
) -> Result<UpsertOutcome, DbError> {
    let mut tx = pool.begin().await?;

    // Row locks cover nothing before the first insert; the advisory lock
    // serializes writers of the same order until commit.
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!(
            "presented:{}:{}",
            order.marketplace.as_str(),
            order.marketplace_order_id
        ))
        .execute(&mut *tx)
        .await?;

    let previous: Option<String> = sqlx::query_scalar::<_, String>(
        "SELECT status_interno FROM presented_orders \
         WHERE marketplace = $1 AND marketplace_order_id = $2 \
         FOR UPDATE",
    )
    .bind(order.marketplace.as_str())
    .bind(&order.marketplace_order_id)
    .fetch_optional(&mut *tx)
    .await?;

    let previous_status = previous
        .map(|label| {
            label.parse::<StatusInterno>().map_err(|_| DbError::InvalidColumn {
                column: "status_interno",
                value: label,
            })
        })
        .transpose()?;
    let status_interno = StatusInterno::advance(previous_status, order.status_interno);

    let presented_order_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO presented_orders \
             (organization_id, integration_id, marketplace, marketplace_order_id, pack_id, \
              vendor_status, vendor_substatus, status_interno, ordered_at, vendor_updated_at, \
              paid_at, ship_by, currency, total_amount, items_total, shipping_cost, \
              marketplace_fee, net_amount, payment_method, installments, buyer_id, \
              buyer_nickname, buyer_name, buyer_document, shipment_id, logistic_type, carrier, \
              tracking_number, shipment_status, shipment_substatus, receiver_name, \
              shipping_address, shipping_city, shipping_state, shipping_zip_code, \
              estimated_delivery) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
                 $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, \
                 $33, $34, $35, $36) \
         ON CONFLICT (marketplace, marketplace_order_id) DO UPDATE SET \
             integration_id     = EXCLUDED.integration_id, \
             pack_id            = EXCLUDED.pack_id, \
             vendor_status      = EXCLUDED.vendor_status, \
             vendor_substatus   = EXCLUDED.vendor_substatus, \
             status_interno     = EXCLUDED.status_interno, \
             ordered_at         = EXCLUDED.ordered_at, \
             vendor_updated_at  = EXCLUDED.vendor_updated_at, \
             paid_at            = EXCLUDED.paid_at, \
             ship_by            = EXCLUDED.ship_by, \
             currency           = EXCLUDED.currency, \
             total_amount       = EXCLUDED.total_amount, \
             items_total        = EXCLUDED.items_total, \
             shipping_cost      = EXCLUDED.shipping_cost, \
             marketplace_fee    = EXCLUDED.marketplace_fee, \
             net_amount         = EXCLUDED.net_amount, \
             payment_method     = EXCLUDED.payment_method, \
             installments       = EXCLUDED.installments, \
             buyer_id           = EXCLUDED.buyer_id, \
             buyer_nickname     = EXCLUDED.buyer_nickname, \
             buyer_name         = EXCLUDED.buyer_name, \
             buyer_document     = EXCLUDED.buyer_document, \
             shipment_id        = EXCLUDED.shipment_id, \
             logistic_type      = EXCLUDED.logistic_type, \
             carrier            = EXCLUDED.carrier, \
             tracking_number    = EXCLUDED.tracking_number, \
             shipment_status    = EXCLUDED.shipment_status, \
             shipment_substatus = EXCLUDED.shipment_substatus, \
             receiver_name      = EXCLUDED.receiver_name, \
             shipping_address   = EXCLUDED.shipping_address, \
             shipping_city      = EXCLUDED.shipping_city, \
             shipping_state     = EXCLUDED.shipping_state, \
             shipping_zip_code  = EXCLUDED.shipping_zip_code, \
             estimated_delivery = EXCLUDED.estimated_delivery, \
             updated_at         = NOW() \
         RETURNING id",
    )
    .bind(order.organization_id)
    .bind(order.integration_id)
    .bind(order.marketplace.as_str())
    .bind(&order.marketplace_order_id)
    .bind(&order.pack_id)
    .bind(&order.vendor_status)
    .bind(&order.vendor_substatus)
    .bind(status_interno.as_str())
    .bind(order.ordered_at)
    .bind(order.vendor_updated_at)
    .bind(order.paid_at)
    .bind(order.ship_by)
    .bind(&order.currency)
    .bind(order.total_amount)
    .bind(order.items_total)
    .bind(order.shipping_cost)
    .bind(order.marketplace_fee)
    .bind(order.net_amount)
    .bind(&order.payment_method)
    .bind(order.installments)
    .bind(&order.buyer.id)
    .bind(&order.buyer.nickname)
    .bind(&order.buyer.name)
    .bind(&order.buyer.document)
    .bind(&order.shipping.shipment_id)
    .bind(&order.shipping.logistic_type)
    .bind(&order.shipping.carrier)
    .bind(&order.shipping.tracking_number)
    .bind(&order.shipping.status)
    .bind(&order.shipping.substatus)
    .bind(&order.shipping.receiver_name)
    .bind(&order.shipping.address)
    .bind(&order.shipping.city)
    .bind(&order.shipping.state)
    .bind(&order.shipping.zip_code)
    .bind(order.shipping.estimated_delivery)
    .fetch_one(&mut *tx)
    .await?;

    let item_count = i32::try_from(order.items.len()).unwrap_or(i32::MAX);

    sqlx::query("DELETE FROM presented_order_items WHERE presented_order_id = $1 AND line_no >= $2")
        .bind(presented_order_id)
        .bind(item_count)
        .execute(&mut *tx)
        .await?;

    for (line_no, item) in (0..item_count).zip(&order.items) {
        sqlx::query(
            "INSERT INTO presented_order_items \
                 (presented_order_id, line_no, listing_id, variation_id, title, sku, \
                  variation_label, quantity, unit_price, sale_fee, linked_product_id, link_kind) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (presented_order_id, line_no) DO UPDATE SET \
                 listing_id        = EXCLUDED.listing_id, \
                 variation_id      = EXCLUDED.variation_id, \
                 title             = EXCLUDED.title, \
                 sku               = EXCLUDED.sku, \
                 variation_label   = EXCLUDED.variation_label, \
                 quantity          = EXCLUDED.quantity, \
                 unit_price        = EXCLUDED.unit_price, \
                 sale_fee          = EXCLUDED.sale_fee, \
                 linked_product_id = EXCLUDED.linked_product_id, \
                 link_kind         = EXCLUDED.link_kind",
        )
        .bind(presented_order_id)
        .bind(line_no)
        .bind(&item.listing_id)
        .bind(&item.variation_id)
        .bind(&item.title)
        .bind(&item.sku)
        .bind(&item.variation_label)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.sale_fee)
        .bind(item.link.map(|l| l.product_id))
        .bind(item.link.map(|l| l.kind.as_str()))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(UpsertOutcome {
        presented_order_id,
        previous_status,
        status_interno,
    })
}

/// Fetches a presented order within an organization.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_presented_order(
    pool: &PgPool,
    organization_id: Uuid,
    marketplace: Marketplace,
    marketplace_order_id: &str,
) -> Result<Option<PresentedOrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM presented_orders \
         WHERE organization_id = $1 AND marketplace = $2 AND marketplace_order_id = $3"
    );
    let row = sqlx::query_as::<_, PresentedOrderRow>(&sql)
        .bind(organization_id)
        .bind(marketplace.as_str())
        .bind(marketplace_order_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns the items of a presented order ordered by line number.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_presented_order_items(
    pool: &PgPool,
    presented_order_id: i64,
) -> Result<Vec<PresentedItemRow>, DbError> {
    let rows = sqlx::query_as::<_, PresentedItemRow>(
        "SELECT id, presented_order_id, line_no, listing_id, variation_id, title, sku, \
                variation_label, quantity, unit_price, sale_fee, linked_product_id, link_kind \
         FROM presented_order_items \
         WHERE presented_order_id = $1 \
         ORDER BY line_no",
    )
    .bind(presented_order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Lists an organization's presented orders, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_presented_orders(
    pool: &PgPool,
    organization_id: Uuid,
    filter: &PresentedOrderFilter,
) -> Result<Vec<PresentedOrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM presented_orders \
         WHERE organization_id = $1 \
           AND ($2::text IS NULL OR marketplace = $2) \
           AND ($3::text IS NULL OR status_interno = $3) \
         ORDER BY ordered_at DESC NULLS LAST, id DESC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, PresentedOrderRow>(&sql)
        .bind(organization_id)
        .bind(filter.marketplace.map(Marketplace::as_str))
        .bind(filter.status_interno.map(StatusInterno::as_str))
        .bind(filter.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns the stored `status_interno` of an order, if the order is known.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or
/// [`DbError::InvalidColumn`] if the stored label is unknown.
pub async fn get_presented_status(
    pool: &PgPool,
    marketplace: Marketplace,
    marketplace_order_id: &str,
) -> Result<Option<StatusInterno>, DbError> {
    let label = sqlx::query_scalar::<_, String>(
        "SELECT status_interno FROM presented_orders \
         WHERE marketplace = $1 AND marketplace_order_id = $2",
    )
    .bind(marketplace.as_str())
    .bind(marketplace_order_id)
    .fetch_optional(pool)
    .await?;

    label
        .map(|label| {
            label.parse::<StatusInterno>().map_err(|_| DbError::InvalidColumn {
                column: "status_interno",
                value: label,
            })
        })
        .transpose()
}

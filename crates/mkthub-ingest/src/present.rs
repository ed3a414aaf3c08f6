//! Presented-order persistence: link resolution, upsert and stock.

use mkthub_core::{LinkKind, Marketplace, PresentedItem, ResolvedLink, StatusInterno};
use mkthub_db::IntegrationRow;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::connector::present_bundle;
use crate::error::IngestError;

/// What happened to one order after it was presented and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredOrder {
    pub marketplace: Marketplace,
    pub order_id: String,
    pub presented_order_id: i64,
    pub status_interno: StatusInterno,
    pub status_changed: bool,
    pub linked_items: usize,
    pub open_reservations: i64,
    pub released_reservations: u64,
}

/// Resolves the internal product of each line.
///
/// A permanent link for `(listing, variation)` or `(listing, '')` wins.
/// Otherwise a product with the line's SKU gives an ephemeral link that is
/// recorded on the item row only.
///
/// # Errors
///
/// Returns [`IngestError::Db`] if a lookup fails.
pub async fn resolve_links(
    pool: &PgPool,
    organization_id: Uuid,
    marketplace: Marketplace,
    items: &mut [PresentedItem],
) -> Result<(), IngestError> {
    for item in items.iter_mut() {
        let permanent = mkthub_db::find_product_link(
            pool,
            organization_id,
            marketplace,
            &item.listing_id,
            item.variation_id.as_deref(),
        )
        .await?;

        item.link = if let Some(link) = permanent {
            Some(ResolvedLink {
                product_id: link.product_id,
                kind: LinkKind::Permanent,
            })
        } else if let Some(sku) = item.sku.as_deref().filter(|s| !s.trim().is_empty()) {
            mkthub_db::find_product_by_sku(pool, organization_id, sku)
                .await?
                .map(|product| ResolvedLink {
                    product_id: product.id,
                    kind: LinkKind::Ephemeral,
                })
        } else {
            None
        };
    }
    Ok(())
}

/// Normalizes a raw bundle for `integration`, resolves links, upserts the
/// presented order and reserves or releases its stock.
///
/// # Errors
///
/// Returns a normalizer error for malformed bundles or
/// [`IngestError::Db`] if any write fails.
pub async fn present_and_store(
    pool: &PgPool,
    raw_bundle: &Value,
    integration: &IntegrationRow,
) -> Result<StoredOrder, IngestError> {
    let marketplace = integration.marketplace()?;
    let mut order = present_bundle(
        marketplace,
        raw_bundle,
        integration.organization_id,
        integration.id,
    )?;
    resolve_links(pool, integration.organization_id, marketplace, &mut order.items).await?;
    let linked_items = order.items.iter().filter(|i| i.link.is_some()).count();

    let outcome = mkthub_db::upsert_presented_order(pool, &order).await?;

    let (open_reservations, released_reservations) = if outcome.status_interno.releases_stock() {
        let released = mkthub_db::release_stock_for_order(pool, outcome.presented_order_id).await?;
        (0, released)
    } else {
        let open = mkthub_db::reserve_stock_for_order(pool, outcome.presented_order_id).await?;
        (open, 0)
    };

    if outcome.status_changed() {
        tracing::info!(
            marketplace = %marketplace,
            order_id = %order.marketplace_order_id,
            from = ?outcome.previous_status.map(StatusInterno::as_str),
            to = %outcome.status_interno,
            "order status changed"
        );
    }

    Ok(StoredOrder {
        marketplace,
        order_id: order.marketplace_order_id,
        presented_order_id: outcome.presented_order_id,
        status_interno: outcome.status_interno,
        status_changed: outcome.status_changed(),
        linked_items,
        open_reservations,
        released_reservations,
    })
}

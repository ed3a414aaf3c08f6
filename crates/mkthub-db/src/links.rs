//! Listing-to-product links (`product_links`) and SKU lookups on `products`.

use chrono::{DateTime, Utc};
use mkthub_core::Marketplace;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, ProductRow};

/// A row from `product_links`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductLinkRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub listing_id: String,
    /// Variation id, or `""` when the link covers the whole listing.
    pub variation_key: String,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creates or repoints the permanent link for a listing/variation.
///
/// Pass `None` as `variation_id` to link the listing as a whole.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product_link(
    pool: &PgPool,
    organization_id: Uuid,
    marketplace: Marketplace,
    listing_id: &str,
    variation_id: Option<&str>,
    product_id: Uuid,
) -> Result<ProductLinkRow, DbError> {
    let row = sqlx::query_as::<_, ProductLinkRow>(
        "INSERT INTO product_links \
             (organization_id, marketplace, listing_id, variation_key, product_id) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (organization_id, marketplace, listing_id, variation_key) DO UPDATE SET \
             product_id = EXCLUDED.product_id, \
             updated_at = NOW() \
         RETURNING id, organization_id, marketplace, listing_id, variation_key, product_id, \
                   created_at, updated_at",
    )
    .bind(organization_id)
    .bind(marketplace.as_str())
    .bind(listing_id)
    .bind(variation_id.unwrap_or(""))
    .bind(product_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Finds the permanent link for a listing line.
///
/// A variation-specific link wins; otherwise a listing-wide link (empty
/// variation key) applies to every variation.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_product_link(
    pool: &PgPool,
    organization_id: Uuid,
    marketplace: Marketplace,
    listing_id: &str,
    variation_id: Option<&str>,
) -> Result<Option<ProductLinkRow>, DbError> {
    let row = sqlx::query_as::<_, ProductLinkRow>(
        "SELECT id, organization_id, marketplace, listing_id, variation_key, product_id, \
                created_at, updated_at \
         FROM product_links \
         WHERE organization_id = $1 AND marketplace = $2 AND listing_id = $3 \
           AND variation_key IN ($4, '') \
         ORDER BY (variation_key = '') ASC \
         LIMIT 1",
    )
    .bind(organization_id)
    .bind(marketplace.as_str())
    .bind(listing_id)
    .bind(variation_id.unwrap_or(""))
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Finds an internal product by exact SKU within an organization.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_product_by_sku(
    pool: &PgPool,
    organization_id: Uuid,
    sku: &str,
) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, organization_id, sku, name, stock_quantity, created_at, updated_at \
         FROM products \
         WHERE organization_id = $1 AND sku = $2",
    )
    .bind(organization_id)
    .bind(sku.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

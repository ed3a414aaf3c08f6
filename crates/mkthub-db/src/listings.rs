//! Synced marketplace listings (`marketplace_listings`).

use chrono::{DateTime, Utc};
use mkthub_core::Marketplace;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Input for [`upsert_listing`].
#[derive(Debug, Clone)]
pub struct NewListing {
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub marketplace: Marketplace,
    pub listing_id: String,
    pub title: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub available_quantity: Option<i32>,
    pub status: Option<String>,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    /// Array of `{id, sku, label, price, available_quantity}` objects.
    pub variations: serde_json::Value,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub marketplace: String,
    pub listing_id: String,
    pub title: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub available_quantity: Option<i32>,
    pub status: Option<String>,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub variations: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

/// Upserts a listing keyed by `(marketplace, listing_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_listing(pool: &PgPool, listing: &NewListing) -> Result<ListingRow, DbError> {
    let row = sqlx::query_as::<_, ListingRow>(
        "INSERT INTO marketplace_listings \
             (organization_id, integration_id, marketplace, listing_id, title, sku, price, \
              available_quantity, status, permalink, thumbnail, variations) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (marketplace, listing_id) DO UPDATE SET \
             integration_id     = EXCLUDED.integration_id, \
             title              = EXCLUDED.title, \
             sku                = EXCLUDED.sku, \
             price              = EXCLUDED.price, \
             available_quantity = EXCLUDED.available_quantity, \
             status             = EXCLUDED.status, \
             permalink          = EXCLUDED.permalink, \
             thumbnail          = EXCLUDED.thumbnail, \
             variations         = EXCLUDED.variations, \
             synced_at          = NOW() \
         RETURNING id, organization_id, integration_id, marketplace, listing_id, title, sku, \
                   price, available_quantity, status, permalink, thumbnail, variations, synced_at",
    )
    .bind(listing.organization_id)
    .bind(listing.integration_id)
    .bind(listing.marketplace.as_str())
    .bind(&listing.listing_id)
    .bind(&listing.title)
    .bind(&listing.sku)
    .bind(listing.price)
    .bind(listing.available_quantity)
    .bind(&listing.status)
    .bind(&listing.permalink)
    .bind(&listing.thumbnail)
    .bind(&listing.variations)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

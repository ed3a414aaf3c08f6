//! Database operations for `marketplace_raw_orders`.
//!
//! One row per `(marketplace, marketplace_order_id)` holding the payload
//! bundle last fetched from the vendor.

use chrono::{DateTime, Utc};
use mkthub_core::Marketplace;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawOrderRow {
    pub id: i64,
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub marketplace: String,
    pub marketplace_order_id: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// Stores the latest raw payload for an order, replacing any previous one.
///
/// Returns the row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_raw_order(
    pool: &PgPool,
    organization_id: Uuid,
    integration_id: Uuid,
    marketplace: Marketplace,
    marketplace_order_id: &str,
    payload: &serde_json::Value,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO marketplace_raw_orders \
             (organization_id, integration_id, marketplace, marketplace_order_id, payload) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (marketplace, marketplace_order_id) DO UPDATE SET \
             integration_id = EXCLUDED.integration_id, \
             payload        = EXCLUDED.payload, \
             fetched_at     = NOW() \
         RETURNING id",
    )
    .bind(organization_id)
    .bind(integration_id)
    .bind(marketplace.as_str())
    .bind(marketplace_order_id)
    .bind(payload)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Fetches the stored raw payload for an order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_raw_order(
    pool: &PgPool,
    marketplace: Marketplace,
    marketplace_order_id: &str,
) -> Result<Option<RawOrderRow>, DbError> {
    let row = sqlx::query_as::<_, RawOrderRow>(
        "SELECT id, organization_id, integration_id, marketplace, marketplace_order_id, \
                payload, fetched_at \
         FROM marketplace_raw_orders \
         WHERE marketplace = $1 AND marketplace_order_id = $2",
    )
    .bind(marketplace.as_str())
    .bind(marketplace_order_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

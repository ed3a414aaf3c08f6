//! Database operations for `organizations` and the internal `products` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An internal product (SKU) that marketplace listings can be linked to.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub sku: String,
    pub name: String,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creates a tenant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_organization(pool: &PgPool, name: &str) -> Result<OrganizationRow, DbError> {
    let row = sqlx::query_as::<_, OrganizationRow>(
        "INSERT INTO organizations (name) VALUES ($1) RETURNING id, name, created_at",
    )
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Upserts an internal product keyed by `(organization_id, sku)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(
    pool: &PgPool,
    organization_id: Uuid,
    sku: &str,
    name: &str,
    stock_quantity: i32,
) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "INSERT INTO products (organization_id, sku, name, stock_quantity) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (organization_id, sku) DO UPDATE SET \
             name           = EXCLUDED.name, \
             stock_quantity = EXCLUDED.stock_quantity, \
             updated_at     = NOW() \
         RETURNING id, organization_id, sku, name, stock_quantity, created_at, updated_at",
    )
    .bind(organization_id)
    .bind(sku)
    .bind(name)
    .bind(stock_quantity)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

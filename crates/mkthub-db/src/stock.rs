//! Stock reservations held by presented order lines.
//!
//! One reservation per linked line, keyed by `(presented_order_id, line_no)`.
//! Available stock is `products.stock_quantity` minus open reservations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Reserves stock for every linked line of an order.
///
/// Open reservations follow the current quantity and product of their line.
/// Reservations of lines that are gone or no longer linked are dropped.
/// Released reservations are left alone, so a released order never
/// re-reserves. Returns the number of open reservations afterwards.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails.
pub async fn reserve_stock_for_order(pool: &PgPool, presented_order_id: i64) -> Result<i64, DbError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM stock_reservations r \
         WHERE r.presented_order_id = $1 \
           AND r.released_at IS NULL \
           AND NOT EXISTS ( \
               SELECT 1 FROM presented_order_items i \
               WHERE i.presented_order_id = r.presented_order_id \
                 AND i.line_no = r.line_no \
                 AND i.linked_product_id IS NOT NULL)",
    )
    .bind(presented_order_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO stock_reservations (presented_order_id, line_no, product_id, quantity) \
         SELECT presented_order_id, line_no, linked_product_id, quantity \
         FROM presented_order_items \
         WHERE presented_order_id = $1 AND linked_product_id IS NOT NULL \
         ON CONFLICT (presented_order_id, line_no) DO UPDATE SET \
             product_id = EXCLUDED.product_id, \
             quantity   = EXCLUDED.quantity \
         WHERE stock_reservations.released_at IS NULL",
    )
    .bind(presented_order_id)
    .execute(&mut *tx)
    .await?;

    let open = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM stock_reservations \
         WHERE presented_order_id = $1 AND released_at IS NULL",
    )
    .bind(presented_order_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(open)
}

/// Releases every open reservation of an order. Returns how many were released.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn release_stock_for_order(pool: &PgPool, presented_order_id: i64) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE stock_reservations SET released_at = NOW() \
         WHERE presented_order_id = $1 AND released_at IS NULL",
    )
    .bind(presented_order_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Stock on hand minus open reservations for one product.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn available_stock(pool: &PgPool, product_id: Uuid) -> Result<i64, DbError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT p.stock_quantity::BIGINT - COALESCE(( \
                    SELECT SUM(r.quantity)::BIGINT FROM stock_reservations r \
                    WHERE r.product_id = p.id AND r.released_at IS NULL), 0) \
         FROM products p \
         WHERE p.id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

//! Single-order command handlers. Results are printed as JSON.

use mkthub_core::{AppConfig, Marketplace};
use mkthub_ingest::Connector;
use mkthub_shopee::ShipmentMode;
use uuid::Uuid;

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) async fn run_process(
    pool: &sqlx::PgPool,
    marketplace: Marketplace,
    order_id: &str,
) -> anyhow::Result<()> {
    let stored = mkthub_ingest::process_presented(pool, marketplace, order_id).await?;
    print_json(&stored)
}

pub(crate) async fn run_ingest(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    integration: Uuid,
    order_id: &str,
) -> anyhow::Result<()> {
    let row = mkthub_db::get_integration(pool, integration).await?;
    let connector = Connector::for_integration(pool, config, &row).await?;
    let stored = mkthub_ingest::ingest_order(pool, &connector, &row, order_id).await?;
    print_json(&stored)
}

pub(crate) async fn run_arrange_shipment(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    integration: Uuid,
    order_sn: &str,
    mode: ShipmentMode,
) -> anyhow::Result<()> {
    let row = mkthub_db::get_integration(pool, integration).await?;
    let arranged =
        mkthub_ingest::arrange_shopee_shipment(pool, config, &row, order_sn, mode).await?;
    if arranged.mode != mode {
        tracing::warn!(
            order_sn,
            requested = %mode,
            used = %arranged.mode,
            "requested shipment mode not offered"
        );
    }
    print_json(&arranged)
}

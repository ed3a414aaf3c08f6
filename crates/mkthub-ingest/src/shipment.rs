//! Arranging Shopee shipments.

use mkthub_core::{AppConfig, Marketplace};
use mkthub_db::IntegrationRow;
use mkthub_shopee::ShipmentMode;
use serde::Serialize;
use sqlx::PgPool;

use crate::connector::Connector;
use crate::error::IngestError;
use crate::orders::ingest_order;
use crate::present::StoredOrder;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrangedShipment {
    /// The mode actually used; may differ from the requested one.
    pub mode: ShipmentMode,
    pub order: StoredOrder,
}

/// Ships a Shopee order, then re-ingests it so the presented status
/// advances.
///
/// # Errors
///
/// Returns [`IngestError::WrongMarketplace`] for non-Shopee integrations,
/// the Shopee error (including `ShipmentNotPossible`), or any error from
/// re-ingesting the order.
pub async fn arrange_shopee_shipment(
    pool: &PgPool,
    config: &AppConfig,
    integration: &IntegrationRow,
    order_sn: &str,
    mode: ShipmentMode,
) -> Result<ArrangedShipment, IngestError> {
    let connector = Connector::for_integration(pool, config, integration).await?;
    arrange_with_connector(pool, &connector, integration, order_sn, mode).await
}

/// [`arrange_shopee_shipment`] with an already built connector.
///
/// # Errors
///
/// See [`arrange_shopee_shipment`].
pub async fn arrange_with_connector(
    pool: &PgPool,
    connector: &Connector,
    integration: &IntegrationRow,
    order_sn: &str,
    mode: ShipmentMode,
) -> Result<ArrangedShipment, IngestError> {
    let Connector::Shopee(client) = connector else {
        return Err(IngestError::WrongMarketplace {
            integration_id: integration.id,
            expected: Marketplace::Shopee,
            actual: integration.marketplace()?,
        });
    };

    let used = client.arrange_shipment(order_sn, mode).await?;
    let order = ingest_order(pool, connector, integration, order_sn).await?;
    Ok(ArrangedShipment { mode: used, order })
}

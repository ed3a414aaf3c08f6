//! Shipping parameters and `ship_order`.

use serde_json::Value;

use crate::error::ShopeeError;
use crate::shipment::{ship_order_body, ShipmentMode};
use crate::types::ShopeeShippingParameter;

use super::ShopeeClient;

impl ShopeeClient {
    /// `GET /api/v2/logistics/get_shipping_parameter`.
    ///
    /// # Errors
    ///
    /// Returns any transport, auth or API error, or
    /// [`ShopeeError::Deserialize`] for an unexpected response shape.
    pub async fn get_shipping_parameter(
        &self,
        order_sn: &str,
    ) -> Result<ShopeeShippingParameter, ShopeeError> {
        let body = self
            .shop_get(
                "/api/v2/logistics/get_shipping_parameter",
                &[("order_sn", order_sn.to_owned())],
            )
            .await?;
        serde_json::from_value(body).map_err(|e| ShopeeError::Deserialize {
            context: "get_shipping_parameter".to_owned(),
            source: e,
        })
    }

    /// `POST /api/v2/logistics/ship_order` with a prepared body.
    ///
    /// # Errors
    ///
    /// Returns any transport, auth or API error.
    pub async fn ship_order(&self, body: &Value) -> Result<Value, ShopeeError> {
        self.shop_post("/api/v2/logistics/ship_order", body).await
    }

    /// Reads the shipping parameters, picks pickup or dropoff and ships.
    /// Returns the mode that was used.
    ///
    /// # Errors
    ///
    /// Returns [`ShopeeError::ShipmentNotPossible`] when no mode can be
    /// arranged, or any error from the two requests.
    pub async fn arrange_shipment(
        &self,
        order_sn: &str,
        mode: ShipmentMode,
    ) -> Result<ShipmentMode, ShopeeError> {
        let param = self.get_shipping_parameter(order_sn).await?;
        let (used, body) = ship_order_body(order_sn, mode, &param)?;
        self.ship_order(&body).await?;
        tracing::info!(order_sn, shop_id = self.shop_id, mode = %used, "Shopee shipment arranged");
        Ok(used)
    }
}

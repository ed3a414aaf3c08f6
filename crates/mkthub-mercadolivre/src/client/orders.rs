//! Orders, shipments and billing info.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::error::MercadoLivreError;
use crate::types::MlOrderSearch;

use super::{MercadoLivreClient, MAX_PAGES};

const SEARCH_PAGE_SIZE: u64 = 50;

impl MercadoLivreClient {
    /// `GET /orders/{id}`.
    ///
    /// # Errors
    ///
    /// Returns [`MercadoLivreError::NotFound`] for unknown orders, or any
    /// transport/auth error from the request.
    pub async fn get_order(&self, order_id: &str) -> Result<Value, MercadoLivreError> {
        self.get_json(&format!("/orders/{order_id}"), &[], false)
            .await
    }

    /// `GET /shipments/{id}` in the new response format.
    ///
    /// # Errors
    ///
    /// Returns any transport/auth error from the request.
    pub async fn get_shipment(&self, shipment_id: i64) -> Result<Value, MercadoLivreError> {
        self.get_json(&format!("/shipments/{shipment_id}"), &[], true)
            .await
    }

    /// `GET /orders/{id}/billing_info`. Orders without billing data yield
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns any transport/auth error other than 404.
    pub async fn get_billing_info(&self, order_id: &str) -> Result<Option<Value>, MercadoLivreError> {
        match self
            .get_json(&format!("/orders/{order_id}/billing_info"), &[], false)
            .await
        {
            Ok(body) => Ok(Some(body)),
            Err(MercadoLivreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Ids of the seller's orders updated since `since`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`MercadoLivreError::PaginationLimit`] past [`MAX_PAGES`], or
    /// any error from a page request.
    pub async fn search_order_ids(
        &self,
        seller_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, MercadoLivreError> {
        let from = since.to_rfc3339_opts(SecondsFormat::Millis, false);
        let mut ids = Vec::new();
        let mut offset = 0u64;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(MercadoLivreError::PaginationLimit {
                    max_pages: MAX_PAGES,
                    context: format!("orders/search seller={seller_id}"),
                });
            }

            let query = [
                ("seller", seller_id.to_owned()),
                ("order.date_last_updated.from", from.clone()),
                ("sort", "date_desc".to_owned()),
                ("offset", offset.to_string()),
                ("limit", SEARCH_PAGE_SIZE.to_string()),
            ];
            let body = self.get_json("/orders/search", &query, false).await?;
            let page: MlOrderSearch =
                serde_json::from_value(body).map_err(|e| MercadoLivreError::Deserialize {
                    context: "orders/search".to_owned(),
                    source: e,
                })?;

            let received = page.results.len() as u64;
            ids.extend(page.results.into_iter().map(|r| r.id.to_string()));

            offset += received;
            if received == 0 || offset >= page.paging.total {
                break;
            }
        }

        Ok(ids)
    }

    /// Fetches an order with its shipment and billing info as one raw payload:
    /// `{"order": …, "shipment": … | null, "billing_info": … | null}`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the order and shipment requests. A missing
    /// billing endpoint is tolerated.
    pub async fn fetch_order_bundle(&self, order_id: &str) -> Result<Value, MercadoLivreError> {
        let order = self.get_order(order_id).await?;

        let shipment = match order.pointer("/shipping/id").and_then(Value::as_i64) {
            Some(shipment_id) => Some(self.get_shipment(shipment_id).await?),
            None => None,
        };

        let billing_info = self.get_billing_info(order_id).await?;

        Ok(json!({
            "order": order,
            "shipment": shipment,
            "billing_info": billing_info,
        }))
    }
}

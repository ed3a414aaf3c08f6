//! Order list, order detail, escrow and tracking.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use crate::error::ShopeeError;
use crate::types::{ShopeeOrderDetailPage, ShopeeOrderListPage};

use super::{ShopeeClient, MAX_PAGES};

const ORDER_LIST_PAGE_SIZE: u32 = 100;
const DETAIL_BATCH_SIZE: usize = 50;

/// `get_order_list` rejects time ranges longer than 15 days.
const MAX_WINDOW_DAYS: i64 = 15;

const DETAIL_OPTIONAL_FIELDS: &str = "buyer_user_id,buyer_username,estimated_shipping_fee,\
recipient_address,actual_shipping_fee,item_list,pay_time,total_amount,payment_method,\
shipping_carrier,package_list,fulfillment_flag,buyer_cpf_id";

/// Splits `[from, to)` into consecutive windows no longer than 15 days.
pub(crate) fn time_windows(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let step = Duration::days(MAX_WINDOW_DAYS);
    let mut windows = Vec::new();
    let mut start = from;
    while start < to {
        let end = (start + step).min(to);
        windows.push((start, end));
        start = end;
    }
    windows
}

impl ShopeeClient {
    /// `order_sn`s of orders updated between `since` and `until`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopeeError::PaginationLimit`] past [`MAX_PAGES`] pages in
    /// total, or any error from a page request.
    pub async fn list_order_sns(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>, ShopeeError> {
        let mut order_sns = Vec::new();
        let mut page_count = 0usize;

        for (from, to) in time_windows(since, until) {
            let mut cursor = String::new();
            loop {
                page_count += 1;
                if page_count > MAX_PAGES {
                    return Err(ShopeeError::PaginationLimit {
                        max_pages: MAX_PAGES,
                        context: format!("get_order_list shop_id={}", self.shop_id),
                    });
                }

                let query = [
                    ("time_range_field", "update_time".to_owned()),
                    ("time_from", from.timestamp().to_string()),
                    ("time_to", to.timestamp().to_string()),
                    ("page_size", ORDER_LIST_PAGE_SIZE.to_string()),
                    ("cursor", cursor.clone()),
                ];
                let body = self.shop_get("/api/v2/order/get_order_list", &query).await?;
                let page: ShopeeOrderListPage =
                    serde_json::from_value(body).map_err(|e| ShopeeError::Deserialize {
                        context: "get_order_list".to_owned(),
                        source: e,
                    })?;

                order_sns.extend(page.order_list.into_iter().map(|o| o.order_sn));

                if !page.more || page.next_cursor.is_empty() {
                    break;
                }
                cursor = page.next_cursor;
            }
        }

        let mut seen = HashSet::new();
        order_sns.retain(|sn| seen.insert(sn.clone()));
        Ok(order_sns)
    }

    /// Raw `get_order_detail` entries, fetched in batches of 50.
    ///
    /// # Errors
    ///
    /// Returns any error from a batch request.
    pub async fn get_order_details(&self, order_sns: &[String]) -> Result<Vec<Value>, ShopeeError> {
        let mut orders = Vec::with_capacity(order_sns.len());
        for batch in order_sns.chunks(DETAIL_BATCH_SIZE) {
            let query = [
                ("order_sn_list", batch.join(",")),
                ("response_optional_fields", DETAIL_OPTIONAL_FIELDS.to_owned()),
            ];
            let body = self
                .shop_get("/api/v2/order/get_order_detail", &query)
                .await?;
            let page: ShopeeOrderDetailPage =
                serde_json::from_value(body).map_err(|e| ShopeeError::Deserialize {
                    context: "get_order_detail".to_owned(),
                    source: e,
                })?;
            orders.extend(page.order_list);
        }
        Ok(orders)
    }

    /// Detail for a single order.
    ///
    /// # Errors
    ///
    /// Returns [`ShopeeError::Api`] with `error_not_found` when Shopee
    /// returns no entry for `order_sn`.
    pub async fn get_order_detail(&self, order_sn: &str) -> Result<Value, ShopeeError> {
        self.get_order_details(&[order_sn.to_owned()])
            .await?
            .into_iter()
            .find(|o| o.get("order_sn").and_then(Value::as_str) == Some(order_sn))
            .ok_or_else(|| ShopeeError::Api {
                error: "error_not_found".to_owned(),
                message: format!("order {order_sn} not returned by get_order_detail"),
            })
    }

    /// `GET /api/v2/payment/get_escrow_detail`.
    ///
    /// # Errors
    ///
    /// Returns any transport, auth or API error.
    pub async fn get_escrow_detail(&self, order_sn: &str) -> Result<Value, ShopeeError> {
        self.shop_get(
            "/api/v2/payment/get_escrow_detail",
            &[("order_sn", order_sn.to_owned())],
        )
        .await
    }

    /// `GET /api/v2/logistics/get_tracking_number`.
    ///
    /// # Errors
    ///
    /// Returns any transport, auth or API error.
    pub async fn get_tracking_number(&self, order_sn: &str) -> Result<Value, ShopeeError> {
        self.shop_get(
            "/api/v2/logistics/get_tracking_number",
            &[("order_sn", order_sn.to_owned())],
        )
        .await
    }

    /// Fetches an order with its escrow and tracking payloads:
    /// `{"detail": …, "escrow": … | null, "tracking": … | null}`.
    ///
    /// Escrow is usually missing before payment clears and tracking before
    /// shipment is arranged, so API errors on those two are logged and the
    /// part left `null`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the detail request, and auth or transport
    /// errors from the optional parts.
    pub async fn fetch_order_bundle(&self, order_sn: &str) -> Result<Value, ShopeeError> {
        let detail = self.get_order_detail(order_sn).await?;
        let escrow = optional_part(order_sn, "escrow", self.get_escrow_detail(order_sn).await)?;
        let tracking =
            optional_part(order_sn, "tracking", self.get_tracking_number(order_sn).await)?;

        Ok(json!({
            "detail": detail,
            "escrow": escrow,
            "tracking": tracking,
        }))
    }
}

fn optional_part(
    order_sn: &str,
    part: &str,
    result: Result<Value, ShopeeError>,
) -> Result<Option<Value>, ShopeeError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ShopeeError::Api { error, message }) => {
            tracing::warn!(order_sn, part, error = %error, message = %message, "Shopee order part unavailable");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn windows_cover_range_in_fifteen_day_steps() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();
        let windows = time_windows(from, to);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].0, from);
        assert_eq!(windows[0].1 - windows[0].0, Duration::days(15));
        assert_eq!(windows[1].0, windows[0].1);
        assert_eq!(windows[2].1, to);
    }

    #[test]
    fn empty_range_has_no_windows() {
        let now = Utc::now();
        assert!(time_windows(now, now).is_empty());
        assert!(time_windows(now, now - Duration::hours(1)).is_empty());
    }
}

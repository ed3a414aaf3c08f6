//! Serde types for the Shopee Open Platform v2 API.

use serde::{Deserialize, Deserializer};

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Every v2 response: `{"error": "", "message": "", "response": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeEnvelope {
    #[serde(deserialize_with = "nullable")]
    pub error: String,
    #[serde(deserialize_with = "nullable")]
    pub message: String,
    pub request_id: Option<String>,
    pub response: Option<serde_json::Value>,
}

impl ShopeeEnvelope {
    /// Error codes that mean the access token is no longer accepted.
    /// `invalid_acceess_token` is spelled that way by the vendor.
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.error.as_str(),
            "error_auth" | "invalid_access_token" | "invalid_acceess_token"
        )
    }
}

/// `POST /api/v2/auth/access_token/get`. Unlike other calls the fields sit
/// at the top level.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopeeTokenResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub error: String,
    #[serde(default, deserialize_with = "nullable")]
    pub message: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expire_in: i64,
}

// ---------------------------------------------------------------------------
// Order list / detail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrderListPage {
    pub more: bool,
    #[serde(deserialize_with = "nullable")]
    pub next_cursor: String,
    #[serde(deserialize_with = "nullable")]
    pub order_list: Vec<ShopeeOrderRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrderRef {
    pub order_sn: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrderDetailPage {
    #[serde(deserialize_with = "nullable")]
    pub order_list: Vec<serde_json::Value>,
}

/// One entry of `get_order_detail.order_list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrder {
    pub order_sn: String,
    #[serde(deserialize_with = "nullable")]
    pub order_status: String,
    pub create_time: Option<i64>,
    pub update_time: Option<i64>,
    pub pay_time: Option<i64>,
    pub ship_by_date: Option<i64>,
    pub currency: Option<String>,
    pub total_amount: Option<f64>,
    pub estimated_shipping_fee: Option<f64>,
    pub actual_shipping_fee: Option<f64>,
    pub payment_method: Option<String>,
    pub buyer_user_id: Option<i64>,
    pub buyer_username: Option<String>,
    pub buyer_cpf_id: Option<String>,
    pub shipping_carrier: Option<String>,
    pub fulfillment_flag: Option<String>,
    pub recipient_address: Option<ShopeeRecipientAddress>,
    #[serde(deserialize_with = "nullable")]
    pub item_list: Vec<ShopeeOrderItem>,
    #[serde(deserialize_with = "nullable")]
    pub package_list: Vec<ShopeePackage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrderItem {
    pub item_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub item_name: String,
    pub item_sku: Option<String>,
    pub model_id: i64,
    pub model_name: Option<String>,
    pub model_sku: Option<String>,
    pub model_quantity_purchased: i32,
    pub model_original_price: Option<f64>,
    pub model_discounted_price: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeRecipientAddress {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub full_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeePackage {
    pub package_number: Option<String>,
    pub logistics_status: Option<String>,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
}

// ---------------------------------------------------------------------------
// Payment / logistics
// ---------------------------------------------------------------------------

/// `get_escrow_detail.response`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeEscrow {
    pub order_income: ShopeeOrderIncome,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeOrderIncome {
    pub escrow_amount: Option<f64>,
    pub commission_fee: Option<f64>,
    pub service_fee: Option<f64>,
    pub actual_shipping_fee: Option<f64>,
    pub estimated_shipping_fee: Option<f64>,
}

/// `get_tracking_number.response`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeTracking {
    pub tracking_number: Option<String>,
}

/// `get_shipping_parameter.response`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeShippingParameter {
    pub info_needed: ShopeeInfoNeeded,
    pub pickup: Option<ShopeePickupOptions>,
    pub dropoff: Option<ShopeeDropoffOptions>,
}

/// Which of `pickup` / `dropoff` the order accepts. A key being present is
/// what matters; its list names the fields that must be filled in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeInfoNeeded {
    pub pickup: Option<Vec<String>>,
    pub dropoff: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeePickupOptions {
    #[serde(deserialize_with = "nullable")]
    pub address_list: Vec<ShopeePickupAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeePickupAddress {
    pub address_id: i64,
    #[serde(deserialize_with = "nullable")]
    pub address_flag: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub time_slot_list: Vec<ShopeeTimeSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeTimeSlot {
    pub pickup_time_id: String,
    pub date: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeDropoffOptions {
    #[serde(deserialize_with = "nullable")]
    pub branch_list: Vec<ShopeeBranch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeeBranch {
    pub branch_id: i64,
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Body of a push delivered to the partner callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShopeePush {
    pub shop_id: i64,
    pub code: i64,
    pub timestamp: Option<i64>,
    pub data: serde_json::Value,
}

/// Push code for order status updates.
pub const PUSH_ORDER_STATUS: i64 = 3;

impl ShopeePush {
    /// `data.ordersn` for order status pushes.
    #[must_use]
    pub fn order_sn(&self) -> Option<&str> {
        if self.code != PUSH_ORDER_STATUS {
            return None;
        }
        self.data
            .get("ordersn")
            .or_else(|| self.data.get("order_sn"))
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|sn| !sn.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_recognizes_vendor_typo() {
        for code in ["error_auth", "invalid_access_token", "invalid_acceess_token"] {
            let env: ShopeeEnvelope =
                serde_json::from_value(json!({"error": code, "message": "x"})).unwrap();
            assert!(env.is_auth_error(), "{code}");
        }
        let ok: ShopeeEnvelope =
            serde_json::from_value(json!({"error": null, "response": {}})).unwrap();
        assert!(ok.error.is_empty());
        assert!(!ok.is_auth_error());
    }

    #[test]
    fn order_status_push_yields_order_sn() {
        let push: ShopeePush = serde_json::from_value(json!({
            "shop_id": 55, "code": 3, "timestamp": 1_700_000_000,
            "data": {"ordersn": "240501ABCDEF", "status": "READY_TO_SHIP"}
        }))
        .unwrap();
        assert_eq!(push.order_sn(), Some("240501ABCDEF"));
    }

    #[test]
    fn other_push_codes_are_ignored() {
        let push: ShopeePush = serde_json::from_value(json!({
            "shop_id": 55, "code": 4, "data": {"ordersn": "240501ABCDEF"}
        }))
        .unwrap();
        assert_eq!(push.order_sn(), None);
    }

    #[test]
    fn info_needed_distinguishes_absent_and_empty() {
        let param: ShopeeShippingParameter = serde_json::from_value(json!({
            "info_needed": {"dropoff": []}
        }))
        .unwrap();
        assert!(param.info_needed.dropoff.is_some());
        assert!(param.info_needed.pickup.is_none());
    }
}

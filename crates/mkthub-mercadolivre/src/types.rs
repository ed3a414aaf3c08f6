//! Serde types for the Mercado Livre REST API.
//!
//! Only the fields the normalizer reads are declared; everything else in the
//! vendor payload is kept verbatim in the raw order JSON.

use serde::{Deserialize, Deserializer, Serialize};

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// `GET /orders/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlOrder {
    pub id: i64,
    #[serde(deserialize_with = "nullable")]
    pub status: String,
    pub date_created: Option<String>,
    pub date_closed: Option<String>,
    pub last_updated: Option<String>,
    pub pack_id: Option<i64>,
    pub total_amount: Option<f64>,
    pub paid_amount: Option<f64>,
    pub currency_id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub order_items: Vec<MlOrderItem>,
    #[serde(deserialize_with = "nullable")]
    pub payments: Vec<MlPayment>,
    pub shipping: Option<MlShippingRef>,
    pub buyer: Option<MlBuyer>,
    #[serde(deserialize_with = "nullable")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlOrderItem {
    pub item: MlOrderItemRef,
    pub quantity: i32,
    pub unit_price: f64,
    /// Fee charged for one unit.
    pub sale_fee: Option<f64>,
    pub currency_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlOrderItemRef {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    pub variation_id: Option<i64>,
    pub seller_sku: Option<String>,
    pub seller_custom_field: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub variation_attributes: Vec<MlAttribute>,
}

/// A `{name, value_name}` pair used for variation labels.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlAttribute {
    pub id: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    pub value_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlPayment {
    pub id: Option<i64>,
    pub status: Option<String>,
    pub payment_type: Option<String>,
    pub payment_method_id: Option<String>,
    pub installments: Option<i32>,
    pub shipping_cost: Option<f64>,
    pub total_paid_amount: Option<f64>,
    pub date_approved: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlShippingRef {
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlBuyer {
    pub id: Option<i64>,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// `GET /orders/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlOrderSearch {
    #[serde(deserialize_with = "nullable")]
    pub results: Vec<MlOrderSearchResult>,
    pub paging: MlPaging,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlOrderSearchResult {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlPaging {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Shipments (`x-format-new: true`)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlShipment {
    pub id: i64,
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub logistic_type: Option<String>,
    pub logistic: Option<MlLogistic>,
    pub tracking_number: Option<String>,
    pub tracking_method: Option<String>,
    pub lead_time: Option<MlLeadTime>,
    pub destination: Option<MlDestination>,
    pub receiver_address: Option<MlAddress>,
}

impl MlShipment {
    /// `logistic_type` on the legacy shape, `logistic.type` on the new one.
    #[must_use]
    pub fn logistic_type(&self) -> Option<&str> {
        self.logistic_type
            .as_deref()
            .or_else(|| self.logistic.as_ref().and_then(|l| l.kind.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlLogistic {
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlLeadTime {
    pub cost: Option<f64>,
    pub estimated_delivery_time: Option<MlDate>,
    pub estimated_handling_limit: Option<MlDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlDate {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlDestination {
    pub receiver_name: Option<String>,
    pub shipping_address: Option<MlAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlAddress {
    pub receiver_name: Option<String>,
    pub address_line: Option<String>,
    pub street_name: Option<String>,
    pub street_number: Option<String>,
    pub city: Option<MlNamed>,
    pub state: Option<MlNamed>,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlNamed {
    pub id: Option<String>,
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

/// `POST /oauth/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct MlTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// `GET /users/{id}/items/search?search_type=scan`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlItemScan {
    #[serde(deserialize_with = "nullable")]
    pub results: Vec<String>,
    pub scroll_id: Option<String>,
}

/// One entry of the `GET /items?ids=` multiget.
#[derive(Debug, Clone, Deserialize)]
pub struct MlMultigetEntry {
    pub code: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlItem {
    #[serde(deserialize_with = "nullable")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    pub price: Option<f64>,
    pub available_quantity: Option<i32>,
    pub status: Option<String>,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub seller_custom_field: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<MlAttribute>,
    #[serde(deserialize_with = "nullable")]
    pub variations: Vec<MlVariation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MlVariation {
    pub id: i64,
    pub price: Option<f64>,
    pub available_quantity: Option<i32>,
    pub seller_custom_field: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub attribute_combinations: Vec<MlAttribute>,
    #[serde(deserialize_with = "nullable")]
    pub attributes: Vec<MlAttribute>,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Body of a Mercado Livre webhook notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MlNotification {
    pub resource: String,
    pub user_id: i64,
    pub topic: String,
    #[serde(default)]
    pub application_id: Option<i64>,
    #[serde(default)]
    pub attempts: Option<u32>,
}

impl MlNotification {
    /// The order id of an `orders_v2` / `orders` notification
    /// (`resource = "/orders/<id>"`).
    #[must_use]
    pub fn order_id(&self) -> Option<&str> {
        if !matches!(self.topic.as_str(), "orders_v2" | "orders") {
            return None;
        }
        self.resource
            .trim_end_matches('/')
            .strip_prefix("/orders/")
            .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
    }
}

//! Flattening of a Shopee order bundle into a [`PresentedOrder`].

use chrono::{DateTime, Utc};
use mkthub_core::{
    money_from_f64, Buyer, Marketplace, PresentedItem, PresentedOrder, ShippingInfo,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ShopeeError;
use crate::status::derive_status;
use crate::types::{ShopeeEscrow, ShopeeOrder, ShopeeOrderItem, ShopeeTracking};

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(s, 0))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn bundle_part<T: DeserializeOwned>(bundle: &Value, key: &str) -> Result<Option<T>, ShopeeError> {
    match bundle.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(part) => serde_json::from_value(part.clone())
            .map(Some)
            .map_err(|e| ShopeeError::Deserialize {
                context: format!("order bundle `{key}`"),
                source: e,
            }),
    }
}

fn present_item(item: &ShopeeOrderItem) -> PresentedItem {
    let unit_price = item
        .model_discounted_price
        .filter(|p| *p > 0.0)
        .or(item.model_original_price)
        .and_then(money_from_f64)
        .unwrap_or_default();

    PresentedItem {
        listing_id: item.item_id.to_string(),
        variation_id: (item.model_id != 0).then(|| item.model_id.to_string()),
        title: item.item_name.clone(),
        sku: non_empty(item.model_sku.as_deref()).or_else(|| non_empty(item.item_sku.as_deref())),
        variation_label: non_empty(item.model_name.as_deref()),
        quantity: item.model_quantity_purchased,
        unit_price,
        sale_fee: None,
        link: None,
    }
}

fn shipping_info(order: &ShopeeOrder, tracking: Option<&ShopeeTracking>) -> ShippingInfo {
    let package = order.package_list.first();
    let address = order.recipient_address.as_ref();

    ShippingInfo {
        shipment_id: package.and_then(|p| non_empty(p.package_number.as_deref())),
        logistic_type: order.fulfillment_flag.clone(),
        carrier: non_empty(order.shipping_carrier.as_deref())
            .or_else(|| package.and_then(|p| non_empty(p.shipping_carrier.as_deref()))),
        tracking_number: tracking
            .and_then(|t| non_empty(t.tracking_number.as_deref()))
            .or_else(|| package.and_then(|p| non_empty(p.tracking_number.as_deref()))),
        status: package.and_then(|p| p.logistics_status.clone()),
        substatus: None,
        receiver_name: address.and_then(|a| non_empty(a.name.as_deref())),
        address: address.and_then(|a| non_empty(a.full_address.as_deref())),
        city: address.and_then(|a| non_empty(a.city.as_deref())),
        state: address.and_then(|a| non_empty(a.state.as_deref())),
        zip_code: address.and_then(|a| non_empty(a.zipcode.as_deref())),
        estimated_delivery: None,
    }
}

/// Normalizes a `{"detail", "escrow", "tracking"}` bundle.
///
/// # Errors
///
/// Returns [`ShopeeError::Deserialize`] if the bundle has no detail or a part
/// does not match the expected shape.
pub fn present_order(
    bundle: &Value,
    organization_id: Uuid,
    integration_id: Uuid,
) -> Result<PresentedOrder, ShopeeError> {
    let order: ShopeeOrder =
        bundle_part(bundle, "detail")?.ok_or_else(|| ShopeeError::Deserialize {
            context: "order bundle `detail`".to_owned(),
            source: serde::de::Error::missing_field("detail"),
        })?;
    let escrow: Option<ShopeeEscrow> = bundle_part(bundle, "escrow")?;
    let tracking: Option<ShopeeTracking> = bundle_part(bundle, "tracking")?;
    let income = escrow.as_ref().map(|e| &e.order_income);

    let items: Vec<PresentedItem> = order.item_list.iter().map(present_item).collect();
    let items_total = PresentedOrder::sum_items(&items);
    let total_amount = order
        .total_amount
        .and_then(money_from_f64)
        .unwrap_or(items_total);

    let marketplace_fee = income.and_then(|i| {
        let commission = i.commission_fee.and_then(money_from_f64);
        let service = i.service_fee.and_then(money_from_f64);
        match (commission, service) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or_default() + b.unwrap_or_default()),
        }
    });
    let net_amount = income.and_then(|i| i.escrow_amount).and_then(money_from_f64);
    let shipping_cost = income
        .and_then(|i| i.actual_shipping_fee.filter(|f| *f > 0.0).or(i.estimated_shipping_fee))
        .or(order.actual_shipping_fee.filter(|f| *f > 0.0))
        .or(order.estimated_shipping_fee)
        .and_then(money_from_f64);

    let shipping = shipping_info(&order, tracking.as_ref());

    Ok(PresentedOrder {
        marketplace: Marketplace::Shopee,
        marketplace_order_id: order.order_sn.clone(),
        pack_id: None,
        organization_id,
        integration_id,
        vendor_status: order.order_status.clone(),
        vendor_substatus: shipping.status.clone(),
        status_interno: derive_status(&order.order_status, order.fulfillment_flag.as_deref()),
        ordered_at: from_unix(order.create_time),
        vendor_updated_at: from_unix(order.update_time),
        paid_at: from_unix(order.pay_time),
        ship_by: from_unix(order.ship_by_date),
        currency: order.currency.clone().unwrap_or_else(|| "BRL".to_owned()),
        total_amount,
        items_total,
        shipping_cost,
        marketplace_fee,
        net_amount,
        payment_method: non_empty(order.payment_method.as_deref()),
        installments: None,
        buyer: Buyer {
            id: order.buyer_user_id.map(|id| id.to_string()),
            nickname: non_empty(order.buyer_username.as_deref()),
            name: order
                .recipient_address
                .as_ref()
                .and_then(|a| non_empty(a.name.as_deref())),
            document: non_empty(order.buyer_cpf_id.as_deref()),
        },
        shipping,
        items,
    })
}

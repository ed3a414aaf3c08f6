//! Flattening of a Mercado Livre order bundle into a [`PresentedOrder`].

use chrono::{DateTime, Utc};
use mkthub_core::{
    money_from_f64, Buyer, Marketplace, PresentedItem, PresentedOrder, ShippingInfo,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::MercadoLivreError;
use crate::status::derive_status;
use crate::types::{MlAddress, MlAttribute, MlOrder, MlOrderItem, MlPayment, MlShipment};

/// Parses an ISO-8601 timestamp with offset (`2024-05-01T10:00:00.000-04:00`).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Joins variation attributes as `"Cor: Azul / Tamanho: M"`.
#[must_use]
pub fn variation_label(attributes: &[MlAttribute]) -> Option<String> {
    let parts: Vec<String> = attributes
        .iter()
        .filter_map(|a| {
            let value = a.value_name.as_deref()?.trim();
            if value.is_empty() {
                return None;
            }
            Some(if a.name.is_empty() {
                value.to_owned()
            } else {
                format!("{}: {value}", a.name)
            })
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join(" / "))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn bundle_part<T: DeserializeOwned>(
    bundle: &Value,
    key: &str,
) -> Result<Option<T>, MercadoLivreError> {
    match bundle.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(part) => serde_json::from_value(part.clone())
            .map(Some)
            .map_err(|e| MercadoLivreError::Deserialize {
                context: format!("order bundle `{key}`"),
                source: e,
            }),
    }
}

fn present_item(item: &MlOrderItem) -> PresentedItem {
    let sku = non_empty(item.item.seller_sku.as_deref())
        .or_else(|| non_empty(item.item.seller_custom_field.as_deref()));

    PresentedItem {
        listing_id: item.item.id.clone(),
        variation_id: item.item.variation_id.map(|v| v.to_string()),
        title: item.item.title.clone(),
        sku,
        variation_label: variation_label(&item.item.variation_attributes),
        quantity: item.quantity,
        unit_price: money_from_f64(item.unit_price).unwrap_or_default(),
        sale_fee: item.sale_fee.and_then(money_from_f64),
        link: None,
    }
}

/// The approved payment, or the first one when none is approved.
fn main_payment(payments: &[MlPayment]) -> Option<&MlPayment> {
    payments
        .iter()
        .find(|p| p.status.as_deref() == Some("approved"))
        .or_else(|| payments.first())
}

/// Buyer tax document from either billing-info shape.
fn billing_document(billing: &Value) -> Option<String> {
    ["/billing_info/doc_number", "/buyer/billing_info/identification/number"]
        .iter()
        .find_map(|pointer| non_empty(billing.pointer(pointer).and_then(Value::as_str)))
}

fn format_address(address: &MlAddress) -> Option<String> {
    non_empty(address.address_line.as_deref()).or_else(|| {
        let street = non_empty(address.street_name.as_deref())?;
        Some(match non_empty(address.street_number.as_deref()) {
            Some(number) => format!("{street}, {number}"),
            None => street,
        })
    })
}

fn shipping_info(shipment: &MlShipment) -> ShippingInfo {
    let destination = shipment.destination.as_ref();
    let address = shipment
        .receiver_address
        .as_ref()
        .or_else(|| destination.and_then(|d| d.shipping_address.as_ref()));
    let lead_time = shipment.lead_time.as_ref();

    ShippingInfo {
        shipment_id: Some(shipment.id.to_string()),
        logistic_type: shipment.logistic_type().map(str::to_owned),
        carrier: shipment.tracking_method.clone(),
        tracking_number: non_empty(shipment.tracking_number.as_deref()),
        status: shipment.status.clone(),
        substatus: shipment.substatus.clone(),
        receiver_name: destination
            .and_then(|d| non_empty(d.receiver_name.as_deref()))
            .or_else(|| address.and_then(|a| non_empty(a.receiver_name.as_deref()))),
        address: address.and_then(format_address),
        city: address.and_then(|a| a.city.as_ref()?.name.clone()),
        state: address.and_then(|a| a.state.as_ref()?.name.clone()),
        zip_code: address.and_then(|a| non_empty(a.zip_code.as_deref())),
        estimated_delivery: lead_time
            .and_then(|l| l.estimated_delivery_time.as_ref()?.date.as_deref())
            .and_then(parse_timestamp),
    }
}

/// Normalizes a `{"order", "shipment", "billing_info"}` bundle.
///
/// # Errors
///
/// Returns [`MercadoLivreError::Deserialize`] if the bundle has no order or a
/// part does not match the expected shape.
pub fn present_order(
    bundle: &Value,
    organization_id: Uuid,
    integration_id: Uuid,
) -> Result<PresentedOrder, MercadoLivreError> {
    let order: MlOrder = bundle_part(bundle, "order")?.ok_or_else(|| {
        MercadoLivreError::Deserialize {
            context: "order bundle `order`".to_owned(),
            source: serde::de::Error::missing_field("order"),
        }
    })?;
    let shipment: Option<MlShipment> = bundle_part(bundle, "shipment")?;
    let billing = bundle.get("billing_info").filter(|b| !b.is_null());

    let items: Vec<PresentedItem> = order.order_items.iter().map(present_item).collect();
    let items_total = PresentedOrder::sum_items(&items);
    let total_amount = order
        .total_amount
        .and_then(money_from_f64)
        .unwrap_or(items_total);

    let payment = main_payment(&order.payments);

    let shipping_cost = shipment
        .as_ref()
        .and_then(|s| s.lead_time.as_ref()?.cost)
        .or_else(|| payment.and_then(|p| p.shipping_cost))
        .and_then(money_from_f64);

    let marketplace_fee = items
        .iter()
        .any(|i| i.sale_fee.is_some())
        .then(|| {
            items
                .iter()
                .filter_map(|i| i.sale_fee.map(|fee| fee * Decimal::from(i.quantity)))
                .sum::<Decimal>()
        });

    let paid = order
        .paid_amount
        .and_then(money_from_f64)
        .unwrap_or(total_amount);
    let net_amount = marketplace_fee.map(|fee| paid - fee - shipping_cost.unwrap_or_default());

    let paid_at = payment
        .and_then(|p| p.date_approved.as_deref())
        .and_then(parse_timestamp)
        .or_else(|| {
            (order.status == "paid")
                .then(|| order.date_closed.as_deref().and_then(parse_timestamp))
                .flatten()
        });

    let buyer = order.buyer.as_ref().map_or_else(Buyer::default, |b| {
        let full_name = [b.first_name.as_deref(), b.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Buyer {
            id: b.id.map(|id| id.to_string()),
            nickname: b.nickname.clone(),
            name: (!full_name.is_empty()).then_some(full_name),
            document: billing.and_then(billing_document),
        }
    });

    Ok(PresentedOrder {
        marketplace: Marketplace::MercadoLivre,
        marketplace_order_id: order.id.to_string(),
        pack_id: order.pack_id.map(|p| p.to_string()),
        organization_id,
        integration_id,
        vendor_status: order.status.clone(),
        // Orders carry no substatus of their own; the shipment's is the
        // closest counterpart of a Shopee package's logistics status.
        vendor_substatus: shipment.as_ref().and_then(|s| s.substatus.clone()),
        status_interno: derive_status(&order, shipment.as_ref()),
        ordered_at: order.date_created.as_deref().and_then(parse_timestamp),
        vendor_updated_at: order.last_updated.as_deref().and_then(parse_timestamp),
        paid_at,
        ship_by: shipment
            .as_ref()
            .and_then(|s| s.lead_time.as_ref()?.estimated_handling_limit.as_ref()?.date.clone())
            .as_deref()
            .and_then(parse_timestamp),
        currency: order.currency_id.clone().unwrap_or_else(|| "BRL".to_owned()),
        total_amount,
        items_total,
        shipping_cost,
        marketplace_fee,
        net_amount,
        payment_method: payment.and_then(|p| p.payment_method_id.clone()),
        installments: payment.and_then(|p| p.installments),
        buyer,
        shipping: shipment.as_ref().map(shipping_info).unwrap_or_default(),
        items,
    })
}

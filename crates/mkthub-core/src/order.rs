//! Normalized ("presented") order shapes shared by both connectors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Marketplace, StatusInterno};

/// Where a line item's internal product came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// A durable listing-to-product mapping from `product_links`.
    Permanent,
    /// Matched by SKU for this order row only; nothing else is written.
    Ephemeral,
}

impl LinkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LinkKind::Permanent => "permanent",
            LinkKind::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permanent" => Ok(LinkKind::Permanent),
            "ephemeral" => Ok(LinkKind::Ephemeral),
            other => Err(CoreError::UnknownLinkKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub product_id: Uuid,
    pub kind: LinkKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: Option<String>,
    pub nickname: Option<String>,
    pub name: Option<String>,
    /// CPF/CNPJ or equivalent tax document, when the marketplace exposes it.
    pub document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub shipment_id: Option<String>,
    pub logistic_type: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub receiver_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

/// One line of a presented order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedItem {
    pub listing_id: String,
    /// `None` when the listing has no variations.
    pub variation_id: Option<String>,
    pub title: String,
    pub sku: Option<String>,
    /// Human readable variation, e.g. `"Cor: Azul / Tamanho: M"`.
    pub variation_label: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Marketplace fee for one unit.
    pub sale_fee: Option<Decimal>,
    pub link: Option<ResolvedLink>,
}

impl PresentedItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The normalized, UI-ready representation of one marketplace order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedOrder {
    pub marketplace: Marketplace,
    pub marketplace_order_id: String,
    pub pack_id: Option<String>,
    pub organization_id: Uuid,
    pub integration_id: Uuid,
    pub vendor_status: String,
    pub vendor_substatus: Option<String>,
    pub status_interno: StatusInterno,
    pub ordered_at: Option<DateTime<Utc>>,
    pub vendor_updated_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub ship_by: Option<DateTime<Utc>>,
    pub currency: String,
    pub total_amount: Decimal,
    pub items_total: Decimal,
    pub shipping_cost: Option<Decimal>,
    pub marketplace_fee: Option<Decimal>,
    pub net_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub installments: Option<i32>,
    pub buyer: Buyer,
    pub shipping: ShippingInfo,
    pub items: Vec<PresentedItem>,
}

impl PresentedOrder {
    /// Sum of `unit_price * quantity` over all items.
    #[must_use]
    pub fn sum_items(items: &[PresentedItem]) -> Decimal {
        items.iter().map(PresentedItem::line_total).sum()
    }
}

/// Converts a vendor JSON number to a [`Decimal`] through its shortest
/// decimal rendering, so `129.9` stays `129.9` instead of picking up binary
/// noise. Non-finite values yield `None`.
#[must_use]
pub fn money_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    value.to_string().parse::<Decimal>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: &str, qty: i32) -> PresentedItem {
        PresentedItem {
            listing_id: "MLB1".to_string(),
            variation_id: None,
            title: "Camiseta".to_string(),
            sku: None,
            variation_label: None,
            quantity: qty,
            unit_price: price.parse().unwrap(),
            sale_fee: None,
            link: None,
        }
    }

    #[test]
    fn money_keeps_shortest_representation() {
        assert_eq!(money_from_f64(129.9).unwrap().to_string(), "129.9");
        assert_eq!(money_from_f64(0.1).unwrap().to_string(), "0.1");
        assert_eq!(money_from_f64(15.0).unwrap().to_string(), "15");
    }

    #[test]
    fn money_rejects_non_finite() {
        assert!(money_from_f64(f64::NAN).is_none());
        assert!(money_from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn sums_line_totals() {
        let items = vec![item("10.50", 2), item("3.25", 1)];
        assert_eq!(PresentedOrder::sum_items(&items).to_string(), "24.25");
    }

    #[test]
    fn link_kind_round_trips() {
        for kind in [LinkKind::Permanent, LinkKind::Ephemeral] {
            assert_eq!(kind.as_str().parse::<LinkKind>().unwrap(), kind);
        }
        assert!("forever".parse::<LinkKind>().is_err());
    }
}

//! Choosing how to hand an order to the carrier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ShopeeError;
use crate::types::{ShopeePickupAddress, ShopeeShippingParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentMode {
    /// The carrier collects the package at a seller address.
    #[default]
    Pickup,
    /// The seller drops the package at a branch.
    Dropoff,
}

impl ShipmentMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentMode::Pickup => "pickup",
            ShipmentMode::Dropoff => "dropoff",
        }
    }

    fn other(self) -> Self {
        match self {
            ShipmentMode::Pickup => ShipmentMode::Dropoff,
            ShipmentMode::Dropoff => ShipmentMode::Pickup,
        }
    }
}

impl fmt::Display for ShipmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pickup" => Ok(ShipmentMode::Pickup),
            "dropoff" => Ok(ShipmentMode::Dropoff),
            other => Err(format!("unknown shipment mode `{other}` (expected pickup or dropoff)")),
        }
    }
}

fn offered(param: &ShopeeShippingParameter, mode: ShipmentMode) -> bool {
    match mode {
        ShipmentMode::Pickup => param.info_needed.pickup.is_some(),
        ShipmentMode::Dropoff => param.info_needed.dropoff.is_some(),
    }
}

fn pickup_address(addresses: &[ShopeePickupAddress]) -> Option<&ShopeePickupAddress> {
    let flagged = |flag: &str| {
        addresses
            .iter()
            .find(|a| a.address_flag.iter().any(|f| f == flag))
    };
    flagged("pickup_address")
        .or_else(|| flagged("default_address"))
        .or_else(|| addresses.first())
}

/// Builds the `ship_order` body for `order_sn`.
///
/// Uses `requested` when Shopee offers it, otherwise the other mode. Returns
/// the mode actually used alongside the body.
///
/// # Errors
///
/// Returns [`ShopeeError::ShipmentNotPossible`] when neither mode is offered
/// or pickup is offered without any address.
pub fn ship_order_body(
    order_sn: &str,
    requested: ShipmentMode,
    param: &ShopeeShippingParameter,
) -> Result<(ShipmentMode, Value), ShopeeError> {
    let not_possible = |reason: &str| ShopeeError::ShipmentNotPossible {
        order_sn: order_sn.to_owned(),
        reason: reason.to_owned(),
    };

    let mode = if offered(param, requested) {
        requested
    } else if offered(param, requested.other()) {
        tracing::info!(
            order_sn,
            requested = %requested,
            using = %requested.other(),
            "requested shipment mode not offered, falling back"
        );
        requested.other()
    } else {
        return Err(not_possible("neither pickup nor dropoff is offered"));
    };

    let body = match mode {
        ShipmentMode::Pickup => {
            let addresses = param
                .pickup
                .as_ref()
                .map(|p| p.address_list.as_slice())
                .unwrap_or_default();
            let address =
                pickup_address(addresses).ok_or_else(|| not_possible("no pickup address listed"))?;
            let mut pickup = Map::new();
            pickup.insert("address_id".to_owned(), json!(address.address_id));
            if let Some(slot) = address.time_slot_list.first() {
                pickup.insert("pickup_time_id".to_owned(), json!(slot.pickup_time_id));
            }
            json!({ "order_sn": order_sn, "pickup": pickup })
        }
        ShipmentMode::Dropoff => {
            let branch = param
                .dropoff
                .as_ref()
                .and_then(|d| d.branch_list.first())
                .map_or_else(|| json!({}), |b| json!({ "branch_id": b.branch_id }));
            json!({ "order_sn": order_sn, "dropoff": branch })
        }
    };

    Ok((mode, body))
}

//! Normalization of seller listings for `marketplace_listings`.

use mkthub_core::money_from_f64;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::normalize::variation_label;
use crate::types::{MlAttribute, MlItem, MlVariation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedVariation {
    pub id: String,
    pub sku: Option<String>,
    pub label: Option<String>,
    pub price: Option<Decimal>,
    pub available_quantity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub listing_id: String,
    pub title: String,
    pub sku: Option<String>,
    pub price: Option<Decimal>,
    pub available_quantity: Option<i32>,
    pub status: Option<String>,
    pub permalink: Option<String>,
    pub thumbnail: Option<String>,
    pub variations: Vec<NormalizedVariation>,
}

impl NormalizedListing {
    /// `(variation id, sku)` pairs that can be linked to internal products.
    /// Listings without variations yield one pair with no variation id.
    #[must_use]
    pub fn linkable_skus(&self) -> Vec<(Option<&str>, &str)> {
        if self.variations.is_empty() {
            return self.sku.as_deref().map(|sku| (None, sku)).into_iter().collect();
        }
        self.variations
            .iter()
            .filter_map(|v| Some((Some(v.id.as_str()), v.sku.as_deref()?)))
            .collect()
    }
}

/// `seller_custom_field`, falling back to the `SELLER_SKU` attribute.
fn sku_of(custom_field: Option<&str>, attributes: &[MlAttribute]) -> Option<String> {
    custom_field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            attributes
                .iter()
                .find(|a| a.id.as_deref() == Some("SELLER_SKU"))
                .and_then(|a| a.value_name.as_deref())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        })
}

fn normalize_variation(variation: &MlVariation) -> NormalizedVariation {
    NormalizedVariation {
        id: variation.id.to_string(),
        sku: sku_of(
            variation.seller_custom_field.as_deref(),
            &variation.attributes,
        ),
        label: variation_label(&variation.attribute_combinations),
        price: variation.price.and_then(money_from_f64),
        available_quantity: variation.available_quantity,
    }
}

#[must_use]
pub fn normalize_listing(item: &MlItem) -> NormalizedListing {
    NormalizedListing {
        listing_id: item.id.clone(),
        title: item.title.clone(),
        sku: sku_of(item.seller_custom_field.as_deref(), &item.attributes),
        price: item.price.and_then(money_from_f64),
        available_quantity: item.available_quantity,
        status: item.status.clone(),
        permalink: item.permalink.clone(),
        thumbnail: item.thumbnail.clone(),
        variations: item.variations.iter().map(normalize_variation).collect(),
    }
}

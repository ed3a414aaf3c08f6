use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A marketplace the connector can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marketplace {
    MercadoLivre,
    Shopee,
}

impl Marketplace {
    pub const ALL: [Marketplace; 2] = [Marketplace::MercadoLivre, Marketplace::Shopee];

    /// Stable identifier stored in the `marketplace` column of every table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Marketplace::MercadoLivre => "mercado_livre",
            Marketplace::Shopee => "shopee",
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marketplace {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mercado_livre" | "mercado-livre" | "mercadolivre" | "ml" => {
                Ok(Marketplace::MercadoLivre)
            }
            "shopee" => Ok(Marketplace::Shopee),
            other => Err(CoreError::UnknownMarketplace(other.to_string())),
        }
    }
}

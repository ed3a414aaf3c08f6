pub mod app_config;
pub mod config;
pub mod marketplace;
pub mod order;
pub mod status;
pub mod tokens;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, MAX_LOOKBACK_HOURS};
pub use marketplace::Marketplace;
pub use order::{
    money_from_f64, Buyer, LinkKind, PresentedItem, PresentedOrder, ResolvedLink, ShippingInfo,
};
pub use status::StatusInterno;
pub use tokens::{
    LeaseFuture, MemoryTokenSink, OAuthTokens, RefreshLease, SinkFuture, TokenSink, TokenSinkError,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown marketplace: {0}")]
    UnknownMarketplace(String),

    #[error("unknown status_interno label: {0}")]
    UnknownStatus(String),

    #[error("unknown link kind: {0}")]
    UnknownLinkKind(String),
}

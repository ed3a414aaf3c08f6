use mkthub_core::Marketplace;
use thiserror::Error;

/// Errors from the fetch, present and store pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Db(#[from] mkthub_db::DbError),

    #[error("Mercado Livre: {0}")]
    MercadoLivre(#[from] mkthub_mercadolivre::MercadoLivreError),

    #[error("Shopee: {0}")]
    Shopee(#[from] mkthub_shopee::ShopeeError),

    /// Marketplace credentials required by the connector are not configured.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("integration {integration_id} is a {actual} integration, expected {expected}")]
    WrongMarketplace {
        integration_id: uuid::Uuid,
        expected: Marketplace,
        actual: Marketplace,
    },

    #[error("integration {0} is inactive")]
    InactiveIntegration(uuid::Uuid),

    #[error("no raw order stored for {marketplace} order {order_id}")]
    RawOrderMissing {
        marketplace: Marketplace,
        order_id: String,
    },

    /// `external_account_id` of a Shopee integration is not a numeric shop id.
    #[error("invalid shop id '{0}'")]
    InvalidShopId(String),
}

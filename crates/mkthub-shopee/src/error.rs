use thiserror::Error;

/// Errors returned by the Shopee Open Platform client and normalizer.
#[derive(Debug, Error)]
pub enum ShopeeError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-empty `error` field in the response envelope.
    #[error("Shopee API error {error}: {message}")]
    Api { error: String, message: String },

    /// The access token was still rejected after a refresh.
    #[error("unauthorized: access token rejected after refresh")]
    Unauthorized,

    /// `POST /api/v2/auth/access_token/get` failed.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("rate limited by Shopee")]
    RateLimited,

    #[error("unexpected HTTP status {status} for {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pagination limit of {max_pages} pages reached for {context}")]
    PaginationLimit { max_pages: usize, context: String },

    #[error(transparent)]
    Persist(#[from] mkthub_core::TokenSinkError),

    /// Neither pickup nor dropoff is offered for the order.
    #[error("shipment cannot be arranged for order {order_sn}: {reason}")]
    ShipmentNotPossible { order_sn: String, reason: String },

    #[error("request signing failed: {0}")]
    Signing(String),
}

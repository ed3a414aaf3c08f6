use thiserror::Error;

/// Errors returned by the Mercado Livre client and normalizer.
#[derive(Debug, Error)]
pub enum MercadoLivreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API still answered 401 after a token refresh.
    #[error("unauthorized: access token rejected after refresh")]
    Unauthorized,

    /// `POST /oauth/token` failed.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("rate limited by Mercado Livre")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    /// 5xx or any status the client has no specific handling for.
    #[error("unexpected HTTP status {status} for {context}")]
    UnexpectedStatus { status: u16, context: String },

    /// A 4xx carrying an API error message.
    #[error("Mercado Livre API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pagination limit of {max_pages} pages reached for {context}")]
    PaginationLimit { max_pages: usize, context: String },

    /// The token sink rejected a refreshed pair.
    #[error(transparent)]
    Persist(#[from] mkthub_core::TokenSinkError),
}

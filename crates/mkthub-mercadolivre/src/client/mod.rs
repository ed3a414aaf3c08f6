//! HTTP client for the Mercado Livre REST API.

mod auth;
mod items;
mod orders;

use std::sync::Arc;
use std::time::Duration;

use mkthub_core::{OAuthTokens, TokenSink};
use reqwest::{Client, StatusCode};
use tokio::sync::Mutex;

use crate::error::MercadoLivreError;
use crate::retry::retry_with_backoff;

const DEFAULT_BASE_URL: &str = "https://api.mercadolibre.com";

/// Maximum number of pages any paginated fetch follows.
///
/// Each page may be retried up to `max_retries` times, so the worst case is
/// `MAX_PAGES * (1 + max_retries)` requests.
pub(crate) const MAX_PAGES: usize = 200;

/// Access tokens are refreshed when they expire within this margin.
pub(crate) const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Application credentials and HTTP policy for [`MercadoLivreClient`].
#[derive(Clone)]
pub struct MercadoLivreSettings {
    pub client_id: String,
    pub client_secret: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for MercadoLivreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoLivreSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

/// Client for one seller account.
///
/// Holds the seller's current token pair. Refreshed pairs are handed to the
/// [`TokenSink`] before the next request goes out, because Mercado Livre
/// invalidates the old refresh token on use.
pub struct MercadoLivreClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) settings: MercadoLivreSettings,
    pub(crate) tokens: Mutex<OAuthTokens>,
    pub(crate) sink: Arc<dyn TokenSink>,
}

impl MercadoLivreClient {
    /// Creates a client pointed at the production API.
    ///
    /// # Errors
    ///
    /// Returns [`MercadoLivreError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        settings: MercadoLivreSettings,
        tokens: OAuthTokens,
        sink: Arc<dyn TokenSink>,
    ) -> Result<Self, MercadoLivreError> {
        Self::with_base_url(settings, tokens, sink, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`MercadoLivreError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn with_base_url(
        settings: MercadoLivreSettings,
        tokens: OAuthTokens,
        sink: Arc<dyn TokenSink>,
        base_url: &str,
    ) -> Result<Self, MercadoLivreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            settings,
            tokens: Mutex::new(tokens),
            sink,
        })
    }

    /// A copy of the token pair currently in use.
    pub async fn current_tokens(&self) -> OAuthTokens {
        self.tokens.lock().await.clone()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Authorized GET returning the JSON body.
    ///
    /// Refreshes proactively near expiry, replays once after a 401 with a
    /// fresh token, and retries transient failures with back-off.
    pub(crate) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        new_format: bool,
    ) -> Result<serde_json::Value, MercadoLivreError> {
        self.ensure_fresh_token().await?;

        let max_retries = self.settings.max_retries;
        let backoff_base_ms = self.settings.backoff_base_ms;

        retry_with_backoff(max_retries, backoff_base_ms, || async move {
            let token = self.tokens.lock().await.access_token.clone();
            match self.send_get(path, query, new_format, &token).await {
                Err(MercadoLivreError::Unauthorized) => {
                    tracing::info!(path, "Mercado Livre returned 401, refreshing token");
                    self.refresh_tokens(&token).await?;
                    let token = self.tokens.lock().await.access_token.clone();
                    self.send_get(path, query, new_format, &token).await
                }
                other => other,
            }
        })
        .await
    }

    async fn send_get(
        &self,
        path: &str,
        query: &[(&str, String)],
        new_format: bool,
        access_token: &str,
    ) -> Result<serde_json::Value, MercadoLivreError> {
        let mut request = self
            .client
            .get(self.url(path))
            .bearer_auth(access_token)
            .query(query);
        if new_format {
            request = request.header("x-format-new", "true");
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(MercadoLivreError::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MercadoLivreError::RateLimited);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(MercadoLivreError::NotFound(path.to_owned()));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(MercadoLivreError::Api {
                status: status.as_u16(),
                message: api_message(&body),
            });
        }
        if !status.is_success() {
            return Err(MercadoLivreError::UnexpectedStatus {
                status: status.as_u16(),
                context: path.to_owned(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| MercadoLivreError::Deserialize {
            context: path.to_owned(),
            source: e,
        })
    }
}

/// Pulls `message` (or `error`) out of an error body, falling back to the
/// raw text.
pub(crate) fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;

//! HTTP client for the Shopee Open Platform v2 API.

mod auth;
mod logistics;
mod orders;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mkthub_core::{OAuthTokens, TokenSink};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::ShopeeError;
use crate::retry::retry_with_backoff;
use crate::sign::sign_shop_call;
use crate::types::ShopeeEnvelope;

const PRODUCTION_BASE_URL: &str = "https://partner.shopeemobile.com";
const SANDBOX_BASE_URL: &str = "https://partner.test-stable.shopeemobile.com";

pub(crate) const MAX_PAGES: usize = 200;

pub(crate) const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Which Shopee host an integration talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShopeeEnvironment {
    #[default]
    Production,
    Sandbox,
}

impl ShopeeEnvironment {
    #[must_use]
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_BASE_URL,
            Self::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

/// Partner credentials and HTTP policy for [`ShopeeClient`].
#[derive(Clone)]
pub struct ShopeeSettings {
    pub partner_id: i64,
    pub partner_key: String,
    pub environment: ShopeeEnvironment,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for ShopeeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopeeSettings")
            .field("partner_id", &self.partner_id)
            .field("partner_key", &"[redacted]")
            .field("environment", &self.environment)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

/// Client for one shop.
pub struct ShopeeClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) settings: ShopeeSettings,
    pub(crate) shop_id: i64,
    pub(crate) tokens: Mutex<OAuthTokens>,
    pub(crate) sink: Arc<dyn TokenSink>,
}

impl ShopeeClient {
    /// Creates a client for the host selected by `settings.environment`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopeeError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn new(
        settings: ShopeeSettings,
        shop_id: i64,
        tokens: OAuthTokens,
        sink: Arc<dyn TokenSink>,
    ) -> Result<Self, ShopeeError> {
        let base_url = settings.environment.base_url();
        Self::with_base_url(settings, shop_id, tokens, sink, base_url)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ShopeeError::Http`] if the `reqwest::Client` cannot be
    /// constructed.
    pub fn with_base_url(
        settings: ShopeeSettings,
        shop_id: i64,
        tokens: OAuthTokens,
        sink: Arc<dyn TokenSink>,
        base_url: &str,
    ) -> Result<Self, ShopeeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            settings,
            shop_id,
            tokens: Mutex::new(tokens),
            sink,
        })
    }

    #[must_use]
    pub fn shop_id(&self) -> i64 {
        self.shop_id
    }

    pub async fn current_tokens(&self) -> OAuthTokens {
        self.tokens.lock().await.clone()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) async fn shop_get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ShopeeError> {
        self.shop_call(Method::GET, path, query, None).await
    }

    pub(crate) async fn shop_post(&self, path: &str, body: &Value) -> Result<Value, ShopeeError> {
        self.shop_call(Method::POST, path, &[], Some(body)).await
    }

    /// Signed shop-level call returning the envelope's `response`.
    ///
    /// Refreshes proactively near expiry, replays once after an auth error
    /// with a fresh token, and retries transient failures with back-off.
    async fn shop_call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, ShopeeError> {
        self.ensure_fresh_token().await?;

        let max_retries = self.settings.max_retries;
        let backoff_base_ms = self.settings.backoff_base_ms;

        retry_with_backoff(max_retries, backoff_base_ms, || {
            let method = method.clone();
            async move {
                let token = self.tokens.lock().await.access_token.clone();
                match self.send(method.clone(), path, query, body, &token).await {
                    Err(ShopeeError::Unauthorized) => {
                        tracing::info!(path, shop_id = self.shop_id, "Shopee rejected access token, refreshing");
                        self.refresh_tokens(&token).await?;
                        let token = self.tokens.lock().await.access_token.clone();
                        self.send(method, path, query, body, &token).await
                    }
                    other => other,
                }
            }
        })
        .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<Value, ShopeeError> {
        let timestamp = Utc::now().timestamp();
        let sign = sign_shop_call(
            &self.settings.partner_key,
            self.settings.partner_id,
            path,
            timestamp,
            access_token,
            self.shop_id,
        )?;
        let common = [
            ("partner_id", self.settings.partner_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("access_token", access_token.to_owned()),
            ("shop_id", self.shop_id.to_string()),
            ("sign", sign),
        ];

        let mut request = self
            .client
            .request(method, self.url(path))
            .query(&common)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<ShopeeEnvelope>(&text);

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopeeError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || parsed.as_ref().is_ok_and(ShopeeEnvelope::is_auth_error)
        {
            return Err(ShopeeError::Unauthorized);
        }

        match parsed {
            Ok(env) if !env.error.is_empty() => Err(ShopeeError::Api {
                error: env.error,
                message: env.message,
            }),
            Ok(env) if status.is_success() => Ok(env.response.unwrap_or(Value::Null)),
            Err(source) if status.is_success() => Err(ShopeeError::Deserialize {
                context: path.to_owned(),
                source,
            }),
            _ => Err(ShopeeError::UnexpectedStatus {
                status: status.as_u16(),
                context: path.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;

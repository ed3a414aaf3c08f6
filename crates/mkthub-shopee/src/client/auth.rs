//! Token refresh for `ShopeeClient`.

use chrono::Utc;
use mkthub_core::OAuthTokens;
use serde_json::json;

use crate::error::ShopeeError;
use crate::sign::sign_public_call;
use crate::types::ShopeeTokenResponse;

use super::{ShopeeClient, REFRESH_MARGIN};

const REFRESH_PATH: &str = "/api/v2/auth/access_token/get";

impl ShopeeClient {
    /// Refreshes the access token if it expires within five minutes.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh_tokens`].
    pub async fn ensure_fresh_token(&self) -> Result<(), ShopeeError> {
        let stale = {
            let tokens = self.tokens.lock().await;
            if !tokens.expires_within(Utc::now(), REFRESH_MARGIN) {
                return Ok(());
            }
            tokens.access_token.clone()
        };
        tracing::info!(shop_id = self.shop_id, "Shopee access token near expiry, refreshing");
        self.refresh_tokens(&stale).await
    }

    /// Exchanges the refresh token for a new pair and persists it.
    ///
    /// No-op when another task already replaced `stale_access_token`.
    ///
    /// # Errors
    ///
    /// - [`ShopeeError::TokenRefresh`] if Shopee rejects the refresh token.
    /// - [`ShopeeError::Http`] on network failure.
    /// - [`ShopeeError::Persist`] if the sink cannot store the new pair.
    pub async fn refresh_tokens(&self, stale_access_token: &str) -> Result<(), ShopeeError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.access_token != stale_access_token {
            return Ok(());
        }
        let lease = self.sink.begin_refresh().await?;
        if let Some(stored) = lease.newer_than(stale_access_token) {
            tracing::info!("Shopee token already refreshed by another client; adopting it");
            *tokens = stored.clone();
            return Ok(());
        }

        let timestamp = Utc::now().timestamp();
        let sign = sign_public_call(
            &self.settings.partner_key,
            self.settings.partner_id,
            REFRESH_PATH,
            timestamp,
        )?;
        let query = [
            ("partner_id", self.settings.partner_id.to_string()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
        ];
        let body = json!({
            "refresh_token": tokens.refresh_token,
            "partner_id": self.settings.partner_id,
            "shop_id": self.shop_id,
        });

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .query(&query)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let parsed: ShopeeTokenResponse = serde_json::from_str(&text).map_err(|e| {
            ShopeeError::TokenRefresh(format!("HTTP {}: unreadable token body: {e}", status.as_u16()))
        })?;

        if !status.is_success() || !parsed.error.is_empty() {
            return Err(ShopeeError::TokenRefresh(format!(
                "HTTP {}: {} {}",
                status.as_u16(),
                parsed.error,
                parsed.message
            )));
        }
        let (Some(access_token), Some(refresh_token)) = (parsed.access_token, parsed.refresh_token)
        else {
            return Err(ShopeeError::TokenRefresh(
                "token response is missing access_token or refresh_token".to_owned(),
            ));
        };

        let refreshed = OAuthTokens::issued_at(access_token, refresh_token, Utc::now(), parsed.expire_in);
        self.sink.persist(&refreshed).await?;
        tracing::info!(shop_id = self.shop_id, expires_at = %refreshed.expires_at, "Shopee token refreshed");
        *tokens = refreshed;
        drop(lease);

        Ok(())
    }
}

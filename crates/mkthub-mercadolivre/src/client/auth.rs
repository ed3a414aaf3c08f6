//! OAuth refresh for `MercadoLivreClient`.

use chrono::Utc;
use mkthub_core::OAuthTokens;

use crate::error::MercadoLivreError;
use crate::types::MlTokenResponse;

use super::{api_message, MercadoLivreClient, REFRESH_MARGIN};

impl MercadoLivreClient {
    /// Refreshes the access token if it expires within five minutes.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh_tokens`].
    pub async fn ensure_fresh_token(&self) -> Result<(), MercadoLivreError> {
        let stale = {
            let tokens = self.tokens.lock().await;
            if !tokens.expires_within(Utc::now(), REFRESH_MARGIN) {
                return Ok(());
            }
            tokens.access_token.clone()
        };
        tracing::info!("Mercado Livre access token near expiry, refreshing");
        self.refresh_tokens(&stale).await
    }

    /// Exchanges the refresh token for a new pair and persists it.
    ///
    /// `stale_access_token` is the token the caller saw rejected. When another
    /// task has already replaced it, nothing is refreshed.
    ///
    /// # Errors
    ///
    /// - [`MercadoLivreError::TokenRefresh`] if the token endpoint rejects the
    ///   refresh token or returns an unreadable body.
    /// - [`MercadoLivreError::Http`] on network failure.
    /// - [`MercadoLivreError::Persist`] if the sink cannot store the new pair.
    pub async fn refresh_tokens(&self, stale_access_token: &str) -> Result<(), MercadoLivreError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.access_token != stale_access_token {
            return Ok(());
        }
        let lease = self.sink.begin_refresh().await?;
        if let Some(stored) = lease.newer_than(stale_access_token) {
            tracing::info!("Mercado Livre token already refreshed by another client; adopting it");
            *tokens = stored.clone();
            return Ok(());
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("refresh_token", tokens.refresh_token.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/oauth/token"))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MercadoLivreError::TokenRefresh(format!(
                "HTTP {}: {}",
                status.as_u16(),
                api_message(&body)
            )));
        }

        let parsed: MlTokenResponse = serde_json::from_str(&body)
            .map_err(|e| MercadoLivreError::TokenRefresh(format!("unreadable token body: {e}")))?;

        let refreshed = OAuthTokens::issued_at(
            parsed.access_token,
            parsed.refresh_token,
            Utc::now(),
            parsed.expires_in,
        );
        self.sink.persist(&refreshed).await?;
        tracing::info!(expires_at = %refreshed.expires_at, "Mercado Livre token refreshed");
        *tokens = refreshed;
        drop(lease);

        Ok(())
    }
}

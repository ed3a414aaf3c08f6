//! Marketplace clients built from an integration row and `AppConfig`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mkthub_core::{AppConfig, Marketplace, PresentedOrder};
use mkthub_db::IntegrationRow;
use mkthub_mercadolivre::{MercadoLivreClient, MercadoLivreSettings};
use mkthub_shopee::{ShopeeClient, ShopeeEnvironment, ShopeeSettings};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::IngestError;
use crate::sink::DbTokenSink;

/// A ready-to-use client for one integration.
pub enum Connector {
    MercadoLivre {
        client: MercadoLivreClient,
        seller_id: String,
    },
    Shopee(ShopeeClient),
}

/// # Errors
///
/// Returns [`IngestError::MissingConfig`] when the Mercado Livre app
/// credentials are not set.
pub fn mercado_livre_settings(config: &AppConfig) -> Result<MercadoLivreSettings, IngestError> {
    Ok(MercadoLivreSettings {
        client_id: config
            .ml_client_id
            .clone()
            .ok_or(IngestError::MissingConfig("ML_CLIENT_ID"))?,
        client_secret: config
            .ml_client_secret
            .clone()
            .ok_or(IngestError::MissingConfig("ML_CLIENT_SECRET"))?,
        timeout_secs: config.http_timeout_secs,
        user_agent: config.http_user_agent.clone(),
        max_retries: config.http_max_retries,
        backoff_base_ms: config.http_backoff_base_ms,
    })
}

/// Shopee settings. The sandbox host is used when either the integration or
/// the global `SHOPEE_SANDBOX` flag asks for it.
///
/// # Errors
///
/// Returns [`IngestError::MissingConfig`] when the partner credentials are
/// not set.
pub fn shopee_settings(config: &AppConfig, sandbox: bool) -> Result<ShopeeSettings, IngestError> {
    Ok(ShopeeSettings {
        partner_id: config
            .shopee_partner_id
            .ok_or(IngestError::MissingConfig("SHOPEE_PARTNER_ID"))?,
        partner_key: config
            .shopee_partner_key
            .clone()
            .ok_or(IngestError::MissingConfig("SHOPEE_PARTNER_KEY"))?,
        environment: ShopeeEnvironment::from_sandbox_flag(sandbox || config.shopee_sandbox),
        timeout_secs: config.http_timeout_secs,
        user_agent: config.http_user_agent.clone(),
        max_retries: config.http_max_retries,
        backoff_base_ms: config.http_backoff_base_ms,
    })
}

/// Parses a Shopee integration's `external_account_id`.
///
/// # Errors
///
/// Returns [`IngestError::InvalidShopId`] for non-numeric ids.
pub fn shop_id(integration: &IntegrationRow) -> Result<i64, IngestError> {
    integration
        .external_account_id
        .trim()
        .parse()
        .map_err(|_| IngestError::InvalidShopId(integration.external_account_id.clone()))
}

impl Connector {
    /// Decrypts the integration's tokens and builds the matching client.
    /// Refreshed tokens are written back through [`DbTokenSink`].
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InactiveIntegration`] for disabled integrations,
    /// [`IngestError::MissingConfig`] without marketplace credentials, or a
    /// database/client construction error.
    pub async fn for_integration(
        pool: &PgPool,
        config: &AppConfig,
        integration: &IntegrationRow,
    ) -> Result<Self, IngestError> {
        if !integration.is_active {
            return Err(IngestError::InactiveIntegration(integration.id));
        }
        let marketplace = integration.marketplace()?;
        let tokens =
            mkthub_db::load_integration_tokens(pool, &config.token_encryption_key, integration.id)
                .await?;
        let sink = Arc::new(DbTokenSink::new(
            pool.clone(),
            config.token_encryption_key.clone(),
            integration.id,
        ));

        match marketplace {
            Marketplace::MercadoLivre => {
                let client =
                    MercadoLivreClient::new(mercado_livre_settings(config)?, tokens, sink)?;
                Ok(Connector::MercadoLivre {
                    client,
                    seller_id: integration.external_account_id.clone(),
                })
            }
            Marketplace::Shopee => {
                let settings = shopee_settings(config, integration.sandbox)?;
                let client = ShopeeClient::new(settings, shop_id(integration)?, tokens, sink)?;
                Ok(Connector::Shopee(client))
            }
        }
    }

    #[must_use]
    pub fn marketplace(&self) -> Marketplace {
        match self {
            Connector::MercadoLivre { .. } => Marketplace::MercadoLivre,
            Connector::Shopee(_) => Marketplace::Shopee,
        }
    }

    /// Raw bundle for one order, in the shape the marketplace's normalizer
    /// expects.
    ///
    /// # Errors
    ///
    /// Returns the client error.
    pub async fn fetch_order_bundle(&self, order_id: &str) -> Result<Value, IngestError> {
        Ok(match self {
            Connector::MercadoLivre { client, .. } => client.fetch_order_bundle(order_id).await?,
            Connector::Shopee(client) => client.fetch_order_bundle(order_id).await?,
        })
    }

    /// Ids of orders updated between `since` and `until`.
    ///
    /// # Errors
    ///
    /// Returns the client error.
    pub async fn changed_order_ids(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>, IngestError> {
        Ok(match self {
            Connector::MercadoLivre { client, seller_id } => {
                client.search_order_ids(seller_id, since).await?
            }
            Connector::Shopee(client) => client.list_order_sns(since, until).await?,
        })
    }
}

/// Runs the marketplace normalizer over a raw bundle.
///
/// # Errors
///
/// Returns the normalizer's deserialization error.
pub fn present_bundle(
    marketplace: Marketplace,
    bundle: &Value,
    organization_id: Uuid,
    integration_id: Uuid,
) -> Result<PresentedOrder, IngestError> {
    Ok(match marketplace {
        Marketplace::MercadoLivre => {
            mkthub_mercadolivre::present_order(bundle, organization_id, integration_id)?
        }
        Marketplace::Shopee => mkthub_shopee::present_order(bundle, organization_id, integration_id)?,
    })
}

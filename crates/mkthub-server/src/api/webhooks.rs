//! Vendor push endpoints.
//!
//! Both acknowledge immediately and ingest the order in a background task.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Extension, Json,
};
use mkthub_core::{AppConfig, Marketplace};
use mkthub_mercadolivre::MlNotification;
use mkthub_shopee::ShopeePush;
use serde::Serialize;
use sqlx::PgPool;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

/// Settings for verifying vendor pushes.
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    /// The exact URL registered with Shopee as the push callback; it is part
    /// of the signed payload.
    pub shopee_callback_url: Option<String>,
}

impl WebhookSettings {
    /// Reads `MKTHUB_SHOPEE_CALLBACK_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        let shopee_callback_url = std::env::var("MKTHUB_SHOPEE_CALLBACK_URL")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty());
        if shopee_callback_url.is_none() {
            tracing::warn!("MKTHUB_SHOPEE_CALLBACK_URL not set; Shopee pushes will be rejected");
        }
        Self { shopee_callback_url }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(super) struct WebhookAck {
    /// Whether an order ingest was scheduled.
    accepted: bool,
}

fn spawn_ingest(
    pool: PgPool,
    config: Arc<AppConfig>,
    marketplace: Marketplace,
    account: String,
    order_id: String,
) {
    tokio::spawn(async move {
        match mkthub_ingest::ingest_for_account(&pool, &config, marketplace, &account, &order_id)
            .await
        {
            Ok(Some(stored)) => tracing::info!(
                marketplace = %marketplace,
                order_id = %order_id,
                status = %stored.status_interno,
                "webhook order ingested"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(
                marketplace = %marketplace,
                account = %account,
                order_id = %order_id,
                error = %e,
                "webhook order ingest failed"
            ),
        }
    });
}

pub(super) async fn mercado_livre(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(notification): Json<MlNotification>,
) -> Json<ApiResponse<WebhookAck>> {
    let Some(order_id) = notification.order_id() else {
        tracing::debug!(
            topic = %notification.topic,
            resource = %notification.resource,
            "ignoring Mercado Livre notification"
        );
        return ApiResponse::new(WebhookAck { accepted: false }, req_id.0);
    };

    spawn_ingest(
        state.pool.clone(),
        Arc::clone(&state.config),
        Marketplace::MercadoLivre,
        notification.user_id.to_string(),
        order_id.to_owned(),
    );
    ApiResponse::new(WebhookAck { accepted: true }, req_id.0)
}

pub(super) async fn shopee(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    let (Some(partner_key), Some(callback_url)) = (
        state.config.shopee_partner_key.as_deref(),
        state.webhooks.shopee_callback_url.as_deref(),
    ) else {
        return Err(ApiError::new(
            req_id.0,
            "unavailable",
            "Shopee push verification is not configured",
        ));
    };

    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !mkthub_shopee::verify_push(partner_key, callback_url, &body, authorization) {
        tracing::warn!("rejected Shopee push with an invalid signature");
        return Err(ApiError::new(req_id.0, "unauthorized", "invalid push signature"));
    }

    let push: ShopeePush = serde_json::from_slice(&body).map_err(|e| {
        ApiError::new(req_id.0.clone(), "bad_request", format!("invalid push body: {e}"))
    })?;

    let Some(order_sn) = push.order_sn() else {
        tracing::debug!(code = push.code, shop_id = push.shop_id, "ignoring Shopee push");
        return Ok(ApiResponse::new(WebhookAck { accepted: false }, req_id.0));
    };

    spawn_ingest(
        state.pool.clone(),
        Arc::clone(&state.config),
        Marketplace::Shopee,
        push.shop_id.to_string(),
        order_sn.to_owned(),
    );
    Ok(ApiResponse::new(WebhookAck { accepted: true }, req_id.0))
}

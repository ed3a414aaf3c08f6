//! Persists refreshed marketplace tokens back into the integration row.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use mkthub_core::{
    LeaseFuture, OAuthTokens, RefreshLease, SinkFuture, TokenSink, TokenSinkError,
};
use sqlx::PgPool;
use uuid::Uuid;

type RefreshLocks = Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>;

/// One refresh lock per integration, shared by every client in the process.
fn refresh_lock(integration_id: Uuid) -> Result<Arc<tokio::sync::Mutex<()>>, TokenSinkError> {
    static LOCKS: OnceLock<RefreshLocks> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(RefreshLocks::default)
        .lock()
        .map_err(|e| TokenSinkError(e.to_string()))?;
    Ok(Arc::clone(locks.entry(integration_id).or_default()))
}

/// [`TokenSink`] that re-encrypts each refreshed pair into
/// `marketplace_integrations`.
///
/// Refresh leases are serialized per integration, first in-process and then
/// across processes with a Postgres advisory lock, so the in-process waiters
/// do not each pin a pool connection.
pub struct DbTokenSink {
    pool: PgPool,
    encryption_key: String,
    integration_id: Uuid,
}

impl DbTokenSink {
    #[must_use]
    pub fn new(pool: PgPool, encryption_key: String, integration_id: Uuid) -> Self {
        Self {
            pool,
            encryption_key,
            integration_id,
        }
    }
}

impl TokenSink for DbTokenSink {
    fn persist<'a>(&'a self, tokens: &'a OAuthTokens) -> SinkFuture<'a> {
        Box::pin(async move {
            mkthub_db::save_integration_tokens(
                &self.pool,
                &self.encryption_key,
                self.integration_id,
                tokens,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    integration_id = %self.integration_id,
                    error = %e,
                    "failed to persist refreshed tokens"
                );
                TokenSinkError(e.to_string())
            })
        })
    }

    fn begin_refresh(&self) -> LeaseFuture<'_> {
        Box::pin(async move {
            let local = refresh_lock(self.integration_id)?.lock_owned().await;
            let (tx, stored) = mkthub_db::lock_integration_tokens(
                &self.pool,
                &self.encryption_key,
                self.integration_id,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    integration_id = %self.integration_id,
                    error = %e,
                    "failed to take the token refresh lock"
                );
                TokenSinkError(e.to_string())
            })?;
            Ok(RefreshLease::new(Some(stored), (tx, local)))
        })
    }
}

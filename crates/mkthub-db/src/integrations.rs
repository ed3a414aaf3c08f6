//! Database operations for `marketplace_integrations`.
//!
//! Tokens never leave Postgres in clear text except through
//! [`load_integration_tokens`]: they are encrypted with pgcrypto's
//! `pgp_sym_encrypt` using the key from `MKTHUB_TOKEN_ENCRYPTION_KEY`.

use chrono::{DateTime, Utc};
use mkthub_core::{Marketplace, OAuthTokens};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from `marketplace_integrations`, without the encrypted token columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IntegrationRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub marketplace: String,
    pub external_account_id: String,
    pub display_name: Option<String>,
    pub token_expires_at: DateTime<Utc>,
    pub sandbox: bool,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntegrationRow {
    /// Parses the `marketplace` column.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidColumn`] for values outside the check constraint.
    pub fn marketplace(&self) -> Result<Marketplace, DbError> {
        self.marketplace
            .parse()
            .map_err(|_| DbError::InvalidColumn {
                column: "marketplace",
                value: self.marketplace.clone(),
            })
    }
}

/// Input for [`insert_integration`].
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub organization_id: Uuid,
    pub marketplace: Marketplace,
    pub external_account_id: String,
    pub display_name: Option<String>,
    pub tokens: OAuthTokens,
    pub sandbox: bool,
}

const INTEGRATION_COLUMNS: &str = "id, organization_id, marketplace, external_account_id, \
     display_name, token_expires_at, sandbox, is_active, last_synced_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts an integration, or re-activates and re-keys an existing one for
/// the same `(marketplace, external_account_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn insert_integration(
    pool: &PgPool,
    encryption_key: &str,
    new: &NewIntegration,
) -> Result<IntegrationRow, DbError> {
    let sql = format!(
        "INSERT INTO marketplace_integrations \
             (organization_id, marketplace, external_account_id, display_name, \
              access_token_enc, refresh_token_enc, token_expires_at, sandbox) \
         VALUES ($1, $2, $3, $4, pgp_sym_encrypt($5, $9), pgp_sym_encrypt($6, $9), $7, $8) \
         ON CONFLICT (marketplace, external_account_id) DO UPDATE SET \
             organization_id   = EXCLUDED.organization_id, \
             display_name      = COALESCE(EXCLUDED.display_name, marketplace_integrations.display_name), \
             access_token_enc  = EXCLUDED.access_token_enc, \
             refresh_token_enc = EXCLUDED.refresh_token_enc, \
             token_expires_at  = EXCLUDED.token_expires_at, \
             sandbox           = EXCLUDED.sandbox, \
             is_active         = TRUE, \
             updated_at        = NOW() \
         RETURNING {INTEGRATION_COLUMNS}"
    );

    let row = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(new.organization_id)
        .bind(new.marketplace.as_str())
        .bind(&new.external_account_id)
        .bind(&new.display_name)
        .bind(&new.tokens.access_token)
        .bind(&new.tokens.refresh_token)
        .bind(new.tokens.expires_at)
        .bind(new.sandbox)
        .bind(encryption_key)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Fetches one integration by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`].
pub async fn get_integration(pool: &PgPool, id: Uuid) -> Result<IntegrationRow, DbError> {
    let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM marketplace_integrations WHERE id = $1");
    sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Finds the active integration for a vendor account (seller id / shop id).
///
/// Used by webhooks, which only carry the vendor-side account id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_integration_by_account(
    pool: &PgPool,
    marketplace: Marketplace,
    external_account_id: &str,
) -> Result<Option<IntegrationRow>, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM marketplace_integrations \
         WHERE marketplace = $1 AND external_account_id = $2 AND is_active = TRUE"
    );
    let row = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(marketplace.as_str())
        .bind(external_account_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Lists active integrations, optionally restricted to one marketplace.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_integrations(
    pool: &PgPool,
    marketplace: Option<Marketplace>,
) -> Result<Vec<IntegrationRow>, DbError> {
    let sql = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM marketplace_integrations \
         WHERE is_active = TRUE AND ($1::text IS NULL OR marketplace = $1) \
         ORDER BY created_at, id"
    );
    let rows = sqlx::query_as::<_, IntegrationRow>(&sql)
        .bind(marketplace.map(Marketplace::as_str))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[derive(sqlx::FromRow)]
struct DecryptedTokens {
    access_token: String,
    refresh_token: String,
    token_expires_at: DateTime<Utc>,
}

const DECRYPT_TOKENS_SQL: &str = "SELECT pgp_sym_decrypt(access_token_enc, $2) AS access_token, \
            pgp_sym_decrypt(refresh_token_enc, $2) AS refresh_token, \
            token_expires_at \
     FROM marketplace_integrations \
     WHERE id = $1";

impl DecryptedTokens {
    fn into_tokens(self) -> OAuthTokens {
        OAuthTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.token_expires_at,
        }
    }
}

/// Decrypts the stored token pair.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if decryption fails (wrong key).
pub async fn load_integration_tokens(
    pool: &PgPool,
    encryption_key: &str,
    integration_id: Uuid,
) -> Result<OAuthTokens, DbError> {
    let row = sqlx::query_as::<_, DecryptedTokens>(DECRYPT_TOKENS_SQL)
        .bind(integration_id)
        .bind(encryption_key)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok(row.into_tokens())
}

/// Takes the advisory lock that serializes token refreshes of one
/// integration across processes, then decrypts the pair stored at that
/// moment.
///
/// The lock is transaction-scoped: it is released when the returned
/// transaction is committed, rolled back or dropped. Writes made through
/// the pool while it is held are not blocked.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if the lock or decryption fails.
pub async fn lock_integration_tokens(
    pool: &PgPool,
    encryption_key: &str,
    integration_id: Uuid,
) -> Result<(Transaction<'static, Postgres>, OAuthTokens), DbError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("tokens:{integration_id}"))
        .execute(&mut *tx)
        .await?;
    let row = sqlx::query_as::<_, DecryptedTokens>(DECRYPT_TOKENS_SQL)
        .bind(integration_id)
        .bind(encryption_key)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;
    Ok((tx, row.into_tokens()))
}

/// Re-encrypts and stores a refreshed token pair.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the integration does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn save_integration_tokens(
    pool: &PgPool,
    encryption_key: &str,
    integration_id: Uuid,
    tokens: &OAuthTokens,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE marketplace_integrations SET \
             access_token_enc  = pgp_sym_encrypt($2, $5), \
             refresh_token_enc = pgp_sym_encrypt($3, $5), \
             token_expires_at  = $4, \
             updated_at        = NOW() \
         WHERE id = $1",
    )
    .bind(integration_id)
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(tokens.expires_at)
    .bind(encryption_key)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records the high-water mark of a successful order sync.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_integration_synced(
    pool: &PgPool,
    integration_id: Uuid,
    synced_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE marketplace_integrations \
         SET last_synced_at = GREATEST(COALESCE(last_synced_at, $2), $2), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(integration_id)
    .bind(synced_at)
    .execute(pool)
    .await?;
    Ok(())
}

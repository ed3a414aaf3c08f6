//! OAuth token pair and the persistence seam used by connector clients.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Access/refresh token pair for one integration.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Builds a pair that expires `expires_in_secs` from `now`.
    #[must_use]
    pub fn issued_at(
        access_token: String,
        refresh_token: String,
        now: DateTime<Utc>,
        expires_in_secs: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: now + chrono::Duration::seconds(expires_in_secs.max(0)),
        }
    }

    /// True when the access token is expired or will be within `margin`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::zero());
        self.expires_at <= now + margin
    }
}

impl std::fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error)]
#[error("failed to persist refreshed tokens: {0}")]
pub struct TokenSinkError(pub String);

pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TokenSinkError>> + Send + 'a>>;

pub type LeaseFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RefreshLease, TokenSinkError>> + Send + 'a>>;

/// Exclusive right to refresh one integration's tokens.
///
/// Other clients of the same integration wait in
/// [`TokenSink::begin_refresh`] until the lease is dropped.
pub struct RefreshLease {
    stored: Option<OAuthTokens>,
    _guard: Box<dyn Send>,
}

impl RefreshLease {
    /// `stored` is the pair persisted when the lease was taken. `guard` is
    /// held until the lease is dropped.
    pub fn new(stored: Option<OAuthTokens>, guard: impl Send + 'static) -> Self {
        Self {
            stored,
            _guard: Box::new(guard),
        }
    }

    /// A lease that serializes nothing.
    #[must_use]
    pub fn unguarded() -> Self {
        Self::new(None, ())
    }

    /// The stored pair when it differs from `stale_access_token`, meaning
    /// another client refreshed first.
    #[must_use]
    pub fn newer_than(&self, stale_access_token: &str) -> Option<&OAuthTokens> {
        self.stored
            .as_ref()
            .filter(|stored| stored.access_token != stale_access_token)
    }
}

impl std::fmt::Debug for RefreshLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshLease")
            .field("stored", &self.stored)
            .finish_non_exhaustive()
    }
}

/// Receives every token pair a client obtains through a refresh.
///
/// Both marketplaces rotate the refresh token on use, so the client awaits
/// `persist` before issuing the next request. Clients built separately for
/// the same integration coordinate through `begin_refresh`: a refresh runs
/// while holding the lease, and a client that finds a newer stored pair
/// adopts it instead of spending the already-rotated refresh token.
pub trait TokenSink: Send + Sync {
    fn persist<'a>(&'a self, tokens: &'a OAuthTokens) -> SinkFuture<'a>;

    fn begin_refresh(&self) -> LeaseFuture<'_> {
        Box::pin(async { Ok(RefreshLease::unguarded()) })
    }
}

/// Keeps the last persisted pair in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryTokenSink {
    saved: Mutex<Vec<OAuthTokens>>,
}

impl MemoryTokenSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<OAuthTokens> {
        self.saved
            .lock()
            .ok()
            .and_then(|saved| saved.last().cloned())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.saved.lock().map(|saved| saved.len()).unwrap_or(0)
    }
}

impl TokenSink for MemoryTokenSink {
    fn persist<'a>(&'a self, tokens: &'a OAuthTokens) -> SinkFuture<'a> {
        Box::pin(async move {
            self.saved
                .lock()
                .map_err(|e| TokenSinkError(e.to_string()))?
                .push(tokens.clone());
            Ok(())
        })
    }
}

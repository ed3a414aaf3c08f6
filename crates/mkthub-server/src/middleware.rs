use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The organization every protected handler is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgContext(pub Uuid);

/// Header naming the organization when bearer auth is disabled.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    api_keys: Arc<HashMap<String, Uuid>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `MKTHUB_API_KEYS`.
    ///
    /// # Errors
    ///
    /// See [`AuthState::from_raw`].
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("MKTHUB_API_KEYS").unwrap_or_default();
        Self::from_raw(&raw, is_development)
    }

    /// Parses comma-separated `org_uuid:token` pairs.
    ///
    /// In development, empty keys disable auth; callers then name their
    /// organization with the `x-organization-id` header. Outside development
    /// empty keys fail startup.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed pairs, or for empty keys outside
    /// development.
    pub fn from_raw(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys = HashMap::new();
        for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((org, token)) = pair.split_once(':') else {
                anyhow::bail!("MKTHUB_API_KEYS entries must be org_uuid:token");
            };
            let org: Uuid = org
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("MKTHUB_API_KEYS has an invalid organization id: {e}"))?;
            let token = token.trim();
            anyhow::ensure!(!token.is_empty(), "MKTHUB_API_KEYS has an empty token");
            keys.insert(token.to_owned(), org);
        }

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "MKTHUB_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    api_keys: Arc::new(HashMap::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "MKTHUB_API_KEYS is required outside development; provide org_uuid:token pairs"
            );
        }

        Ok(Self {
            api_keys: Arc::new(keys),
            enabled: true,
        })
    }

    fn organization_for(&self, token: &str) -> Option<Uuid> {
        self.api_keys.get(token).copied()
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolves the caller's organization and stores it as [`OrgContext`].
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let organization = if auth.enabled {
        extract_bearer_token(req.headers().get(AUTHORIZATION))
            .and_then(|token| auth.organization_for(token))
            .ok_or("missing or invalid bearer token")
    } else {
        organization_header(req.headers()).ok_or("x-organization-id header is required")
    };

    match organization {
        Ok(org) => {
            req.extensions_mut().insert(OrgContext(org));
            next.run(req).await
        }
        Err(message) => ApiError::new(request_id_of(&req), "unauthorized", message).into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

fn organization_header(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(ORGANIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

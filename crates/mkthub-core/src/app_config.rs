use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Symmetric key handed to pgcrypto for tokens at rest.
    pub token_encryption_key: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub http_user_agent: String,
    pub http_max_retries: u32,
    pub http_backoff_base_ms: u64,
    pub sync_lookback_hours: i64,
    pub sync_cron: String,
    pub items_sync_cron: String,
    pub ml_client_id: Option<String>,
    pub ml_client_secret: Option<String>,
    pub shopee_partner_id: Option<i64>,
    pub shopee_partner_key: Option<String>,
    pub shopee_sandbox: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("token_encryption_key", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field("http_backoff_base_ms", &self.http_backoff_base_ms)
            .field("sync_lookback_hours", &self.sync_lookback_hours)
            .field("sync_cron", &self.sync_cron)
            .field("items_sync_cron", &self.items_sync_cron)
            .field("ml_client_id", &self.ml_client_id)
            .field(
                "ml_client_secret",
                &self.ml_client_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("shopee_partner_id", &self.shopee_partner_id)
            .field(
                "shopee_partner_key",
                &self.shopee_partner_key.as_ref().map(|_| "[redacted]"),
            )
            .field("shopee_sandbox", &self.shopee_sandbox)
            .finish()
    }
}

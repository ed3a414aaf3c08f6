use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Upper bound for `MKTHUB_SYNC_LOOKBACK_HOURS` and for ad-hoc `since_hours`
/// windows (one year).
pub const MAX_LOOKBACK_HOURS: i64 = 24 * 366;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" | "" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
            },
        }
    };

    let database_url = require("DATABASE_URL")?;
    let token_encryption_key = require("MKTHUB_TOKEN_ENCRYPTION_KEY")?;

    let env = parse_environment(&or_default("MKTHUB_ENV", "development"));
    let bind_addr = parse_addr("MKTHUB_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("MKTHUB_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("MKTHUB_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("MKTHUB_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("MKTHUB_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("MKTHUB_HTTP_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default("MKTHUB_HTTP_USER_AGENT", "mkthub/0.1 (order-sync)");
    let http_max_retries = parse_u32("MKTHUB_HTTP_MAX_RETRIES", "3")?;
    let http_backoff_base_ms = parse_u64("MKTHUB_HTTP_BACKOFF_BASE_MS", "1000")?;

    let sync_lookback_hours = or_default("MKTHUB_SYNC_LOOKBACK_HOURS", "48")
        .parse::<i64>()
        .map_err(|e| invalid("MKTHUB_SYNC_LOOKBACK_HOURS", e.to_string()))?;
    if !(1..=MAX_LOOKBACK_HOURS).contains(&sync_lookback_hours) {
        return Err(invalid(
            "MKTHUB_SYNC_LOOKBACK_HOURS",
            format!("must be between 1 and {MAX_LOOKBACK_HOURS}"),
        ));
    }
    let sync_cron = or_default("MKTHUB_SYNC_CRON", "0 */10 * * * *");
    let items_sync_cron = or_default("MKTHUB_ITEMS_SYNC_CRON", "0 30 3 * * *");

    let ml_client_id = optional("ML_CLIENT_ID");
    let ml_client_secret = optional("ML_CLIENT_SECRET");

    let shopee_partner_id = optional("SHOPEE_PARTNER_ID")
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|e| invalid("SHOPEE_PARTNER_ID", e.to_string()))
        })
        .transpose()?;
    let shopee_partner_key = optional("SHOPEE_PARTNER_KEY");
    let shopee_sandbox = parse_bool("SHOPEE_SANDBOX", false)?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        token_encryption_key,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_user_agent,
        http_max_retries,
        http_backoff_base_ms,
        sync_lookback_hours,
        sync_cron,
        items_sync_cron,
        ml_client_id,
        ml_client_secret,
        shopee_partner_id,
        shopee_partner_key,
        shopee_sandbox,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

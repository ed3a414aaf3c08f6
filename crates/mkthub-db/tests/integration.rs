//! Offline tests for mkthub-db pool configuration and row helpers.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use chrono::Utc;
use mkthub_core::{AppConfig, Environment, Marketplace, StatusInterno};
use mkthub_db::{DbError, IntegrationRow, PoolConfig, UpsertOutcome};
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        token_encryption_key: "key".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        http_timeout_secs: 30,
        http_user_agent: "ua".to_string(),
        http_max_retries: 3,
        http_backoff_base_ms: 1000,
        sync_lookback_hours: 48,
        sync_cron: "0 */10 * * * *".to_string(),
        items_sync_cron: "0 30 3 * * *".to_string(),
        ml_client_id: None,
        ml_client_secret: None,
        shopee_partner_id: None,
        shopee_partner_key: None,
        shopee_sandbox: false,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

fn integration_row(marketplace: &str) -> IntegrationRow {
    IntegrationRow {
        id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        marketplace: marketplace.to_string(),
        external_account_id: "123".to_string(),
        display_name: None,
        token_expires_at: Utc::now(),
        sandbox: false,
        is_active: true,
        last_synced_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn integration_row_parses_marketplace_column() {
    assert_eq!(
        integration_row("shopee").marketplace().unwrap(),
        Marketplace::Shopee
    );
    assert_eq!(
        integration_row("mercado_livre").marketplace().unwrap(),
        Marketplace::MercadoLivre
    );
}

#[test]
fn integration_row_rejects_unknown_marketplace() {
    let err = integration_row("amazon").marketplace().unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidColumn {
            column: "marketplace",
            ..
        }
    ));
}

#[test]
fn upsert_outcome_reports_status_change() {
    let created = UpsertOutcome {
        presented_order_id: 1,
        previous_status: None,
        status_interno: StatusInterno::Pendente,
    };
    assert!(created.status_changed());

    let unchanged = UpsertOutcome {
        presented_order_id: 1,
        previous_status: Some(StatusInterno::Enviado),
        status_interno: StatusInterno::Enviado,
    };
    assert!(!unchanged.status_changed());
}

#[test]
fn invalid_transition_message_names_expected_status() {
    let err = DbError::InvalidSyncRunTransition {
        id: 9,
        expected_status: "running",
    };
    assert_eq!(
        err.to_string(),
        "sync run 9 is not in expected status 'running'"
    );
}

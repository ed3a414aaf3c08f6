use std::sync::Arc;

use chrono::Utc;
use mkthub_core::{MemoryTokenSink, OAuthTokens};

use super::*;

fn settings() -> MercadoLivreSettings {
    MercadoLivreSettings {
        client_id: "123".to_owned(),
        client_secret: "shh".to_owned(),
        timeout_secs: 30,
        user_agent: "mkthub-test".to_owned(),
        max_retries: 0,
        backoff_base_ms: 0,
    }
}

fn test_client(base_url: &str) -> MercadoLivreClient {
    let tokens = OAuthTokens {
        access_token: "APP_USR-1".to_owned(),
        refresh_token: "TG-1".to_owned(),
        expires_at: Utc::now() + chrono::Duration::hours(6),
    };
    MercadoLivreClient::with_base_url(settings(), tokens, Arc::new(MemoryTokenSink::new()), base_url)
        .expect("client construction should not fail")
}

#[test]
fn url_joins_without_double_slash() {
    let client = test_client("https://api.mercadolibre.com/");
    assert_eq!(
        client.url("/orders/1"),
        "https://api.mercadolibre.com/orders/1"
    );
    assert_eq!(
        client.url("oauth/token"),
        "https://api.mercadolibre.com/oauth/token"
    );
}

#[test]
fn api_message_prefers_message_field() {
    assert_eq!(
        api_message(r#"{"message":"invalid_token","error":"forbidden"}"#),
        "invalid_token"
    );
    assert_eq!(api_message(r#"{"error":"bad_request"}"#), "bad_request");
    assert_eq!(api_message("plain text"), "plain text");
}

#[test]
fn settings_debug_redacts_secret() {
    let rendered = format!("{:?}", settings());
    assert!(rendered.contains("123"));
    assert!(!rendered.contains("shh"));
}

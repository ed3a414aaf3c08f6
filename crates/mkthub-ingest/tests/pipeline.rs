//! Live pipeline tests: Postgres through `#[sqlx::test]`, marketplaces
//! through wiremock.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mkthub_core::{AppConfig, Environment, LinkKind, Marketplace, OAuthTokens, StatusInterno};
use mkthub_db::{
    available_stock, create_organization, get_integration, get_presented_order,
    get_presented_order_items, get_raw_order, get_sync_run, insert_integration,
    load_integration_tokens, save_integration_tokens, upsert_product, upsert_product_link,
    IntegrationRow, NewIntegration,
};
use mkthub_ingest::{
    arrange_with_connector, ingest_order, present_and_store, process_presented,
    sync_listings_with_client, sync_with_connector, Connector, DbTokenSink, IngestError,
    SyncOptions, TriggerSource,
};
use mkthub_mercadolivre::{MercadoLivreClient, MercadoLivreSettings};
use mkthub_shopee::{ShipmentMode, ShopeeClient, ShopeeEnvironment, ShopeeSettings};
use serde_json::{json, Value};
use sqlx::PgPool;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-encryption-key";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_owned(),
        env: Environment::Test,
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        log_level: "info".to_owned(),
        token_encryption_key: KEY.to_owned(),
        db_max_connections: 5,
        db_min_connections: 1,
        db_acquire_timeout_secs: 5,
        http_timeout_secs: 5,
        http_user_agent: "mkthub-test".to_owned(),
        http_max_retries: 0,
        http_backoff_base_ms: 0,
        sync_lookback_hours: 48,
        sync_cron: "0 */10 * * * *".to_owned(),
        items_sync_cron: "0 30 3 * * *".to_owned(),
        ml_client_id: Some("app".to_owned()),
        ml_client_secret: Some("secret".to_owned()),
        shopee_partner_id: Some(2_001_234),
        shopee_partner_key: Some("partner-key".to_owned()),
        shopee_sandbox: false,
    }
}

fn tokens() -> OAuthTokens {
    OAuthTokens {
        access_token: "access-1".to_owned(),
        refresh_token: "refresh-1".to_owned(),
        expires_at: Utc::now() + Duration::hours(6),
    }
}

async fn seed(pool: &PgPool, marketplace: Marketplace, account: &str) -> IntegrationRow {
    let org = create_organization(pool, "Loja Teste")
        .await
        .expect("create_organization");
    insert_integration(
        pool,
        KEY,
        &NewIntegration {
            organization_id: org.id,
            marketplace,
            external_account_id: account.to_owned(),
            display_name: None,
            tokens: tokens(),
            sandbox: true,
        },
    )
    .await
    .expect("insert_integration")
}

fn ml_connector(pool: &PgPool, server: &MockServer, integration: &IntegrationRow) -> Connector {
    let settings = MercadoLivreSettings {
        client_id: "app".to_owned(),
        client_secret: "secret".to_owned(),
        timeout_secs: 5,
        user_agent: "mkthub-test".to_owned(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    let sink = Arc::new(DbTokenSink::new(pool.clone(), KEY.to_owned(), integration.id));
    let client = MercadoLivreClient::with_base_url(settings, tokens(), sink, &server.uri())
        .expect("client");
    Connector::MercadoLivre {
        client,
        seller_id: integration.external_account_id.clone(),
    }
}

fn shopee_connector(pool: &PgPool, server: &MockServer, integration: &IntegrationRow) -> Connector {
    let settings = ShopeeSettings {
        partner_id: 2_001_234,
        partner_key: "partner-key".to_owned(),
        environment: ShopeeEnvironment::Sandbox,
        timeout_secs: 5,
        user_agent: "mkthub-test".to_owned(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    let sink = Arc::new(DbTokenSink::new(pool.clone(), KEY.to_owned(), integration.id));
    let shop_id = integration.external_account_id.parse().expect("numeric shop id");
    let client = ShopeeClient::with_base_url(settings, shop_id, tokens(), sink, &server.uri())
        .expect("client");
    Connector::Shopee(client)
}

fn ml_bundle(order_id: i64, status: &str) -> Value {
    json!({
        "order": {
            "id": order_id,
            "status": status,
            "date_created": "2024-05-01T10:00:00.000-04:00",
            "total_amount": 100.0,
            "currency_id": "BRL",
            "order_items": [
                {"item": {"id": "MLB1", "title": "Caneca", "variation_id": null,
                          "seller_sku": "CAN-01"},
                 "quantity": 2, "unit_price": 30.0, "sale_fee": 4.0},
                {"item": {"id": "MLB2", "title": "Camiseta", "variation_id": 77,
                          "seller_sku": "CAM-AZ"},
                 "quantity": 1, "unit_price": 40.0, "sale_fee": 5.0}
            ],
            "payments": [],
            "tags": []
        },
        "shipment": null,
        "billing_info": null
    })
}

fn shopee_envelope(response: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": "", "message": "", "response": response
    }))
}

// ---------------------------------------------------------------------------
// present_and_store
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn permanent_and_ephemeral_links_reserve_stock(pool: PgPool) {
    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let org = integration.organization_id;
    let caneca = upsert_product(&pool, org, "CANECA-INT", "Caneca", 10)
        .await
        .expect("product");
    let camiseta = upsert_product(&pool, org, "CAM-AZ", "Camiseta", 5)
        .await
        .expect("product");
    upsert_product_link(&pool, org, Marketplace::MercadoLivre, "MLB1", None, caneca.id)
        .await
        .expect("link");

    let stored = present_and_store(&pool, &ml_bundle(1001, "paid"), &integration)
        .await
        .expect("present_and_store");

    assert_eq!(stored.status_interno, StatusInterno::AEnviar);
    assert_eq!(stored.linked_items, 2);
    assert_eq!(stored.open_reservations, 2);

    let items = get_presented_order_items(&pool, stored.presented_order_id)
        .await
        .expect("items");
    assert_eq!(items[0].linked_product_id, Some(caneca.id));
    assert_eq!(items[0].link_kind.as_deref(), Some(LinkKind::Permanent.as_str()));
    assert_eq!(items[1].linked_product_id, Some(camiseta.id));
    assert_eq!(items[1].link_kind.as_deref(), Some(LinkKind::Ephemeral.as_str()));

    assert_eq!(available_stock(&pool, caneca.id).await.expect("stock"), 8);
    assert_eq!(available_stock(&pool, camiseta.id).await.expect("stock"), 4);
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancellation_releases_reserved_stock(pool: PgPool) {
    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let product = upsert_product(&pool, integration.organization_id, "CAN-01", "Caneca", 10)
        .await
        .expect("product");

    present_and_store(&pool, &ml_bundle(1002, "paid"), &integration)
        .await
        .expect("paid");
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 8);

    let cancelled = present_and_store(&pool, &ml_bundle(1002, "cancelled"), &integration)
        .await
        .expect("cancelled");
    assert_eq!(cancelled.status_interno, StatusInterno::Cancelado);
    assert!(cancelled.status_changed);
    assert_eq!(cancelled.released_reservations, 1);
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 10);

    // A stale paid payload neither revives the order nor re-reserves.
    let stale = present_and_store(&pool, &ml_bundle(1002, "paid"), &integration)
        .await
        .expect("stale");
    assert_eq!(stale.status_interno, StatusInterno::Cancelado);
    assert!(!stale.status_changed);
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 10);
}

// ---------------------------------------------------------------------------
// ingest_order / process_presented
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ingest_stores_raw_bundle_and_presented_order(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/2001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ml_bundle(2001, "paid")["order"].clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/2001/billing_info"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let connector = ml_connector(&pool, &server, &integration);

    let stored = ingest_order(&pool, &connector, &integration, "2001")
        .await
        .expect("ingest");
    assert_eq!(stored.order_id, "2001");

    let raw = get_raw_order(&pool, Marketplace::MercadoLivre, "2001")
        .await
        .expect("query")
        .expect("raw order stored");
    assert_eq!(raw.payload["order"]["id"], 2001);
    assert!(raw.payload["billing_info"].is_null());

    let presented = get_presented_order(&pool, integration.organization_id, Marketplace::MercadoLivre, "2001")
        .await
        .expect("query")
        .expect("presented order stored");
    assert_eq!(presented.status_interno, "A enviar");
}

#[sqlx::test(migrations = "../../migrations")]
async fn reprocessing_rebuilds_from_stored_payload(pool: PgPool) {
    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    mkthub_db::upsert_raw_order(
        &pool,
        integration.organization_id,
        integration.id,
        Marketplace::MercadoLivre,
        "3001",
        &ml_bundle(3001, "paid"),
    )
    .await
    .expect("raw order");

    let stored = process_presented(&pool, Marketplace::MercadoLivre, "3001")
        .await
        .expect("process");
    assert_eq!(stored.status_interno, StatusInterno::AEnviar);

    let missing = process_presented(&pool, Marketplace::Shopee, "NOPE").await;
    assert!(matches!(missing, Err(IngestError::RawOrderMissing { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
async fn connector_must_match_integration(pool: PgPool) {
    let server = MockServer::start().await;
    let ml = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let shopee = seed(&pool, Marketplace::Shopee, "55001").await;
    let connector = shopee_connector(&pool, &server, &shopee);

    let err = ingest_order(&pool, &connector, &ml, "1").await.unwrap_err();
    assert!(matches!(err, IngestError::WrongMarketplace { .. }));
}

// ---------------------------------------------------------------------------
// Sync runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn shopee_sync_counts_failures_and_marks_integration(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/order/get_order_list"))
        .respond_with(shopee_envelope(json!({
            "more": false, "next_cursor": "",
            "order_list": [{"order_sn": "SN-OK"}, {"order_sn": "SN-BAD"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/order/get_order_detail"))
        .and(query_param("order_sn_list", "SN-OK"))
        .respond_with(shopee_envelope(json!({"order_list": [{
            "order_sn": "SN-OK", "order_status": "READY_TO_SHIP", "total_amount": 10.0,
            "item_list": [{"item_id": 1, "item_name": "Caneca", "model_id": 0,
                           "model_quantity_purchased": 1, "model_original_price": 10.0}]
        }]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/order/get_order_detail"))
        .and(query_param("order_sn_list", "SN-BAD"))
        .respond_with(shopee_envelope(json!({"order_list": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/payment/get_escrow_detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "payment.escrow_not_ready", "message": "not yet"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/logistics/get_tracking_number"))
        .respond_with(shopee_envelope(json!({"tracking_number": ""})))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::Shopee, "55001").await;
    let connector = shopee_connector(&pool, &server, &integration);

    let summary = sync_with_connector(
        &pool,
        &config(),
        &connector,
        &integration,
        &SyncOptions::triggered_by(TriggerSource::Cli),
    )
    .await
    .expect("sync");

    assert_eq!(summary.listed, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);

    let run = get_sync_run(&pool, summary.run_id.expect("run id"))
        .await
        .expect("run");
    assert_eq!(run.status, "succeeded");
    assert_eq!(run.run_type, "orders");
    assert_eq!(run.records_failed, 1);

    let refreshed = get_integration(&pool, integration.id).await.expect("integration");
    assert!(refreshed.last_synced_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn dry_run_writes_nothing(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1}, {"id": 2}],
            "paging": {"total": 2, "offset": 0, "limit": 50}
        })))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let connector = ml_connector(&pool, &server, &integration);
    let options = SyncOptions {
        dry_run: true,
        ..SyncOptions::triggered_by(TriggerSource::Cli)
    };

    let summary = sync_with_connector(&pool, &config(), &connector, &integration, &options)
        .await
        .expect("dry run");
    assert_eq!(summary.listed, 2);
    assert!(summary.run_id.is_none());

    let refreshed = get_integration(&pool, integration.id).await.expect("integration");
    assert!(refreshed.last_synced_at.is_none());
    assert!(get_raw_order(&pool, Marketplace::MercadoLivre, "1")
        .await
        .expect("query")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn listing_sync_links_matching_skus(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/123456/items/search"))
        .and(query_param("scroll_id", "s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "scroll_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/123456/items/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": ["MLB10", "MLB11"], "scroll_id": "s1"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"code": 200, "body": {"id": "MLB10", "title": "Caneca", "price": 39.9,
                                   "seller_custom_field": "CAN-01", "variations": []}},
            {"code": 200, "body": {"id": "MLB11", "title": "Camiseta", "price": 59.9,
                                   "variations": [{"id": 5, "seller_custom_field": "NO-MATCH",
                                                   "attribute_combinations": []}]}}
        ])))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let product = upsert_product(&pool, integration.organization_id, "CAN-01", "Caneca", 3)
        .await
        .expect("product");
    let Connector::MercadoLivre { client, .. } = ml_connector(&pool, &server, &integration) else {
        unreachable!("built a Mercado Livre connector");
    };

    let summary = sync_listings_with_client(&pool, &client, &integration, TriggerSource::Scheduler)
        .await
        .expect("listing sync");
    assert_eq!(summary.listings, 2);
    assert_eq!(summary.links_created, 1);

    let link = mkthub_db::find_product_link(
        &pool,
        integration.organization_id,
        Marketplace::MercadoLivre,
        "MLB10",
        None,
    )
    .await
    .expect("query")
    .expect("link created");
    assert_eq!(link.product_id, product.id);

    // Second run finds the link and creates nothing new.
    let again = sync_listings_with_client(&pool, &client, &integration, TriggerSource::Scheduler)
        .await
        .expect("listing sync");
    assert_eq!(again.links_created, 0);
}

// ---------------------------------------------------------------------------
// Tokens and shipments
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn refreshed_tokens_are_written_back(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orders/4001"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2", "refresh_token": "refresh-2", "expires_in": 21600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/4001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ml_bundle(4001, "paid")["order"].clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/orders/4001/billing_info"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let connector = ml_connector(&pool, &server, &integration);
    ingest_order(&pool, &connector, &integration, "4001")
        .await
        .expect("ingest after refresh");

    let stored = load_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("tokens");
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token, "refresh-2");
}

#[sqlx::test(migrations = "../../migrations")]
async fn clients_of_one_integration_share_a_single_refresh(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2", "refresh_token": "refresh-2", "expires_in": 21600
        })))
        .expect(1)
        .mount(&server)
        .await;
    for id in [4101, 4102] {
        Mock::given(method("GET"))
            .and(path(format!("/orders/{id}")))
            .and(header("authorization", "Bearer access-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ml_bundle(id, "paid")["order"].clone()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/orders/{id}/billing_info")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }

    let integration = seed(&pool, Marketplace::MercadoLivre, "123456").await;
    let expiring = OAuthTokens {
        expires_at: Utc::now() + Duration::seconds(30),
        ..tokens()
    };
    save_integration_tokens(&pool, KEY, integration.id, &expiring)
        .await
        .expect("expiring tokens");

    let client = || {
        let settings = MercadoLivreSettings {
            client_id: "app".to_owned(),
            client_secret: "secret".to_owned(),
            timeout_secs: 5,
            user_agent: "mkthub-test".to_owned(),
            max_retries: 0,
            backoff_base_ms: 0,
        };
        let sink = Arc::new(DbTokenSink::new(pool.clone(), KEY.to_owned(), integration.id));
        MercadoLivreClient::with_base_url(settings, expiring.clone(), sink, &server.uri())
            .expect("client")
    };
    let (first, second) = (client(), client());

    let (a, b) = tokio::join!(
        first.fetch_order_bundle("4101"),
        second.fetch_order_bundle("4102")
    );
    assert_eq!(a.expect("first client")["order"]["id"], 4101);
    assert_eq!(b.expect("second client")["order"]["id"], 4102);
    assert_eq!(second.current_tokens().await.refresh_token, "refresh-2");

    let stored = load_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("tokens");
    assert_eq!(stored.access_token, "access-2");
}

#[sqlx::test(migrations = "../../migrations")]
async fn arranged_shipment_is_reingested(pool: PgPool) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/logistics/get_shipping_parameter"))
        .respond_with(shopee_envelope(json!({"info_needed": {"dropoff": []}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/logistics/ship_order"))
        .respond_with(shopee_envelope(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/order/get_order_detail"))
        .respond_with(shopee_envelope(json!({"order_list": [{
            "order_sn": "SN-SHIP", "order_status": "PROCESSED", "item_list": []
        }]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/payment/get_escrow_detail"))
        .respond_with(shopee_envelope(json!({"order_income": {"escrow_amount": 9.5}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/logistics/get_tracking_number"))
        .respond_with(shopee_envelope(json!({"tracking_number": "BR77"})))
        .mount(&server)
        .await;

    let integration = seed(&pool, Marketplace::Shopee, "55001").await;
    let connector = shopee_connector(&pool, &server, &integration);

    let arranged = arrange_with_connector(&pool, &connector, &integration, "SN-SHIP", ShipmentMode::Pickup)
        .await
        .expect("arranged");
    assert_eq!(arranged.mode, ShipmentMode::Dropoff);
    assert_eq!(arranged.order.status_interno, StatusInterno::AguardandoColeta);
}

//! Live integration tests for mkthub-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database. The
//! `migrations` path is relative to `crates/mkthub-db/`.

use chrono::{Duration, Utc};
use mkthub_core::{
    Buyer, LinkKind, Marketplace, OAuthTokens, PresentedItem, PresentedOrder, ResolvedLink,
    ShippingInfo, StatusInterno,
};
use mkthub_db::{
    available_stock, complete_sync_run, create_organization, create_sync_run, fail_sync_run,
    find_integration_by_account, find_product_by_sku, find_product_link, get_presented_order,
    get_presented_order_items, get_presented_status, get_raw_order, get_sync_run, insert_integration,
    list_active_integrations, list_presented_orders, list_sync_runs, load_integration_tokens,
    lock_integration_tokens,
    release_stock_for_order, reserve_stock_for_order, save_integration_tokens, start_sync_run,
    upsert_listing, upsert_presented_order, upsert_product, upsert_product_link, upsert_raw_order,
    DbError, IntegrationRow, NewIntegration, NewListing, PresentedOrderFilter,
};
use rust_decimal::Decimal;
use uuid::Uuid;

const KEY: &str = "test-encryption-key";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tokens(suffix: &str) -> OAuthTokens {
    OAuthTokens {
        access_token: format!("APP_USR-{suffix}"),
        refresh_token: format!("TG-{suffix}"),
        expires_at: Utc::now() + Duration::hours(6),
    }
}

async fn seed_integration(
    pool: &sqlx::PgPool,
    marketplace: Marketplace,
    account: &str,
) -> IntegrationRow {
    let org = create_organization(pool, "Loja Teste")
        .await
        .expect("create_organization failed");
    insert_integration(
        pool,
        KEY,
        &NewIntegration {
            organization_id: org.id,
            marketplace,
            external_account_id: account.to_string(),
            display_name: Some("conta principal".to_string()),
            tokens: tokens("first"),
            sandbox: false,
        },
    )
    .await
    .expect("insert_integration failed")
}

fn dec(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

fn item(listing: &str, qty: i32, link: Option<ResolvedLink>) -> PresentedItem {
    PresentedItem {
        listing_id: listing.to_string(),
        variation_id: None,
        title: format!("Produto {listing}"),
        sku: Some(format!("SKU-{listing}")),
        variation_label: None,
        quantity: qty,
        unit_price: dec("50.00"),
        sale_fee: Some(dec("6.00")),
        link,
    }
}

fn order(integration: &IntegrationRow, id: &str, status: StatusInterno) -> PresentedOrder {
    let items = vec![item("MLB1", 1, None), item("MLB2", 2, None)];
    PresentedOrder {
        marketplace: Marketplace::MercadoLivre,
        marketplace_order_id: id.to_string(),
        pack_id: None,
        organization_id: integration.organization_id,
        integration_id: integration.id,
        vendor_status: "paid".to_string(),
        vendor_substatus: None,
        status_interno: status,
        ordered_at: Some(Utc::now()),
        vendor_updated_at: Some(Utc::now()),
        paid_at: Some(Utc::now()),
        ship_by: None,
        currency: "BRL".to_string(),
        total_amount: dec("150.00"),
        items_total: PresentedOrder::sum_items(&items),
        shipping_cost: Some(dec("0")),
        marketplace_fee: Some(dec("18.00")),
        net_amount: Some(dec("132.00")),
        payment_method: Some("pix".to_string()),
        installments: Some(1),
        buyer: Buyer {
            id: Some("999".to_string()),
            nickname: Some("COMPRADOR".to_string()),
            name: None,
            document: None,
        },
        shipping: ShippingInfo::default(),
        items,
    }
}

// ---------------------------------------------------------------------------
// Integrations and tokens
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn tokens_are_encrypted_at_rest_and_round_trip(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "123456").await;

    let raw: Vec<u8> = sqlx::query_scalar(
        "SELECT access_token_enc FROM marketplace_integrations WHERE id = $1",
    )
    .bind(integration.id)
    .fetch_one(&pool)
    .await
    .expect("select access_token_enc failed");
    assert!(!String::from_utf8_lossy(&raw).contains("APP_USR-first"));

    let loaded = load_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("load_integration_tokens failed");
    assert_eq!(loaded.access_token, "APP_USR-first");
    assert_eq!(loaded.refresh_token, "TG-first");

    save_integration_tokens(&pool, KEY, integration.id, &tokens("rotated"))
        .await
        .expect("save_integration_tokens failed");
    let reloaded = load_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("reload failed");
    assert_eq!(reloaded.refresh_token, "TG-rotated");
}

#[sqlx::test(migrations = "../../migrations")]
async fn wrong_key_cannot_decrypt(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::Shopee, "777").await;
    let result = load_integration_tokens(&pool, "another-key", integration.id).await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn integrations_are_found_by_account_and_marketplace(pool: sqlx::PgPool) {
    let ml = seed_integration(&pool, Marketplace::MercadoLivre, "123").await;
    let _shopee = seed_integration(&pool, Marketplace::Shopee, "123").await;

    let found = find_integration_by_account(&pool, Marketplace::MercadoLivre, "123")
        .await
        .expect("find failed")
        .expect("integration exists");
    assert_eq!(found.id, ml.id);

    let only_shopee = list_active_integrations(&pool, Some(Marketplace::Shopee))
        .await
        .expect("list failed");
    assert_eq!(only_shopee.len(), 1);
    assert_eq!(only_shopee[0].marketplace().unwrap(), Marketplace::Shopee);

    let all = list_active_integrations(&pool, None).await.expect("list failed");
    assert_eq!(all.len(), 2);
}

// ---------------------------------------------------------------------------
// Raw and presented orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn raw_order_upsert_replaces_payload(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let first = upsert_raw_order(
        &pool,
        integration.organization_id,
        integration.id,
        Marketplace::MercadoLivre,
        "2000001",
        &serde_json::json!({"order": {"status": "paid"}}),
    )
    .await
    .expect("first upsert failed");
    let second = upsert_raw_order(
        &pool,
        integration.organization_id,
        integration.id,
        Marketplace::MercadoLivre,
        "2000001",
        &serde_json::json!({"order": {"status": "cancelled"}}),
    )
    .await
    .expect("second upsert failed");
    assert_eq!(first, second);

    let row = get_raw_order(&pool, Marketplace::MercadoLivre, "2000001")
        .await
        .expect("get failed")
        .expect("row exists");
    assert_eq!(row.payload["order"]["status"], "cancelled");
}

#[sqlx::test(migrations = "../../migrations")]
async fn presented_order_upsert_is_idempotent(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let o = order(&integration, "2000002", StatusInterno::AEnviar);

    let first = upsert_presented_order(&pool, &o).await.expect("first upsert");
    let second = upsert_presented_order(&pool, &o).await.expect("second upsert");

    assert_eq!(first.presented_order_id, second.presented_order_id);
    assert_eq!(first.previous_status, None);
    assert_eq!(second.previous_status, Some(StatusInterno::AEnviar));
    assert!(!second.status_changed());

    let items = get_presented_order_items(&pool, first.presented_order_id)
        .await
        .expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].quantity, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn presented_order_status_never_regresses(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;

    upsert_presented_order(&pool, &order(&integration, "3", StatusInterno::Enviado))
        .await
        .expect("enviado");
    let stale = upsert_presented_order(&pool, &order(&integration, "3", StatusInterno::AEnviar))
        .await
        .expect("stale");
    assert_eq!(stale.status_interno, StatusInterno::Enviado);

    upsert_presented_order(&pool, &order(&integration, "3", StatusInterno::Cancelado))
        .await
        .expect("cancelado");
    let after = upsert_presented_order(&pool, &order(&integration, "3", StatusInterno::Entregue))
        .await
        .expect("after cancel");
    assert_eq!(after.status_interno, StatusInterno::Cancelado);

    let row = get_presented_order(&pool, integration.organization_id, Marketplace::MercadoLivre, "3")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(row.status_interno, "Cancelado");
}

#[sqlx::test(migrations = "../../migrations")]
async fn presented_status_is_read_back(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let unknown = get_presented_status(&pool, Marketplace::MercadoLivre, "404")
        .await
        .expect("query");
    assert_eq!(unknown, None);

    upsert_presented_order(&pool, &order(&integration, "5", StatusInterno::AguardandoColeta))
        .await
        .expect("upsert");
    let status = get_presented_status(&pool, Marketplace::MercadoLivre, "5")
        .await
        .expect("query");
    assert_eq!(status, Some(StatusInterno::AguardandoColeta));
    let other_marketplace = get_presented_status(&pool, Marketplace::Shopee, "5")
        .await
        .expect("query");
    assert_eq!(other_marketplace, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_first_inserts_keep_the_higher_status(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;

    for id in ["c1", "c2", "c3", "c4"] {
        let shipped = order(&integration, id, StatusInterno::Enviado);
        let stale = order(&integration, id, StatusInterno::AEnviar);
        let (a, b) = tokio::join!(
            upsert_presented_order(&pool, &stale),
            upsert_presented_order(&pool, &shipped)
        );
        a.expect("stale upsert");
        b.expect("shipped upsert");

        let status = get_presented_status(&pool, Marketplace::MercadoLivre, id)
            .await
            .expect("query");
        assert_eq!(status, Some(StatusInterno::Enviado), "order {id}");
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn token_lock_returns_the_stored_pair(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let (tx, stored) = lock_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("lock");
    assert_eq!(stored.access_token, tokens("first").access_token);

    // Writes through the pool are not blocked while the lock is held.
    save_integration_tokens(&pool, KEY, integration.id, &tokens("b"))
        .await
        .expect("save while locked");
    drop(tx);

    let (_tx, stored) = lock_integration_tokens(&pool, KEY, integration.id)
        .await
        .expect("relock");
    assert_eq!(stored.access_token, tokens("b").access_token);

    let missing = lock_integration_tokens(&pool, KEY, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn presented_order_drops_removed_lines(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let mut o = order(&integration, "4", StatusInterno::Pendente);
    let outcome = upsert_presented_order(&pool, &o).await.expect("first");

    o.items.truncate(1);
    upsert_presented_order(&pool, &o).await.expect("second");

    let items = get_presented_order_items(&pool, outcome.presented_order_id)
        .await
        .expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].listing_id, "MLB1");
}

#[sqlx::test(migrations = "../../migrations")]
async fn presented_orders_are_scoped_to_organization(pool: sqlx::PgPool) {
    let mine = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let theirs = seed_integration(&pool, Marketplace::MercadoLivre, "2").await;
    upsert_presented_order(&pool, &order(&mine, "10", StatusInterno::AEnviar))
        .await
        .expect("mine");
    upsert_presented_order(&pool, &order(&theirs, "11", StatusInterno::Enviado))
        .await
        .expect("theirs");

    let filter = PresentedOrderFilter {
        limit: 50,
        ..PresentedOrderFilter::default()
    };
    let listed = list_presented_orders(&pool, mine.organization_id, &filter)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].marketplace_order_id, "10");

    let hidden = get_presented_order(&pool, mine.organization_id, Marketplace::MercadoLivre, "11")
        .await
        .expect("get");
    assert!(hidden.is_none());

    let by_status = PresentedOrderFilter {
        status_interno: Some(StatusInterno::Enviado),
        limit: 50,
        ..PresentedOrderFilter::default()
    };
    let none = list_presented_orders(&pool, mine.organization_id, &by_status)
        .await
        .expect("list by status");
    assert!(none.is_empty());
}

// ---------------------------------------------------------------------------
// Links and stock
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn variation_link_wins_over_listing_link(pool: sqlx::PgPool) {
    let org = create_organization(&pool, "Loja").await.expect("org");
    let whole = upsert_product(&pool, org.id, "CAM-P", "Camiseta", 10)
        .await
        .expect("product");
    let blue = upsert_product(&pool, org.id, "CAM-AZ", "Camiseta Azul", 5)
        .await
        .expect("product");

    upsert_product_link(&pool, org.id, Marketplace::MercadoLivre, "MLB9", None, whole.id)
        .await
        .expect("listing link");
    upsert_product_link(&pool, org.id, Marketplace::MercadoLivre, "MLB9", Some("555"), blue.id)
        .await
        .expect("variation link");

    let specific = find_product_link(&pool, org.id, Marketplace::MercadoLivre, "MLB9", Some("555"))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(specific.product_id, blue.id);

    let fallback = find_product_link(&pool, org.id, Marketplace::MercadoLivre, "MLB9", Some("777"))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(fallback.product_id, whole.id);

    let other_market = find_product_link(&pool, org.id, Marketplace::Shopee, "MLB9", None)
        .await
        .expect("find");
    assert!(other_market.is_none());

    let by_sku = find_product_by_sku(&pool, org.id, " CAM-AZ ")
        .await
        .expect("sku")
        .expect("exists");
    assert_eq!(by_sku.id, blue.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn stock_is_reserved_once_and_released(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let product = upsert_product(&pool, integration.organization_id, "SKU-MLB2", "Produto", 10)
        .await
        .expect("product");

    let mut o = order(&integration, "20", StatusInterno::AEnviar);
    o.items[1].link = Some(ResolvedLink {
        product_id: product.id,
        kind: LinkKind::Ephemeral,
    });
    let outcome = upsert_presented_order(&pool, &o).await.expect("upsert");

    assert_eq!(
        reserve_stock_for_order(&pool, outcome.presented_order_id)
            .await
            .expect("reserve"),
        1
    );
    reserve_stock_for_order(&pool, outcome.presented_order_id)
        .await
        .expect("reserve again");
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 8);

    let released = release_stock_for_order(&pool, outcome.presented_order_id)
        .await
        .expect("release");
    assert_eq!(released, 1);
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 10);

    // A released order does not reserve again.
    assert_eq!(
        reserve_stock_for_order(&pool, outcome.presented_order_id)
            .await
            .expect("reserve after release"),
        0
    );
    assert_eq!(available_stock(&pool, product.id).await.expect("stock"), 10);
}

#[sqlx::test(migrations = "../../migrations")]
async fn available_stock_of_unknown_product_is_not_found(pool: sqlx::PgPool) {
    let result = available_stock(&pool, Uuid::new_v4()).await;
    assert!(matches!(result, Err(DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn listing_upsert_updates_in_place(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::MercadoLivre, "1").await;
    let mut listing = NewListing {
        organization_id: integration.organization_id,
        integration_id: integration.id,
        marketplace: Marketplace::MercadoLivre,
        listing_id: "MLB42".to_string(),
        title: "Caneca".to_string(),
        sku: Some("CAN-1".to_string()),
        price: Some(dec("39.90")),
        available_quantity: Some(3),
        status: Some("active".to_string()),
        permalink: None,
        thumbnail: None,
        variations: serde_json::json!([]),
    };
    let first = upsert_listing(&pool, &listing).await.expect("first");
    listing.status = Some("paused".to_string());
    let second = upsert_listing(&pool, &listing).await.expect("second");

    assert_eq!(first.id, second.id);
    assert_eq!(second.status.as_deref(), Some("paused"));
    assert_eq!(second.price, Some(dec("39.90")));
}

// ---------------------------------------------------------------------------
// Sync runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::Shopee, "55").await;
    let run = create_sync_run(&pool, integration.id, "orders", "cli")
        .await
        .expect("create");
    assert_eq!(run.status, "queued");

    start_sync_run(&pool, run.id).await.expect("start");
    complete_sync_run(&pool, run.id, 12, 1).await.expect("complete");

    let done = get_sync_run(&pool, run.id).await.expect("get");
    assert_eq!(done.status, "succeeded");
    assert_eq!(done.records_processed, 12);
    assert_eq!(done.records_failed, 1);
    assert!(done.completed_at.is_some());

    let runs = list_sync_runs(&pool, integration.organization_id, 10)
        .await
        .expect("list");
    assert_eq!(runs.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_rejects_invalid_transitions(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::Shopee, "56").await;
    let run = create_sync_run(&pool, integration.id, "listings", "scheduler")
        .await
        .expect("create");

    let err = fail_sync_run(&pool, run.id, "boom").await.unwrap_err();
    assert!(matches!(
        err,
        DbError::InvalidSyncRunTransition {
            expected_status: "running",
            ..
        }
    ));

    start_sync_run(&pool, run.id).await.expect("start");
    assert!(start_sync_run(&pool, run.id).await.is_err());
    fail_sync_run(&pool, run.id, "boom").await.expect("fail");
    let failed = get_sync_run(&pool, run.id).await.expect("get");
    assert_eq!(failed.error_message.as_deref(), Some("boom"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_rejects_unknown_trigger(pool: sqlx::PgPool) {
    let integration = seed_integration(&pool, Marketplace::Shopee, "57").await;
    let result = create_sync_run(&pool, integration.id, "orders", "cron").await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

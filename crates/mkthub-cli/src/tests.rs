use super::*;

const ORG: &str = "6f1c2a9e-3b7d-4c1e-9a2f-0d5e8b7c6a41";

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["mkthub-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["mkthub-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["mkthub-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn sync_orders_defaults_to_all_integrations() {
    let cli = Cli::try_parse_from(["mkthub-cli", "sync", "orders"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Orders {
                marketplace: None,
                integration: None,
                since_hours: None,
                dry_run: false
            }
        })
    ));
}

#[test]
fn sync_orders_accepts_marketplace_aliases() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "sync",
        "orders",
        "--marketplace",
        "ml",
        "--since-hours",
        "6",
        "--dry-run",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Orders {
                marketplace: Some(Marketplace::MercadoLivre),
                since_hours: Some(6),
                dry_run: true,
                ..
            }
        })
    ));
}

#[test]
fn sync_orders_rejects_marketplace_with_integration() {
    let result = Cli::try_parse_from([
        "mkthub-cli",
        "sync",
        "orders",
        "--marketplace",
        "shopee",
        "--integration",
        ORG,
    ]);
    assert!(result.is_err());
}

#[test]
fn unknown_marketplace_is_rejected() {
    let result =
        Cli::try_parse_from(["mkthub-cli", "sync", "orders", "--marketplace", "amazon"]);
    assert!(result.is_err());
}

#[test]
fn sync_items_requires_integration() {
    assert!(Cli::try_parse_from(["mkthub-cli", "sync", "items"]).is_err());

    let cli = Cli::try_parse_from(["mkthub-cli", "sync", "items", "--integration", ORG]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Sync {
            command: SyncCommands::Items { integration }
        }) if integration.to_string() == ORG
    ));
}

#[test]
fn orders_process_parses_marketplace_and_id() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "orders",
        "process",
        "--marketplace",
        "shopee",
        "--order-id",
        "240501ABCDEF",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Orders {
            command: OrderCommands::Process {
                marketplace: Marketplace::Shopee,
                ref order_id
            }
        }) if order_id == "240501ABCDEF"
    ));
}

#[test]
fn orders_ingest_requires_a_uuid() {
    let result = Cli::try_parse_from([
        "mkthub-cli",
        "orders",
        "ingest",
        "--integration",
        "not-a-uuid",
        "--order-id",
        "2000001",
    ]);
    assert!(result.is_err());
}

#[test]
fn arrange_shipment_defaults_to_pickup() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "shopee",
        "arrange-shipment",
        "--integration",
        ORG,
        "--order-sn",
        "SN1",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Shopee {
            command: ShopeeCommands::ArrangeShipment {
                mode: ShipmentMode::Pickup,
                ..
            }
        })
    ));
}

#[test]
fn arrange_shipment_parses_dropoff() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "shopee",
        "arrange-shipment",
        "--integration",
        ORG,
        "--order-sn",
        "SN1",
        "--mode",
        "dropoff",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Shopee {
            command: ShopeeCommands::ArrangeShipment {
                mode: ShipmentMode::Dropoff,
                ..
            }
        })
    ));
}

#[test]
fn add_shopee_takes_numeric_shop_id() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "integrations",
        "add-shopee",
        "--shop-id",
        "55001",
        "--organization",
        ORG,
        "--access-token",
        "a",
        "--refresh-token",
        "r",
        "--sandbox",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Integrations {
            command: IntegrationCommands::AddShopee {
                shop_id: 55_001,
                ref common
            }
        }) if common.sandbox && common.expires_in == 21_600
    ));

    let bad = Cli::try_parse_from([
        "mkthub-cli",
        "integrations",
        "add-shopee",
        "--shop-id",
        "shop-abc",
        "--organization",
        ORG,
        "--access-token",
        "a",
        "--refresh-token",
        "r",
    ]);
    assert!(bad.is_err());
}

#[test]
fn org_upsert_product_defaults_stock_to_zero() {
    let cli = Cli::try_parse_from([
        "mkthub-cli",
        "org",
        "upsert-product",
        "--organization",
        ORG,
        "--sku",
        "CAN-01",
        "--name",
        "Caneca",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Org {
            command: OrgCommands::UpsertProduct { stock: 0, .. }
        })
    ));
}

#[test]
fn since_hours_is_range_checked() {
    assert!(sync::since_hours_ago(6).is_ok());
    for hours in [0, -3, 1_000_000_000_000, i64::MAX] {
        let err = sync::since_hours_ago(hours).expect_err("out of range");
        assert!(err.to_string().contains("--since-hours"));
    }
}

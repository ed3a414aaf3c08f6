mod integrations;
mod orders;
mod sync;

use clap::{Parser, Subcommand};
use mkthub_core::Marketplace;
use mkthub_shopee::ShipmentMode;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::integrations::IntegrationCommands;

#[derive(Debug, Parser)]
#[command(name = "mkthub-cli")]
#[command(about = "Marketplace order connector command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Organizations and their internal products
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },
    /// Connected seller accounts
    Integrations {
        #[command(subcommand)]
        command: IntegrationCommands,
    },
    /// Pull changes from the marketplaces
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Single-order ingestion and reprocessing
    Orders {
        #[command(subcommand)]
        command: OrderCommands,
    },
    /// Shopee logistics
    Shopee {
        #[command(subcommand)]
        command: ShopeeCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum OrgCommands {
    /// Create an organization and print its id
    Create {
        #[arg(long)]
        name: String,
    },
    /// Create or update an internal product used for linking and stock
    UpsertProduct {
        #[arg(long)]
        organization: Uuid,
        #[arg(long)]
        sku: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "0")]
        stock: i32,
    },
}

#[derive(Debug, Subcommand)]
enum SyncCommands {
    /// Sync orders changed since the last run
    Orders {
        /// Only integrations of this marketplace
        #[arg(long)]
        marketplace: Option<Marketplace>,
        /// A single integration
        #[arg(long, conflicts_with = "marketplace")]
        integration: Option<Uuid>,
        /// Override the window start with `now - hours`
        #[arg(long)]
        since_hours: Option<i64>,
        /// List changed orders without fetching or writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Sync Mercado Livre listings and link matching SKUs
    Items {
        #[arg(long)]
        integration: Uuid,
    },
}

#[derive(Debug, Subcommand)]
enum OrderCommands {
    /// Rebuild a presented order from its stored raw payload
    Process {
        #[arg(long)]
        marketplace: Marketplace,
        #[arg(long)]
        order_id: String,
    },
    /// Fetch one order from the marketplace and store it
    Ingest {
        #[arg(long)]
        integration: Uuid,
        #[arg(long)]
        order_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum ShopeeCommands {
    /// Arrange pickup or drop-off for a ready order
    ArrangeShipment {
        #[arg(long)]
        integration: Uuid,
        #[arg(long)]
        order_sn: String,
        #[arg(long, default_value = "pickup")]
        mode: ShipmentMode,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("mkthub-cli: no command given, see --help");
        return Ok(());
    };

    let config = mkthub_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = mkthub_db::PoolConfig::from_app_config(&config);
    let pool = mkthub_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                mkthub_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = mkthub_db::run_migrations(&pool).await?;
                println!("migrations applied: {applied}");
            }
        },
        Commands::Org { command } => match command {
            OrgCommands::Create { name } => {
                let org = mkthub_db::create_organization(&pool, &name).await?;
                println!("{}", org.id);
            }
            OrgCommands::UpsertProduct {
                organization,
                sku,
                name,
                stock,
            } => {
                let product =
                    mkthub_db::upsert_product(&pool, organization, &sku, &name, stock).await?;
                println!("{} {} stock={}", product.id, product.sku, product.stock_quantity);
            }
        },
        Commands::Integrations { command } => {
            integrations::run(&pool, &config, command).await?;
        }
        Commands::Sync { command } => match command {
            SyncCommands::Orders {
                marketplace,
                integration,
                since_hours,
                dry_run,
            } => {
                sync::run_sync_orders(&pool, &config, marketplace, integration, since_hours, dry_run)
                    .await?;
            }
            SyncCommands::Items { integration } => {
                sync::run_sync_items(&pool, &config, integration).await?;
            }
        },
        Commands::Orders { command } => match command {
            OrderCommands::Process {
                marketplace,
                order_id,
            } => orders::run_process(&pool, marketplace, &order_id).await?,
            OrderCommands::Ingest {
                integration,
                order_id,
            } => orders::run_ingest(&pool, &config, integration, &order_id).await?,
        },
        Commands::Shopee { command } => match command {
            ShopeeCommands::ArrangeShipment {
                integration,
                order_sn,
                mode,
            } => orders::run_arrange_shipment(&pool, &config, integration, &order_sn, mode).await?,
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests;

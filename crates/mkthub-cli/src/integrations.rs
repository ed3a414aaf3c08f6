//! `integrations` command handlers.

use chrono::Utc;
use clap::{Args, Subcommand};
use mkthub_core::{AppConfig, Marketplace, OAuthTokens};
use mkthub_db::NewIntegration;
use uuid::Uuid;

/// Sub-commands available under `integrations`.
#[derive(Debug, Subcommand)]
pub enum IntegrationCommands {
    /// List active integrations
    List {
        #[arg(long)]
        marketplace: Option<Marketplace>,
    },
    /// Connect a Mercado Livre seller
    AddMercadoLivre {
        /// Seller `user_id`
        #[arg(long)]
        seller_id: String,
        #[command(flatten)]
        common: NewIntegrationArgs,
    },
    /// Connect a Shopee shop
    AddShopee {
        #[arg(long)]
        shop_id: i64,
        #[command(flatten)]
        common: NewIntegrationArgs,
    },
}

/// Fields shared by both `add-*` commands. Tokens come from the vendor's
/// OAuth code exchange.
#[derive(Debug, Args)]
pub struct NewIntegrationArgs {
    #[arg(long)]
    pub organization: Uuid,
    #[arg(long, env = "MKTHUB_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,
    #[arg(long, env = "MKTHUB_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: String,
    /// Seconds until the access token expires
    #[arg(long, default_value = "21600")]
    pub expires_in: i64,
    #[arg(long)]
    pub display_name: Option<String>,
    /// Target the vendor's sandbox host
    #[arg(long)]
    pub sandbox: bool,
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: IntegrationCommands,
) -> anyhow::Result<()> {
    match command {
        IntegrationCommands::List { marketplace } => run_list(pool, marketplace).await,
        IntegrationCommands::AddMercadoLivre { seller_id, common } => {
            run_add(pool, config, Marketplace::MercadoLivre, seller_id, common).await
        }
        IntegrationCommands::AddShopee { shop_id, common } => {
            run_add(pool, config, Marketplace::Shopee, shop_id.to_string(), common).await
        }
    }
}

async fn run_list(pool: &sqlx::PgPool, marketplace: Option<Marketplace>) -> anyhow::Result<()> {
    let rows = mkthub_db::list_active_integrations(pool, marketplace).await?;
    if rows.is_empty() {
        println!("no active integrations");
        return Ok(());
    }

    println!(
        "{:<38}{:<15}{:<16}{:<9}{:<22}NAME",
        "ID", "MARKETPLACE", "ACCOUNT", "SANDBOX", "LAST SYNC"
    );
    for row in &rows {
        let last_sync = row.last_synced_at.map_or_else(
            || "-".to_owned(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!(
            "{:<38}{:<15}{:<16}{:<9}{:<22}{}",
            row.id,
            row.marketplace,
            row.external_account_id,
            row.sandbox,
            last_sync,
            row.display_name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn run_add(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    marketplace: Marketplace,
    external_account_id: String,
    args: NewIntegrationArgs,
) -> anyhow::Result<()> {
    let tokens = OAuthTokens::issued_at(
        args.access_token,
        args.refresh_token,
        Utc::now(),
        args.expires_in,
    );
    let row = mkthub_db::insert_integration(
        pool,
        &config.token_encryption_key,
        &NewIntegration {
            organization_id: args.organization,
            marketplace,
            external_account_id,
            display_name: args.display_name,
            tokens,
            sandbox: args.sandbox,
        },
    )
    .await?;

    tracing::info!(
        integration_id = %row.id,
        marketplace = %marketplace,
        account = %row.external_account_id,
        "integration added"
    );
    println!("{}", row.id);
    Ok(())
}

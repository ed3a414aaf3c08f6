//! Mercado Livre listing sync and automatic permanent links.

use mkthub_core::{AppConfig, Marketplace};
use mkthub_db::{IntegrationRow, NewListing};
use mkthub_mercadolivre::{normalize_listing, MercadoLivreClient, NormalizedListing};
use serde::Serialize;
use sqlx::PgPool;

use crate::connector::Connector;
use crate::error::IngestError;
use crate::orders::{fail_run_best_effort, TriggerSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSyncSummary {
    pub run_id: i64,
    pub listings: i32,
    pub links_created: i32,
    pub failed: i32,
}

fn new_listing(integration: &IntegrationRow, listing: &NormalizedListing) -> NewListing {
    NewListing {
        organization_id: integration.organization_id,
        integration_id: integration.id,
        marketplace: Marketplace::MercadoLivre,
        listing_id: listing.listing_id.clone(),
        title: listing.title.clone(),
        sku: listing.sku.clone(),
        price: listing.price,
        available_quantity: listing.available_quantity,
        status: listing.status.clone(),
        permalink: listing.permalink.clone(),
        thumbnail: listing.thumbnail.clone(),
        variations: serde_json::to_value(&listing.variations)
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new())),
    }
}

/// Creates a permanent link for every listing line whose SKU matches an
/// internal product and that has no link yet. Returns how many were created.
async fn link_by_sku(
    pool: &PgPool,
    integration: &IntegrationRow,
    listing: &NormalizedListing,
) -> Result<i32, IngestError> {
    let mut created = 0;
    for (variation_id, sku) in listing.linkable_skus() {
        let existing = mkthub_db::find_product_link(
            pool,
            integration.organization_id,
            Marketplace::MercadoLivre,
            &listing.listing_id,
            variation_id,
        )
        .await?;
        if existing.is_some() {
            continue;
        }
        let Some(product) =
            mkthub_db::find_product_by_sku(pool, integration.organization_id, sku).await?
        else {
            continue;
        };
        mkthub_db::upsert_product_link(
            pool,
            integration.organization_id,
            Marketplace::MercadoLivre,
            &listing.listing_id,
            variation_id,
            product.id,
        )
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn store_listing(
    pool: &PgPool,
    integration: &IntegrationRow,
    listing: &NormalizedListing,
) -> Result<i32, IngestError> {
    mkthub_db::upsert_listing(pool, &new_listing(integration, listing)).await?;
    link_by_sku(pool, integration, listing).await
}

/// Scans the seller's listings, upserts them into `marketplace_listings` and
/// links SKUs that match internal products.
///
/// # Errors
///
/// Returns [`IngestError::WrongMarketplace`] for non Mercado Livre
/// integrations, or an error building the client.
pub async fn sync_listings(
    pool: &PgPool,
    config: &AppConfig,
    integration: &IntegrationRow,
    trigger: TriggerSource,
) -> Result<ListingSyncSummary, IngestError> {
    let marketplace = integration.marketplace()?;
    match Connector::for_integration(pool, config, integration).await? {
        Connector::MercadoLivre { client, .. } => {
            sync_listings_with_client(pool, &client, integration, trigger).await
        }
        Connector::Shopee(_) => Err(IngestError::WrongMarketplace {
            integration_id: integration.id,
            expected: Marketplace::MercadoLivre,
            actual: marketplace,
        }),
    }
}

/// [`sync_listings`] with an already built client.
///
/// # Errors
///
/// Returns the client error if the scan fails, or [`IngestError::Db`] if the
/// sync run cannot be recorded.
pub async fn sync_listings_with_client(
    pool: &PgPool,
    client: &MercadoLivreClient,
    integration: &IntegrationRow,
    trigger: TriggerSource,
) -> Result<ListingSyncSummary, IngestError> {
    let run = mkthub_db::create_sync_run(pool, integration.id, "listings", trigger.as_str()).await?;
    if let Err(e) = mkthub_db::start_sync_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, &e.to_string()).await;
        return Err(e.into());
    }

    let items = match fetch_items(client, &integration.external_account_id).await {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(integration_id = %integration.id, error = %e, "listing scan failed");
            fail_run_best_effort(pool, run.id, &e.to_string()).await;
            return Err(e);
        }
    };

    let mut listings = 0i32;
    let mut links_created = 0i32;
    let mut failed = 0i32;
    for item in &items {
        let listing = normalize_listing(item);
        match store_listing(pool, integration, &listing).await {
            Ok(created) => {
                listings = listings.saturating_add(1);
                links_created = links_created.saturating_add(created);
            }
            Err(e) => {
                failed = failed.saturating_add(1);
                tracing::warn!(
                    integration_id = %integration.id,
                    listing_id = %listing.listing_id,
                    error = %e,
                    "listing upsert failed"
                );
            }
        }
    }

    if let Err(e) = mkthub_db::complete_sync_run(pool, run.id, listings, failed).await {
        fail_run_best_effort(pool, run.id, &e.to_string()).await;
        return Err(e.into());
    }

    tracing::info!(
        integration_id = %integration.id,
        run_id = run.id,
        listings,
        links_created,
        failed,
        "listing sync finished"
    );

    Ok(ListingSyncSummary {
        run_id: run.id,
        listings,
        links_created,
        failed,
    })
}

async fn fetch_items(
    client: &MercadoLivreClient,
    seller_id: &str,
) -> Result<Vec<mkthub_mercadolivre::types::MlItem>, IngestError> {
    let ids = client.scan_item_ids(seller_id).await?;
    Ok(client.get_items(&ids).await?)
}

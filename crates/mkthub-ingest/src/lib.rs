//! Fetch, store, present: the order pipeline shared by the CLI, the HTTP
//! service and the scheduler.

pub mod connector;
pub mod error;
pub mod listings;
pub mod orders;
pub mod present;
pub mod shipment;
pub mod sink;

pub use connector::{mercado_livre_settings, present_bundle, shop_id, shopee_settings, Connector};
pub use error::IngestError;
pub use listings::{sync_listings, sync_listings_with_client, ListingSyncSummary};
pub use orders::{
    hours_before, ingest_for_account, ingest_order, process_presented, sync_all_integrations,
    sync_integration_orders, sync_window_start, sync_with_connector, SyncOptions, SyncSummary,
    TriggerSource,
};
pub use present::{present_and_store, resolve_links, StoredOrder};
pub use shipment::{arrange_shopee_shipment, arrange_with_connector, ArrangedShipment};
pub use sink::DbTokenSink;

pub mod client;
pub mod error;
pub mod listings;
pub mod normalize;
pub(crate) mod retry;
pub mod status;
pub mod types;

pub use client::{MercadoLivreClient, MercadoLivreSettings};
pub use error::MercadoLivreError;
pub use listings::{normalize_listing, NormalizedListing, NormalizedVariation};
pub use normalize::present_order;
pub use status::derive_status;
pub use types::MlNotification;

pub mod client;
pub mod error;
pub mod normalize;
pub(crate) mod retry;
pub mod shipment;
pub mod sign;
pub mod status;
pub mod types;

pub use client::{ShopeeClient, ShopeeEnvironment, ShopeeSettings};
pub use error::ShopeeError;
pub use normalize::present_order;
pub use shipment::{ship_order_body, ShipmentMode};
pub use sign::verify_push;
pub use status::derive_status;
pub use types::ShopeePush;

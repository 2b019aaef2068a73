pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use config::Config;
pub use error::{HarvestError, Result};
pub use ids::{content_hash, product_id};
pub use types::*;

pub mod aggregate;
pub mod api;
pub mod args;
mod cache;
pub mod commands;
mod config;
mod error;
pub mod filter;
pub mod model;
pub mod plot;
mod utils;

pub use api::Mode;
pub use cache::Cache;
pub use config::Config;
pub use error::Error;
pub use error::Result;

//! # Catalog Common Library
//!
//! Shared code for the catalog API service including:
//! - Error taxonomy and result alias
//! - Configuration loading (TOML + environment + defaults)
//! - Data-access layer (schema registry, query executor, associations)
//! - Clock and slug utilities

pub mod config;
pub mod db;
pub mod error;
pub mod slug;
pub mod time;

pub use error::{Error, Result};
pub use slug::to_slug;

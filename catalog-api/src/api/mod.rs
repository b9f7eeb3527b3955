//! HTTP API handlers

pub mod entities;
pub mod health;
pub mod index;
pub mod rate_limit;
pub mod response;

pub use health::health_check;
pub use index::api_index;
pub use rate_limit::rate_limit_info;
pub use response::Envelope;

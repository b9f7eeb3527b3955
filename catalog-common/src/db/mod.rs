//! Data-access layer
//!
//! - [`schema`]: allow-listed table definitions and DDL rendering
//! - [`executor`]: per-request connection with prepare/execute/fetch and transactions
//! - [`associations`]: many-to-many category links
//! - [`init`]: pool setup and first-run bootstrap

pub mod associations;
pub mod executor;
pub mod init;
pub mod schema;
pub mod value;

pub use associations::{Association, AssociationManager};
pub use executor::QueryExecutor;
pub use init::{bootstrap_schema, connect};
pub use schema::{ColumnDefinition, SchemaRegistry, TableDefinition};
pub use value::{Record, SqlValue};

//! Linode managed databases for infrastructure-as-code hosts.
//!
//! This crate implements the `linode_database_mysql_v2`,
//! `linode_database_postgresql_v2` and `linode_database_access_controls`
//! resources, and the matching data sources plus `linode_database_engines`.
//! The host drives it through the [`ProviderService`] trait.
//!
//! # Overview
//!
//! - **Provider**: [`LinodeProvider`] dispatches host requests by type name
//! - **Cloud client**: the [`CloudClient`](client::CloudClient) trait names every REST call;
//!   [`LinodeClient`](client::LinodeClient) is the reqwest-backed implementation
//! - **Pollers**: event and status waits between REST calls ([`poller`])
//! - **Attribute model**: known / unknown / null values ([`attr`]) and the
//!   database model ([`database`])
//! - **Schema types**: resource and data source schemas with validators
//! - **Error types**: [`ApiError`](error::ApiError) at the client seam,
//!   [`ProviderError`] at the host seam
//! - **Logging**: `tracing` with a stderr subscriber
//!
//! # Quick Start
//!
//! ```ignore
//! use linode_database_provider::{init_logging, LinodeProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let provider = LinodeProvider::new();
//!     provider.configure(json!({"token": std::env::var("LINODE_TOKEN")?})).await?;
//!
//!     let plan = provider
//!         .plan(
//!             "linode_database_mysql_v2",
//!             None,
//!             json!({
//!                 "label": "app-db",
//!                 "region": "us-mia",
//!                 "type": "g6-nanode-1",
//!                 "engine_id": "mysql/8"
//!             }),
//!             serde_json::Value::Null,
//!         )
//!         .await?;
//!     let created = provider
//!         .create("linode_database_mysql_v2", plan.planned_state)
//!         .await?;
//!     println!("{:?}", created.state);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access_controls;
pub mod attr;
pub mod client;
pub mod config;
pub mod data_sources;
pub mod database;
pub mod error;
pub mod logging;
pub mod poller;
pub mod provider;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use attr::Attr;
pub use config::{ClientConfig, Timeouts};
pub use error::{ApiError, ErrorKind, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{LinodeProvider, ProviderService};
pub use schema::ProviderSchema;
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ResourceResponse,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;

//! Managed MySQL and PostgreSQL databases.
//!
//! Both engines share one lifecycle ([`DatabaseResource`]) and one
//! attribute model ([`DatabaseModel`]); they differ in the REST path segment
//! and in their engine-config tunables.

pub mod engine_config;
pub mod model;
pub mod resource;
pub mod schema;
pub mod slug;
pub mod suspension;

pub use engine_config::{tunables, EngineConfig, Tunable};
pub use model::DatabaseModel;
pub use resource::{check_engine_offered, DatabaseResource, UpdatePlan};
pub use suspension::{reconcile_suspension, SuspensionAction};

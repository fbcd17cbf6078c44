//! The cloud capability consumed by the database resources.
//!
//! [`CloudClient`] names every REST operation the resources invoke. The
//! production implementation is [`LinodeClient`]; tests use the in-memory
//! [`FakeCloud`](crate::testing::FakeCloud).

pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::error::ApiError;

pub use http::LinodeClient;
pub use types::{
    CreateSpec, Database, DatabaseCredentials, DatabaseEngine, DatabaseSsl, EngineType, Event,
    EventFilter, UpdateSpec,
};

/// Result alias for cloud calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// REST operations on managed databases.
///
/// Implementations must be safe to share between concurrent resource
/// operations.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// `GET /databases/{engine}/instances/{id}`.
    async fn get_database(&self, engine: EngineType, id: i64) -> ApiResult<Database>;

    /// `POST /databases/{engine}/instances`.
    async fn create_database(&self, engine: EngineType, spec: &CreateSpec) -> ApiResult<Database>;

    /// `PUT /databases/{engine}/instances/{id}`.
    async fn update_database(
        &self,
        engine: EngineType,
        id: i64,
        spec: &UpdateSpec,
    ) -> ApiResult<Database>;

    /// `DELETE /databases/{engine}/instances/{id}`.
    async fn delete_database(&self, engine: EngineType, id: i64) -> ApiResult<()>;

    /// `GET /databases/{engine}/instances/{id}/ssl`.
    async fn get_ssl(&self, engine: EngineType, id: i64) -> ApiResult<DatabaseSsl>;

    /// `GET /databases/{engine}/instances/{id}/credentials`.
    async fn get_credentials(&self, engine: EngineType, id: i64)
        -> ApiResult<DatabaseCredentials>;

    /// `POST /databases/{engine}/instances/{id}/suspend`.
    async fn suspend_database(&self, engine: EngineType, id: i64) -> ApiResult<()>;

    /// `POST /databases/{engine}/instances/{id}/resume`.
    async fn resume_database(&self, engine: EngineType, id: i64) -> ApiResult<()>;

    /// `GET /databases/engines`, optionally restricted to one engine family.
    async fn list_engines(&self, engine: Option<EngineType>) -> ApiResult<Vec<DatabaseEngine>>;

    /// `GET /account/events` restricted by `filter`, newest first.
    async fn list_events(&self, filter: &EventFilter) -> ApiResult<Vec<Event>>;

    /// Interval between polls of [`list_events`](Self::list_events) and
    /// [`get_database`](Self::get_database) while waiting.
    fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(3)
    }
}

//! The host-facing provider.
//!
//! [`ProviderService`] has one callback per host request. [`LinodeProvider`]
//! implements it for the managed-database resources and data sources,
//! dispatching on the type name.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::access_controls;
use crate::client::{CloudClient, EngineType, LinodeClient};
use crate::config::ClientConfig;
use crate::data_sources::{self, DatabaseDataSource, ENGINES_TYPE_NAME};
use crate::database::DatabaseResource;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, ProviderSchema, Schema, ValueValidator};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ResourceResponse};
use crate::validation::validate;

/// Callbacks a provider implements, one per host request.
///
/// # Example
///
/// ```ignore
/// use linode_database_provider::{ProviderService, ProviderError, ProviderSchema};
/// use linode_database_provider::client::EngineType;
/// use linode_database_provider::database::resource::DatabaseResource;
/// use linode_database_provider::schema::Diagnostic;
///
/// const MYSQL: DatabaseResource = DatabaseResource::new(EngineType::Mysql);
///
/// struct MysqlOnly;
///
/// #[async_trait::async_trait]
/// impl ProviderService for MysqlOnly {
///     fn schema(&self) -> ProviderSchema {
///         ProviderSchema::new().with_resource("linode_database_mysql_v2", MYSQL.schema())
///     }
///
///     async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError> {
///         Ok(vec![])
///     }
///
///     // plan, create, read, update and delete forward to MYSQL
/// }
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and data sources.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names in schema order.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.into_keys().collect(),
            data_sources: schema.data_sources.into_keys().collect(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.schema().provider, &config))
    }

    /// Configure the provider with credentials and settings.
    /// Returns diagnostics (errors and warnings).
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validate(resource, &config))
    }

    /// Plan changes for a resource.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<ResourceResponse, ProviderError>;

    /// Read the current state of a resource. A `None` state removes it.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<ResourceResponse, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ResourceResponse, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Sdk(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source's configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let data_source = schema
            .data_sources
            .get(data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        Ok(validate(data_source, &config))
    }

    /// Read data from an external source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        _config: Value,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            data_source_type
        )))
    }
}

const DATABASES: [DatabaseResource; 2] = [
    DatabaseResource::new(EngineType::Mysql),
    DatabaseResource::new(EngineType::Postgresql),
];

const DATABASE_DATA_SOURCES: [DatabaseDataSource; 2] = [
    DatabaseDataSource::new(EngineType::Mysql),
    DatabaseDataSource::new(EngineType::Postgresql),
];

enum Resource {
    Database(DatabaseResource),
    AccessControls,
}

fn resource(resource_type: &str) -> Result<Resource, ProviderError> {
    if resource_type == access_controls::TYPE_NAME {
        return Ok(Resource::AccessControls);
    }
    DATABASES
        .into_iter()
        .find(|db| db.type_name() == resource_type)
        .map(Resource::Database)
        .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
}

/// Schema of the provider configuration block.
pub fn provider_config_schema() -> Schema {
    let millis = || {
        Attribute::optional(AttributeType::Int64).with_validator(ValueValidator::IntAtLeast(0))
    };
    Schema::new()
        .with_attribute(
            "token",
            Attribute::optional(AttributeType::String)
                .sensitive()
                .with_description("The token used to access the Linode API. Falls back to LINODE_TOKEN."),
        )
        .with_attribute(
            "url",
            Attribute::optional(AttributeType::String)
                .with_description("The HTTP(S) API address of the Linode API."),
        )
        .with_attribute(
            "api_version",
            Attribute::optional(AttributeType::String)
                .with_description("The version of the Linode API to use."),
        )
        .with_attribute(
            "min_retry_delay_ms",
            millis().with_description("Minimum delay in milliseconds before retrying a request."),
        )
        .with_attribute(
            "max_retry_delay_ms",
            millis().with_description("Maximum delay in milliseconds before retrying a request."),
        )
        .with_attribute(
            "max_retries",
            Attribute::optional(AttributeType::Int64)
                .with_validator(ValueValidator::IntBetween(0, 100))
                .with_description("Maximum number of retries for a failed request."),
        )
        .with_attribute(
            "event_poll_ms",
            Attribute::optional(AttributeType::Int64)
                .with_validator(ValueValidator::IntAtLeast(1))
                .with_description("The rate in milliseconds to poll for events."),
        )
        .with_attribute(
            "ua_prefix",
            Attribute::optional(AttributeType::String)
                .with_description("An HTTP User-Agent Prefix to prepend in API requests."),
        )
}

/// Provider for Linode managed databases.
///
/// Resources: `linode_database_mysql_v2`, `linode_database_postgresql_v2`,
/// `linode_database_access_controls`. Data sources: the two database types
/// and `linode_database_engines`.
pub struct LinodeProvider {
    base_config: ClientConfig,
    client: RwLock<Option<Arc<dyn CloudClient>>>,
}

impl LinodeProvider {
    /// An unconfigured provider whose settings start from the environment.
    pub fn new() -> Self {
        Self::with_base_config(ClientConfig::from_env())
    }

    /// An unconfigured provider whose settings start from `config`.
    pub fn with_base_config(config: ClientConfig) -> Self {
        Self {
            base_config: config,
            client: RwLock::new(None),
        }
    }

    /// A provider already bound to `client`.
    pub fn with_client(client: Arc<dyn CloudClient>) -> Self {
        Self {
            base_config: ClientConfig::default(),
            client: RwLock::new(Some(client)),
        }
    }

    async fn client(&self) -> Result<Arc<dyn CloudClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "the provider is not configured; configure must run first".to_string(),
            )
        })
    }
}

impl Default for LinodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProviderService for LinodeProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(access_controls::TYPE_NAME, access_controls::schema())
            .with_data_source(ENGINES_TYPE_NAME, data_sources::engines_schema());
        for db in DATABASES {
            schema = schema.with_resource(db.type_name(), db.schema());
        }
        for source in DATABASE_DATA_SOURCES {
            schema = schema.with_data_source(source.type_name(), source.schema());
        }
        schema
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let resolved = match self.base_config.clone().with_provider_config(&config) {
            Ok(resolved) => resolved,
            Err(err) => return Ok(vec![err.to_diagnostic()]),
        };
        if let Err(err) = resolved.validate() {
            let mut diagnostic = err.to_diagnostic();
            if resolved.token.is_none() {
                diagnostic = diagnostic.with_attribute("token");
            }
            warn!(error = %err, "Provider configuration rejected");
            return Ok(vec![diagnostic]);
        }

        let api_root = resolved.api_root();
        let client = match LinodeClient::new(resolved) {
            Ok(client) => client,
            Err(err) => return Ok(vec![err.to_diagnostic()]),
        };
        *self.client.write().await = Some(Arc::new(client));
        info!(%api_root, "Provider configured");
        Ok(vec![])
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        debug!(resource_type, has_prior = prior_state.is_some(), "Planning");
        match resource(resource_type)? {
            Resource::Database(db) => db.plan(prior_state.as_ref(), &proposed_state),
            Resource::AccessControls => {
                access_controls::plan(prior_state.as_ref(), &proposed_state)
            }
        }
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let kind = resource(resource_type)?;
        let client = self.client().await?;
        match kind {
            Resource::Database(db) => db.create(client.as_ref(), &planned_state).await,
            Resource::AccessControls => {
                access_controls::create(client.as_ref(), &planned_state).await
            }
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let kind = resource(resource_type)?;
        let client = self.client().await?;
        match kind {
            Resource::Database(db) => db.read(client.as_ref(), &current_state).await,
            Resource::AccessControls => {
                access_controls::read(client.as_ref(), &current_state).await
            }
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let kind = resource(resource_type)?;
        let client = self.client().await?;
        match kind {
            Resource::Database(db) => {
                db.update(client.as_ref(), &prior_state, &planned_state)
                    .await
            }
            Resource::AccessControls => {
                access_controls::update(client.as_ref(), &prior_state, &planned_state).await
            }
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let kind = resource(resource_type)?;
        let client = self.client().await?;
        match kind {
            Resource::Database(db) => db.delete(client.as_ref(), &current_state).await,
            Resource::AccessControls => {
                access_controls::delete(client.as_ref(), &current_state).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let kind = resource(resource_type)?;
        let client = self.client().await?;
        let state = match kind {
            Resource::Database(db) => db.import(client.as_ref(), id).await?,
            Resource::AccessControls => access_controls::import(client.as_ref(), id).await?,
        };
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        if data_source_type == ENGINES_TYPE_NAME {
            let client = self.client().await?;
            return data_sources::read_engines(client.as_ref(), &config).await;
        }
        let source = DATABASE_DATA_SOURCES
            .into_iter()
            .find(|s| s.type_name() == data_source_type)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))?;
        let client = self.client().await?;
        source.read(client.as_ref(), &config).await
    }
}

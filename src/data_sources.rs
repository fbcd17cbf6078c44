//! Read-only data sources.
//!
//! - `linode_database_mysql_v2` / `linode_database_postgresql_v2`: one
//!   database by id, projected the way a resource import projects it.
//! - `linode_database_engines`: the engine versions the remote offers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::attr::is_unknown_value;
use crate::client::{CloudClient, EngineType};
use crate::database::schema::data_source_schema;
use crate::database::{DatabaseModel, EngineConfig};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Schema, ValueValidator};

/// Type name of the engines data source.
pub const ENGINES_TYPE_NAME: &str = "linode_database_engines";

/// Data source reading a single database of one engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseDataSource {
    engine: EngineType,
}

impl DatabaseDataSource {
    /// The data source for `engine`.
    pub const fn new(engine: EngineType) -> Self {
        Self { engine }
    }

    /// Host type name, e.g. `linode_database_postgresql_v2`.
    pub fn type_name(&self) -> String {
        format!("linode_database_{}_v2", self.engine)
    }

    /// Host schema.
    pub fn schema(&self) -> Schema {
        data_source_schema(self.engine)
    }

    /// Read the database named by `config.id`.
    pub async fn read<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        config: &Value,
    ) -> Result<Value, ProviderError> {
        let engine = self.engine;
        let id = match config.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ProviderError::Validation(
                    "id is required to read a database".to_string(),
                ))
            }
        };

        let mut data = DatabaseModel {
            id: id.into(),
            engine_config: EngineConfig::empty(engine),
            ..Default::default()
        };
        let database_id = data.database_id()?;
        debug!(database_id, %engine, "Reading database data source");
        data.refresh(client, engine, database_id, false).await?;
        Ok(data.to_state())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EngineEntry {
    id: String,
    engine: String,
    version: String,
}

/// Schema of `linode_database_engines`.
pub fn engines_schema() -> Schema {
    let entry = AttributeType::object(
        ["id", "engine", "version"].map(|name| (name, AttributeType::String)),
    );
    let engines = EngineType::ALL.iter().map(|e| e.as_str().to_string()).collect();
    Schema::new()
        .with_attribute(
            "id",
            Attribute::computed(AttributeType::String).with_description("The engine filter, or `all`."),
        )
        .with_attribute(
            "engine",
            Attribute::optional(AttributeType::String)
                .with_description("Only list versions of this engine.")
                .with_validator(ValueValidator::OneOf(engines)),
        )
        .with_attribute(
            "engines",
            Attribute::computed(AttributeType::list(entry))
                .with_description("Offered engine versions."),
        )
}

/// List offered engine versions, optionally restricted to `config.engine`.
pub async fn read_engines<C: CloudClient + ?Sized>(
    client: &C,
    config: &Value,
) -> Result<Value, ProviderError> {
    let filter = match config.get("engine") {
        Some(value @ Value::String(name)) if !is_unknown_value(value) => {
            Some(name.parse::<EngineType>().map_err(ProviderError::Validation)?)
        }
        _ => None,
    };

    let mut engines: Vec<EngineEntry> = client
        .list_engines(filter)
        .await?
        .into_iter()
        .map(|e| EngineEntry {
            id: e.id,
            engine: e.engine,
            version: e.version,
        })
        .collect();
    engines.sort_by(|a, b| a.id.cmp(&b.id));
    debug!(count = engines.len(), ?filter, "Listed database engines");

    Ok(serde_json::json!({
        "id": filter.map_or("all", EngineType::as_str),
        "engine": filter.map(EngineType::as_str),
        "engines": engines,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::CreateSpec;
    use crate::testing::FakeCloud;
    use crate::validation::validate;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_database() {
        let cloud = FakeCloud::new();
        let db = cloud
            .create_database(
                EngineType::Postgresql,
                &CreateSpec {
                    label: "pg".to_string(),
                    region: "us-mia".to_string(),
                    node_type: "g6-nanode-1".to_string(),
                    engine: "postgresql/16".to_string(),
                    allow_list: Some(vec!["10.0.0.1/32".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let source = DatabaseDataSource::new(EngineType::Postgresql);
        assert_eq!(source.type_name(), "linode_database_postgresql_v2");
        let state = source
            .read(&cloud, &json!({"id": db.id.to_string()}))
            .await
            .unwrap();

        assert_eq!(state["id"], db.id.to_string());
        assert_eq!(state["label"], "pg");
        assert_eq!(state["engine_id"], "postgresql/16");
        assert_eq!(state["allow_list"], json!(["10.0.0.1/32"]));
        assert_eq!(state["engine_config_pg_autovacuum_max_workers"], 3);
        assert!(state["engine_config_work_mem"].is_null());

        let err = source.read(&cloud, &json!({"id": "7"})).await.unwrap_err();
        assert!(err.is_not_found());
        let err = source.read(&cloud, &json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_engines() {
        let cloud = FakeCloud::new();

        let all = read_engines(&cloud, &json!({})).await.unwrap();
        assert_eq!(all["id"], "all");
        assert!(all["engine"].is_null());
        assert_eq!(all["engines"].as_array().unwrap().len(), 3);

        let pg = read_engines(&cloud, &json!({"engine": "postgresql"})).await.unwrap();
        let ids: Vec<&str> = pg["engines"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["postgresql/14", "postgresql/16"]);

        let err = read_engines(&cloud, &json!({"engine": "mongodb"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[test]
    fn test_engines_schema() {
        let schema = engines_schema();
        assert!(validate(&schema, &json!({"engine": "mysql"})).is_empty());
        assert_eq!(validate(&schema, &json!({"engine": "redis"})).len(), 1);
    }
}

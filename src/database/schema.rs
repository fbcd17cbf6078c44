//! Schemas of the database resources and data sources.

use crate::client::EngineType;
use crate::database::engine_config::tunables;
use crate::schema::{Attribute, AttributeType, Block, Schema, Usage, ValueValidator};

fn pending_update_type() -> AttributeType {
    AttributeType::object(
        ["deadline", "description", "planned_for"].map(|field| (field, AttributeType::String)),
    )
}

fn updates_block() -> Block {
    Block::new()
        .with_description(
            "Configuration settings for automated patch update maintenance for the Managed Database.",
        )
        .with_attribute(
            "day_of_week",
            Attribute::required(AttributeType::Int64)
                .with_description("The day to perform maintenance. 1=Monday, 2=Tuesday, etc.")
                .with_validator(ValueValidator::IntBetween(1, 7)),
        )
        .with_attribute(
            "duration",
            Attribute::required(AttributeType::Int64)
                .with_description("The maximum maintenance window time in hours."),
        )
        .with_attribute(
            "frequency",
            Attribute::optional_computed(AttributeType::String)
                .with_description("How frequently maintenance occurs.")
                .with_default(serde_json::json!("weekly"))
                .with_validator(ValueValidator::OneOf(vec!["weekly".to_string()])),
        )
        .with_attribute(
            "hour_of_day",
            Attribute::required(AttributeType::Int64)
                .with_description("The hour to begin maintenance based in UTC time.")
                .with_validator(ValueValidator::IntBetween(0, 23)),
        )
}

fn private_network_block() -> Block {
    Block::new()
        .with_description("Restricts access to this database using a virtual private cloud (VPC).")
        .with_attribute(
            "vpc_id",
            Attribute::required(AttributeType::Int64)
                .with_description("The ID of the virtual private cloud (VPC)."),
        )
        .with_attribute(
            "subnet_id",
            Attribute::required(AttributeType::Int64).with_description("The ID of the VPC subnet."),
        )
        .with_attribute(
            "public_access",
            Attribute::optional_computed(AttributeType::Bool)
                .with_description("Whether the database keeps a public endpoint.")
                .with_default(serde_json::json!(false)),
        )
}

fn timeouts_block() -> Block {
    let duration = |op: &str| {
        Attribute::optional(AttributeType::String)
            .with_description(format!("Deadline for {op}, e.g. \"30m\" or \"1h30m\"."))
            .with_validator(ValueValidator::Regex(r"^(\d+(ms|h|m|s))+$".to_string()))
    };
    Block::new()
        .with_description("Deadlines for each lifecycle phase.")
        .with_attribute("create", duration("create"))
        .with_attribute("update", duration("update"))
        .with_attribute("delete", duration("delete"))
}

/// Attributes shared by the resource and the data source, all computed.
fn computed_attributes(schema: Schema) -> Schema {
    schema
        .with_attribute(
            "ca_cert",
            Attribute::computed(AttributeType::String)
                .sensitive()
                .with_description("The base64-encoded SSL CA certificate for the Managed Database."),
        )
        .with_attribute(
            "created",
            Attribute::computed(AttributeType::String).with_description("When this Managed Database was created."),
        )
        .with_attribute(
            "encrypted",
            Attribute::computed(AttributeType::Bool).with_description("Whether the Managed Database is encrypted."),
        )
        .with_attribute(
            "engine",
            Attribute::computed(AttributeType::String).with_description("The Managed Database engine."),
        )
        .with_attribute(
            "host_primary",
            Attribute::computed(AttributeType::String).with_description("The primary host for the Managed Database."),
        )
        .with_attribute(
            "host_secondary",
            Attribute::computed(AttributeType::String)
                .with_description("The secondary/private host for the Managed Database."),
        )
        .with_attribute(
            "members",
            Attribute::computed(AttributeType::map(AttributeType::String)).with_description(
                "A mapping between IP addresses and strings designating them as primary or failover.",
            ),
        )
        .with_attribute(
            "oldest_restore_time",
            Attribute::computed(AttributeType::String)
                .with_description("The oldest time to which a database can be restored."),
        )
        .with_attribute(
            "pending_updates",
            Attribute::computed(AttributeType::set(pending_update_type()))
                .with_description("A set of pending updates."),
        )
        .with_attribute(
            "platform",
            Attribute::computed(AttributeType::String)
                .with_description("The back-end platform for relational databases used by the service."),
        )
        .with_attribute(
            "port",
            Attribute::computed(AttributeType::Int64).with_description("The access port for this Managed Database."),
        )
        .with_attribute(
            "root_password",
            Attribute::computed(AttributeType::String)
                .sensitive()
                .with_description("The randomly generated root password for the Managed Database instance."),
        )
        .with_attribute(
            "root_username",
            Attribute::computed(AttributeType::String)
                .sensitive()
                .with_description("The root username for the Managed Database instance."),
        )
        .with_attribute(
            "ssl_connection",
            Attribute::computed(AttributeType::Bool).with_description(
                "Whether to require SSL credentials to establish a connection to the Managed Database.",
            ),
        )
        .with_attribute(
            "status",
            Attribute::computed(AttributeType::String).with_description("The operating status of the Managed Database."),
        )
        .with_attribute(
            "updated",
            Attribute::computed(AttributeType::String).with_description("When this Managed Database was last updated."),
        )
        .with_attribute(
            "version",
            Attribute::computed(AttributeType::String).with_description("The Managed Database engine version."),
        )
}

/// Schema of `linode_database_<engine>_v2`.
pub fn resource_schema(engine: EngineType) -> Schema {
    let schema = Schema::new()
        .with_attribute(
            "id",
            Attribute::computed(AttributeType::String).with_description("The id of the Managed Database."),
        )
        .with_attribute(
            "engine_id",
            Attribute::required(AttributeType::String).with_description(format!(
                "The unique ID of the database engine and version to use. (e.g. {})",
                match engine {
                    EngineType::Mysql => "mysql/8",
                    EngineType::Postgresql => "postgresql/16",
                }
            )),
        )
        .with_attribute(
            "label",
            Attribute::required(AttributeType::String)
                .with_description("A unique, user-defined string referring to the Managed Database."),
        )
        .with_attribute(
            "region",
            Attribute::required(AttributeType::String)
                .with_force_new()
                .with_description("The Region ID for the Managed Database."),
        )
        .with_attribute(
            "type",
            Attribute::required(AttributeType::String).with_description(
                "The Linode Instance type used by the Managed Database for its nodes.",
            ),
        )
        .with_attribute(
            "allow_list",
            Attribute::optional_computed(AttributeType::set(AttributeType::String)).with_description(
                "A list of IP addresses that can access the Managed Database. \
                 Each item can be a single IP address or a range in CIDR format.",
            ),
        )
        .with_attribute(
            "cluster_size",
            Attribute::optional_computed(AttributeType::Int64)
                .with_description("The number of Linode instance nodes deployed to the Managed Database.")
                .with_default(serde_json::json!(1))
                .with_validator(ValueValidator::IntAtLeast(1)),
        )
        .with_attribute(
            "fork_restore_time",
            Attribute::optional_computed(AttributeType::String)
                .with_force_new()
                .with_description("The database timestamp from which it was restored."),
        )
        .with_attribute(
            "fork_source",
            Attribute::optional(AttributeType::Int64)
                .with_force_new()
                .with_description("The ID of the database that was forked from."),
        )
        .with_attribute(
            "suspended",
            Attribute::optional_computed(AttributeType::Bool)
                .with_default(serde_json::json!(false))
                .with_description("Whether this database is suspended."),
        )
        .with_block("updates", updates_block())
        .with_block("private_network", private_network_block())
        .with_block("timeouts", timeouts_block());

    tunables(engine)
        .iter()
        .fold(computed_attributes(schema), |schema, tunable| {
            schema.with_attribute(tunable.attribute, tunable.schema_attribute())
        })
}

/// Schema of the `linode_database_<engine>_v2` data source.
pub fn data_source_schema(engine: EngineType) -> Schema {
    let computed = Attribute::computed;
    let schema = Schema::new()
        .with_attribute(
            "id",
            Attribute::required(AttributeType::String).with_description("The id of the Managed Database."),
        )
        .with_attribute("engine_id", Attribute::computed(AttributeType::String))
        .with_attribute("label", Attribute::computed(AttributeType::String))
        .with_attribute("region", Attribute::computed(AttributeType::String))
        .with_attribute("type", Attribute::computed(AttributeType::String))
        .with_attribute("allow_list", computed(AttributeType::set(AttributeType::String)))
        .with_attribute("cluster_size", Attribute::computed(AttributeType::Int64))
        .with_attribute("fork_restore_time", Attribute::computed(AttributeType::String))
        .with_attribute("fork_source", Attribute::computed(AttributeType::Int64))
        .with_attribute("suspended", Attribute::computed(AttributeType::Bool))
        .with_attribute(
            "updates",
            computed(AttributeType::object([
                ("day_of_week", AttributeType::Int64),
                ("duration", AttributeType::Int64),
                ("frequency", AttributeType::String),
                ("hour_of_day", AttributeType::Int64),
            ])),
        )
        .with_attribute(
            "private_network",
            computed(AttributeType::object([
                ("vpc_id", AttributeType::Int64),
                ("subnet_id", AttributeType::Int64),
                ("public_access", AttributeType::Bool),
            ])),
        );

    tunables(engine)
        .iter()
        .fold(computed_attributes(schema), |schema, tunable| {
            let attr = tunable.schema_attribute();
            schema.with_attribute(tunable.attribute, computed(attr.attr_type))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::UNKNOWN_VALUE;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_resource_schema_shape() {
        let schema = resource_schema(EngineType::Mysql);
        let attrs = &schema.block.attributes;

        assert!(attrs["region"].force_new);
        assert!(attrs["fork_source"].force_new);
        assert!(attrs["fork_restore_time"].force_new);
        assert!(!attrs["label"].force_new);
        assert!(attrs["root_password"].sensitive);
        assert!(attrs["ca_cert"].sensitive);
        assert_eq!(attrs["cluster_size"].default, Some(json!(1)));
        assert_eq!(attrs["suspended"].default, Some(json!(false)));
        assert!(attrs.contains_key("engine_config_mysql_sql_mode"));
        assert!(!attrs.contains_key("engine_config_work_mem"));
        assert!(schema.block.blocks.contains_key("updates"));
        assert!(schema.block.blocks.contains_key("private_network"));

        let pg = resource_schema(EngineType::Postgresql);
        assert!(pg.block.attributes.contains_key("engine_config_work_mem"));
    }

    #[test]
    fn test_resource_validation() {
        let schema = resource_schema(EngineType::Mysql);
        let valid = json!({
            "label": "tf_test",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "mysql/8",
            "cluster_size": 3,
            "updates": {"day_of_week": 3, "duration": 4, "hour_of_day": 2},
            "engine_config_mysql_connect_timeout": UNKNOWN_VALUE,
            "timeouts": {"create": "90m"}
        });
        assert!(validate(&schema, &valid).is_empty());

        let invalid = json!({
            "label": "tf_test",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "mysql/8",
            "cluster_size": 0,
            "updates": {"day_of_week": 8, "duration": 4, "hour_of_day": 24, "frequency": "daily"},
            "engine_config_mysql_connect_timeout": 1,
            "engine_config_mysql_internal_tmp_mem_storage_engine": "InnoDB",
            "engine_config_mysql_default_time_zone": "Europe/Berlin!",
            "timeouts": {"delete": "soon"}
        });
        let attrs: Vec<String> = validate(&schema, &invalid)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        for expected in [
            "cluster_size",
            "updates.day_of_week",
            "updates.hour_of_day",
            "updates.frequency",
            "engine_config_mysql_connect_timeout",
            "engine_config_mysql_internal_tmp_mem_storage_engine",
            "engine_config_mysql_default_time_zone",
            "timeouts.delete",
        ] {
            assert!(attrs.iter().any(|a| a == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_private_network_requires_ids() {
        let schema = resource_schema(EngineType::Postgresql);
        let config = json!({
            "label": "pg",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "postgresql/16",
            "private_network": {"vpc_id": 1}
        });
        let diagnostics = validate(&schema, &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("private_network.subnet_id")
        );
    }

    #[test]
    fn test_data_source_schema_is_read_only() {
        let schema = data_source_schema(EngineType::Mysql);
        assert!(schema.block.attributes["id"].is_required());
        assert!(schema
            .block
            .attributes
            .iter()
            .filter(|(name, _)| name.as_str() != "id")
            .all(|(_, attr)| attr.usage == Usage::Computed));
        assert!(schema.block.attributes.contains_key("engine_config_mysql_wait_timeout"));
    }
}

//! Wire types for the managed-database endpoints.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A managed database engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    /// MySQL.
    Mysql,
    /// PostgreSQL.
    Postgresql,
}

impl EngineType {
    /// All supported engines.
    pub const ALL: [EngineType; 2] = [EngineType::Mysql, EngineType::Postgresql];

    /// The engine name as it appears in REST paths and engine slugs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::Mysql),
            "postgresql" => Ok(Self::Postgresql),
            other => Err(format!(
                "unsupported database engine {other:?}; expected one of: mysql, postgresql"
            )),
        }
    }
}

/// Database lifecycle status as reported by the remote.
pub mod status {
    /// Ready to serve.
    pub const ACTIVE: &str = "active";
    /// Being suspended.
    pub const SUSPENDING: &str = "suspending";
    /// Suspended.
    pub const SUSPENDED: &str = "suspended";
    /// Being resumed.
    pub const RESUMING: &str = "resuming";
    /// Being provisioned.
    pub const PROVISIONING: &str = "provisioning";
}

/// Primary and secondary hostnames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseHosts {
    /// Primary host.
    #[serde(default)]
    pub primary: String,
    /// Secondary (read-only) host, if any.
    #[serde(default)]
    pub secondary: String,
}

/// A planned maintenance operation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// When the update must be applied by.
    #[serde(default, with = "linode_time::option")]
    pub deadline: Option<DateTime<Utc>>,
    /// What the update does.
    #[serde(default)]
    pub description: String,
    /// When the update is scheduled.
    #[serde(default, with = "linode_time::option")]
    pub planned_for: Option<DateTime<Utc>>,
}

/// Weekly maintenance window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    /// 1 (Monday) through 7 (Sunday).
    pub day_of_week: i64,
    /// Length of the window in hours.
    pub duration: i64,
    /// Only `weekly` is offered.
    pub frequency: String,
    /// Hour the window starts, 0 through 23.
    pub hour_of_day: i64,
    /// Planned updates, read-only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<PendingUpdate>,
}

/// Point-in-time restore source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseFork {
    /// Id of the source database.
    pub source: i64,
    /// Restore point.
    #[serde(default, with = "linode_time::option", skip_serializing_if = "Option::is_none")]
    pub restore_time: Option<DateTime<Utc>>,
}

/// VPC attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNetwork {
    /// VPC id.
    pub vpc_id: i64,
    /// Subnet id.
    pub subnet_id: i64,
    /// Whether the database keeps a public endpoint.
    #[serde(default)]
    pub public_access: bool,
}

/// A managed database instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// Numeric id.
    pub id: i64,
    /// Display label.
    pub label: String,
    /// Region slug.
    pub region: String,
    /// Node type, e.g. `g6-nanode-1`.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Engine family, e.g. `mysql`.
    pub engine: String,
    /// Full engine version, e.g. `8.0.35`.
    pub version: String,
    /// Lifecycle status.
    pub status: String,
    /// Node count.
    pub cluster_size: i64,
    /// Hosting platform.
    #[serde(default)]
    pub platform: String,
    /// Whether storage is encrypted.
    #[serde(default)]
    pub encrypted: bool,
    /// Allowed addresses or CIDR blocks.
    #[serde(default)]
    pub allow_list: Vec<String>,
    /// Connection port.
    #[serde(default)]
    pub port: i64,
    /// Whether TLS is required.
    #[serde(default)]
    pub ssl_connection: bool,
    /// Hostnames.
    #[serde(default)]
    pub hosts: DatabaseHosts,
    /// Member address to role (`primary` or `failover`).
    #[serde(default)]
    pub members: BTreeMap<String, String>,
    /// Creation time.
    #[serde(default, with = "linode_time::option")]
    pub created: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, with = "linode_time::option")]
    pub updated: Option<DateTime<Utc>>,
    /// Earliest point a fork can restore to.
    #[serde(default, with = "linode_time::option")]
    pub oldest_restore_time: Option<DateTime<Utc>>,
    /// Maintenance window.
    #[serde(default)]
    pub updates: Option<MaintenanceWindow>,
    /// Fork source, when created from another database.
    #[serde(default)]
    pub fork: Option<DatabaseFork>,
    /// VPC attachment.
    #[serde(default)]
    pub private_network: Option<PrivateNetwork>,
    /// Engine tunables, nested the way the remote reports them.
    #[serde(default)]
    pub engine_config: Value,
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CreateSpec {
    /// Display label.
    pub label: String,
    /// Region slug.
    pub region: String,
    /// Node type.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Engine slug, e.g. `mysql/8`.
    pub engine: String,
    /// Node count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_size: Option<i64>,
    /// Allowed addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<Vec<String>>,
    /// Fork source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork: Option<DatabaseFork>,
    /// VPC attachment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network: Option<PrivateNetwork>,
    /// Engine tunables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_config: Option<Value>,
}

/// Body of an update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSpec {
    /// Display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Allowed addresses; an empty list clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<Vec<String>>,
    /// Maintenance window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<MaintenanceWindow>,
    /// Node type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Node count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_size: Option<i64>,
    /// Target engine version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Engine tunables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_config: Option<Value>,
    /// VPC attachment; `Some(None)` detaches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network: Option<Option<PrivateNetwork>>,
}

impl UpdateSpec {
    /// Whether the request body would be empty.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// TLS material of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSsl {
    /// Base64-encoded CA certificate.
    pub ca_certificate: String,
}

/// Root credentials of a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCredentials {
    /// Root username.
    pub username: String,
    /// Root password.
    pub password: String,
}

/// An engine version offered by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEngine {
    /// Engine slug, e.g. `mysql/8`.
    pub id: String,
    /// Engine family.
    pub engine: String,
    /// Engine version.
    pub version: String,
}

/// The entity an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntity {
    /// Entity id.
    pub id: Option<i64>,
    /// Entity kind, e.g. `database`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Entity label.
    #[serde(default)]
    pub label: Option<String>,
}

/// An account event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event id.
    pub id: i64,
    /// Action, e.g. `database_create`.
    pub action: String,
    /// When the event was recorded.
    #[serde(with = "linode_time")]
    pub created: DateTime<Utc>,
    /// `scheduled`, `started`, `finished`, `failed` or `notification`.
    pub status: String,
    /// Affected entity.
    pub entity: Option<EventEntity>,
    /// Progress percentage, when reported.
    #[serde(default)]
    pub percent_complete: Option<i64>,
    /// Failure details, when reported.
    #[serde(default)]
    pub message: Option<String>,
}

/// Event actions awaited by the database resources.
pub mod action {
    /// A database was created.
    pub const DATABASE_CREATE: &str = "database_create";
    /// A database was updated.
    pub const DATABASE_UPDATE: &str = "database_update";
    /// A database was resized.
    pub const DATABASE_RESIZE: &str = "database_resize";
}

/// Filter for listing account events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    /// Entity kind.
    pub entity_kind: String,
    /// Entity id, if known.
    pub entity_id: Option<i64>,
    /// Action.
    pub action: String,
    /// Earliest creation time.
    pub since: DateTime<Utc>,
}

impl EventFilter {
    /// Whether an event satisfies the filter.
    pub fn matches(&self, event: &Event) -> bool {
        let Some(entity) = &event.entity else {
            return false;
        };
        event.action == self.action
            && entity.kind == self.entity_kind
            && self.entity_id.map_or(true, |id| entity.id == Some(id))
            && event.created >= self.since
    }

    /// The filter encoded for the `X-Filter` header.
    pub fn to_header(&self) -> Value {
        let mut filter = serde_json::json!({
            "entity.type": self.entity_kind,
            "action": self.action,
            "created": { "+gte": linode_time::format(&self.since) },
            "+order_by": "created",
            "+order": "desc",
        });
        if let (Some(id), Some(map)) = (self.entity_id, filter.as_object_mut()) {
            map.insert("entity.id".to_string(), Value::from(id));
        }
        filter
    }
}

/// Paged list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Current page number.
    #[serde(default = "first_page")]
    pub page: u32,
    /// Number of pages.
    #[serde(default = "first_page")]
    pub pages: u32,
}

fn first_page() -> u32 {
    1
}

/// Remote timestamps: `YYYY-MM-DDTHH:MM:SS` in UTC, RFC3339 also accepted.
pub mod linode_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    /// Format a timestamp the way the remote expects it.
    pub fn format(time: &DateTime<Utc>) -> String {
        time.format(FORMAT).to_string()
    }

    /// Parse a remote timestamp.
    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(s) {
            Ok(t) => Ok(t.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(s, FORMAT).map(|t| t.and_utc()),
        }
    }

    /// Serialize a timestamp.
    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(time))
    }

    /// Deserialize a timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Optional timestamps; null and empty strings decode to `None`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional timestamp.
        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_str(&super::format(t)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional timestamp.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(s) if !s.is_empty() => super::parse(&s).map(Some).map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_engine_type_parse() {
        assert_eq!("mysql".parse::<EngineType>(), Ok(EngineType::Mysql));
        assert_eq!("postgresql".parse::<EngineType>(), Ok(EngineType::Postgresql));
        assert!("mongodb".parse::<EngineType>().is_err());
        assert_eq!(EngineType::Postgresql.to_string(), "postgresql");
    }

    #[test]
    fn test_database_decode() {
        let db: Database = serde_json::from_value(json!({
            "id": 123,
            "label": "example",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine": "mysql",
            "version": "8.0.35",
            "status": "active",
            "cluster_size": 1,
            "encrypted": true,
            "allow_list": ["10.0.0.4/32"],
            "hosts": {"primary": "a.example.com"},
            "members": {"10.0.0.1": "primary"},
            "created": "2024-03-01T10:00:00",
            "oldest_restore_time": null,
            "updates": {
                "day_of_week": 3, "duration": 4, "frequency": "weekly", "hour_of_day": 2,
                "pending": [{"deadline": null, "description": "patch", "planned_for": "2024-04-01T00:00:00"}]
            },
            "fork": null,
            "engine_config": {"mysql": {"connect_timeout": 10}}
        }))
        .unwrap();

        assert_eq!(db.node_type, "g6-nanode-1");
        assert_eq!(db.hosts.secondary, "");
        assert_eq!(db.created, Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()));
        assert!(db.oldest_restore_time.is_none());
        let updates = db.updates.unwrap();
        assert_eq!(updates.pending.len(), 1);
        assert!(updates.pending[0].deadline.is_none());
        assert_eq!(db.engine_config["mysql"]["connect_timeout"], 10);
    }

    #[test]
    fn test_update_spec_serialization() {
        let spec = UpdateSpec {
            allow_list: Some(vec![]),
            private_network: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"allow_list": [], "private_network": null})
        );
        assert!(UpdateSpec::default().is_empty());
        assert!(!spec.is_empty());
    }

    #[test]
    fn test_event_filter() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filter = EventFilter {
            entity_kind: "database".to_string(),
            entity_id: Some(7),
            action: action::DATABASE_UPDATE.to_string(),
            since,
        };

        let event = |id: i64, created: DateTime<Utc>| Event {
            id: 1,
            action: action::DATABASE_UPDATE.to_string(),
            created,
            status: "finished".to_string(),
            entity: Some(EventEntity { id: Some(id), kind: "database".to_string(), label: None }),
            percent_complete: None,
            message: None,
        };

        assert!(filter.matches(&event(7, since)));
        assert!(!filter.matches(&event(8, since)));
        assert!(!filter.matches(&event(7, since - chrono::Duration::seconds(1))));

        let header = filter.to_header();
        assert_eq!(header["entity.id"], 7);
        assert_eq!(header["created"]["+gte"], "2024-01-01T00:00:00");
    }

    #[test]
    fn test_linode_time_accepts_rfc3339() {
        let t = linode_time::parse("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(linode_time::parse("yesterday").is_err());
    }
}

//! The attribute model of a managed database and its reconciliation with
//! the remote entity.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::attr::{keep_or_update, Attr};
use crate::client::types::{
    CreateSpec, Database, DatabaseCredentials, DatabaseFork, DatabaseSsl, EngineType,
    MaintenanceWindow, PendingUpdate, PrivateNetwork,
};
use crate::client::CloudClient;
use crate::database::engine_config::EngineConfig;
use crate::database::slug::{format_engine_slug, status_is_suspended};
use crate::error::ProviderError;

/// The `updates` maintenance window as the host sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatesModel {
    /// 1 (Monday) through 7 (Sunday).
    pub day_of_week: i64,
    /// Window length in hours.
    pub duration: i64,
    /// Always `weekly`.
    #[serde(default = "weekly")]
    pub frequency: String,
    /// Start hour, 0 through 23.
    pub hour_of_day: i64,
}

fn weekly() -> String {
    "weekly".to_string()
}

impl From<&MaintenanceWindow> for UpdatesModel {
    fn from(window: &MaintenanceWindow) -> Self {
        Self {
            day_of_week: window.day_of_week,
            duration: window.duration,
            frequency: window.frequency.clone(),
            hour_of_day: window.hour_of_day,
        }
    }
}

impl From<&UpdatesModel> for MaintenanceWindow {
    fn from(model: &UpdatesModel) -> Self {
        Self {
            day_of_week: model.day_of_week,
            duration: model.duration,
            frequency: model.frequency.clone(),
            hour_of_day: model.hour_of_day,
            pending: Vec::new(),
        }
    }
}

/// A pending maintenance operation as the host sees it (RFC3339 times).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingUpdateModel {
    /// Deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Description.
    pub description: String,
    /// Scheduled time.
    pub planned_for: Option<DateTime<Utc>>,
}

impl From<&PendingUpdate> for PendingUpdateModel {
    fn from(update: &PendingUpdate) -> Self {
        Self {
            deadline: update.deadline,
            description: update.description.clone(),
            planned_for: update.planned_for,
        }
    }
}

/// State of a `linode_database_<engine>_v2` resource or data source.
///
/// The engine tunables live in [`engine_config`](Self::engine_config) and
/// are read from and written to the flat `engine_config_*` keys by
/// [`from_state`](Self::from_state) and [`to_state`](Self::to_state).
/// Field names follow the host attribute names.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseModel {
    pub id: Attr<String>,

    pub allow_list: Attr<BTreeSet<String>>,
    pub ca_cert: Attr<String>,
    pub cluster_size: Attr<i64>,
    pub created: Attr<DateTime<Utc>>,
    pub encrypted: Attr<bool>,
    pub engine: Attr<String>,
    pub engine_id: Attr<String>,
    pub host_primary: Attr<String>,
    pub host_secondary: Attr<String>,
    pub label: Attr<String>,
    pub members: Attr<BTreeMap<String, String>>,
    pub platform: Attr<String>,
    pub port: Attr<i64>,
    pub region: Attr<String>,
    pub root_password: Attr<String>,
    pub root_username: Attr<String>,
    pub ssl_connection: Attr<bool>,
    pub status: Attr<String>,
    pub suspended: Attr<bool>,
    #[serde(rename = "type")]
    pub node_type: Attr<String>,
    pub updated: Attr<DateTime<Utc>>,
    pub version: Attr<String>,

    pub oldest_restore_time: Attr<DateTime<Utc>>,
    pub fork_source: Attr<i64>,
    pub fork_restore_time: Attr<DateTime<Utc>>,

    pub private_network: Attr<PrivateNetwork>,
    pub updates: Attr<UpdatesModel>,
    pub pending_updates: Attr<BTreeSet<PendingUpdateModel>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Value>,

    #[serde(skip)]
    pub engine_config: EngineConfig,
}

impl DatabaseModel {
    /// Decode a host state or plan object.
    pub fn from_state(engine: EngineType, state: &Value) -> Result<Self, ProviderError> {
        let mut model: Self = serde_json::from_value(state.clone())?;
        let empty = serde_json::Map::new();
        let object = state.as_object().unwrap_or(&empty);
        model.engine_config = EngineConfig::from_state(engine, object)?;
        Ok(model)
    }

    /// Encode as a host state object.
    pub fn to_state(&self) -> Value {
        let mut state = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()));
        if let Value::Object(ref mut object) = state {
            self.engine_config.write_state(object);
        }
        state
    }

    /// The numeric database id.
    pub fn database_id(&self) -> Result<i64, ProviderError> {
        let id = self
            .id
            .known()
            .ok_or_else(|| ProviderError::Validation("database id is not set".to_string()))?;
        id.parse().map_err(|_| {
            ProviderError::Validation(format!("invalid database id {id:?}: expected an integer"))
        })
    }

    /// Project a remote database, with its TLS material and credentials
    /// when they could be fetched.
    ///
    /// `ca_cert` and the root credentials become null whenever `ssl` or
    /// `creds` is absent, regardless of `preserve_known`.
    pub fn flatten(
        &mut self,
        engine: EngineType,
        db: &Database,
        ssl: Option<&DatabaseSsl>,
        creds: Option<&DatabaseCredentials>,
        preserve_known: bool,
    ) -> Result<(), ProviderError> {
        fn update<T>(slot: &mut Attr<T>, value: Attr<T>, preserve_known: bool) {
            let current = std::mem::take(slot);
            *slot = keep_or_update(current, value, preserve_known);
        }
        let p = preserve_known;

        update(&mut self.id, Attr::Known(db.id.to_string()), p);
        update(&mut self.cluster_size, Attr::Known(db.cluster_size), p);
        update(&mut self.created, Attr::from_option(db.created), p);
        update(&mut self.encrypted, Attr::Known(db.encrypted), p);
        update(&mut self.engine, Attr::Known(db.engine.clone()), p);
        update(
            &mut self.engine_id,
            Attr::Known(format_engine_slug(&db.engine, &db.version)),
            p,
        );
        update(&mut self.host_primary, Attr::Known(db.hosts.primary.clone()), p);
        update(&mut self.host_secondary, Attr::Known(db.hosts.secondary.clone()), p);
        update(&mut self.label, Attr::Known(db.label.clone()), p);
        update(&mut self.oldest_restore_time, Attr::from_option(db.oldest_restore_time), p);
        update(&mut self.platform, Attr::Known(db.platform.clone()), p);
        update(&mut self.port, Attr::Known(db.port), p);
        update(&mut self.region, Attr::Known(db.region.clone()), p);
        update(&mut self.ssl_connection, Attr::Known(db.ssl_connection), p);
        update(&mut self.status, Attr::Known(db.status.clone()), p);
        update(&mut self.suspended, Attr::Known(status_is_suspended(&db.status)), p);
        update(&mut self.node_type, Attr::Known(db.node_type.clone()), p);
        update(&mut self.updated, Attr::from_option(db.updated), p);
        update(&mut self.version, Attr::Known(db.version.clone()), p);

        match ssl {
            Some(ssl) => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(ssl.ca_certificate.trim())
                    .map_err(|err| {
                        ProviderError::Sdk(format!("invalid CA certificate encoding: {err}"))
                    })?;
                let cert = String::from_utf8_lossy(&decoded).into_owned();
                update(&mut self.ca_cert, Attr::Known(cert), p);
            }
            None => self.ca_cert = Attr::Null,
        }

        match creds {
            Some(creds) => {
                update(&mut self.root_password, Attr::Known(creds.password.clone()), p);
                update(&mut self.root_username, Attr::Known(creds.username.clone()), p);
            }
            None => {
                self.root_password = Attr::Null;
                self.root_username = Attr::Null;
            }
        }

        update(
            &mut self.allow_list,
            Attr::Known(db.allow_list.iter().cloned().collect()),
            p,
        );
        update(&mut self.members, Attr::Known(db.members.clone()), p);

        update(&mut self.fork_source, Attr::from_option(db.fork.as_ref().map(|f| f.source)), p);
        update(
            &mut self.fork_restore_time,
            Attr::from_option(db.fork.as_ref().and_then(|f| f.restore_time)),
            p,
        );

        update(&mut self.private_network, Attr::from_option(db.private_network.clone()), p);
        update(
            &mut self.updates,
            Attr::from_option(db.updates.as_ref().map(UpdatesModel::from)),
            p,
        );
        let pending: BTreeSet<PendingUpdateModel> = db
            .updates
            .iter()
            .flat_map(|window| window.pending.iter())
            .map(PendingUpdateModel::from)
            .collect();
        update(&mut self.pending_updates, Attr::Known(pending), p);

        self.engine_config.flatten(engine, &db.engine_config, p);
        Ok(())
    }

    /// Fetch database `id` and [`flatten`](Self::flatten) it.
    ///
    /// TLS material and credentials are not requested while the database is
    /// suspended; their endpoints reject requests in that state.
    pub async fn refresh<C: CloudClient + ?Sized>(
        &mut self,
        client: &C,
        engine: EngineType,
        id: i64,
        preserve_known: bool,
    ) -> Result<(), ProviderError> {
        debug!(database_id = id, %engine, preserve_known, "Refreshing database");
        let db = client.get_database(engine, id).await?;

        let (ssl, creds) = if status_is_suspended(&db.status) {
            debug!(database_id = id, status = %db.status, "Skipping TLS and credentials while suspended");
            (None, None)
        } else {
            (
                Some(client.get_ssl(engine, id).await?),
                Some(client.get_credentials(engine, id).await?),
            )
        };

        self.flatten(engine, &db, ssl.as_ref(), creds.as_ref(), preserve_known)
    }

    /// Field-wise [`keep_or_update`] from `other`.
    pub fn copy_from(&mut self, other: &DatabaseModel, preserve_known: bool) {
        macro_rules! copy_fields {
            ($($field:ident),* $(,)?) => {
                $(
                    let current = std::mem::take(&mut self.$field);
                    self.$field = keep_or_update(current, other.$field.clone(), preserve_known);
                )*
            };
        }
        copy_fields!(
            id,
            allow_list,
            ca_cert,
            cluster_size,
            created,
            encrypted,
            engine,
            engine_id,
            host_primary,
            host_secondary,
            label,
            members,
            platform,
            port,
            region,
            root_password,
            root_username,
            ssl_connection,
            status,
            suspended,
            node_type,
            updated,
            version,
            oldest_restore_time,
            fork_source,
            fork_restore_time,
            private_network,
            updates,
            pending_updates,
        );
        self.engine_config.copy_from(&other.engine_config, preserve_known);
    }

    /// Whether every user-mutable attribute is equal.
    pub fn mutable_equal(&self, other: &DatabaseModel) -> bool {
        self.label == other.label
            && self.allow_list == other.allow_list
            && self.node_type == other.node_type
            && self.cluster_size == other.cluster_size
            && self.engine_id == other.engine_id
            && self.updates == other.updates
            && self.suspended == other.suspended
            && self.private_network == other.private_network
            && self.engine_config.changed(&other.engine_config).is_empty()
    }

    /// Mark every unset computed attribute unknown, as a create plan does.
    pub fn mark_computed_unknown(&mut self, engine: EngineType) {
        macro_rules! unknown_if_null {
            ($($field:ident),* $(,)?) => {
                $(
                    if self.$field.is_null() {
                        self.$field = Attr::Unknown;
                    }
                )*
            };
        }
        unknown_if_null!(
            id,
            allow_list,
            ca_cert,
            created,
            encrypted,
            engine,
            host_primary,
            host_secondary,
            members,
            oldest_restore_time,
            pending_updates,
            platform,
            port,
            root_password,
            root_username,
            ssl_connection,
            status,
            updated,
            version,
            fork_restore_time,
            updates,
        );
        self.engine_config.mark_computed_unknown(engine);
    }

    /// Take unset computed attributes from `prior`, as an update plan does.
    pub fn use_prior_for_unknown(&mut self, engine: EngineType, prior: &DatabaseModel) {
        macro_rules! prior_if_unset {
            ($($field:ident),* $(,)?) => {
                $(
                    if !self.$field.is_known() {
                        self.$field = prior.$field.clone();
                    }
                )*
            };
        }
        prior_if_unset!(
            id,
            allow_list,
            ca_cert,
            created,
            encrypted,
            engine,
            host_primary,
            host_secondary,
            members,
            oldest_restore_time,
            pending_updates,
            platform,
            port,
            root_password,
            root_username,
            ssl_connection,
            status,
            updated,
            version,
            fork_restore_time,
            updates,
        );
        self.engine_config.use_prior_for_unknown(engine, &prior.engine_config);
    }

    /// The fork source, when either half of it is set.
    pub fn fork(&self) -> Result<Option<DatabaseFork>, ProviderError> {
        match (&self.fork_source, &self.fork_restore_time) {
            (Attr::Known(source), restore_time) => Ok(Some(DatabaseFork {
                source: *source,
                restore_time: restore_time.known().copied(),
            })),
            (_, Attr::Known(_)) => Err(ProviderError::Validation(
                "fork_restore_time requires fork_source".to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// The allow list, when known.
    pub fn allow_list_vec(&self) -> Option<Vec<String>> {
        self.allow_list.known().map(|set| set.iter().cloned().collect())
    }

    /// The create request body for this plan.
    pub fn create_spec(&self, engine: EngineType) -> Result<CreateSpec, ProviderError> {
        let required = |attr: &Attr<String>, name: &str| {
            attr.known().cloned().ok_or_else(|| {
                ProviderError::Validation(format!("{name} must be known before creation"))
            })
        };
        Ok(CreateSpec {
            label: required(&self.label, "label")?,
            region: required(&self.region, "region")?,
            node_type: required(&self.node_type, "type")?,
            engine: required(&self.engine_id, "engine_id")?,
            cluster_size: self.cluster_size.known().copied(),
            allow_list: self.allow_list_vec(),
            fork: self.fork()?,
            private_network: self.private_network.known().cloned(),
            engine_config: Some(self.engine_config.expand(engine)),
        })
    }
}

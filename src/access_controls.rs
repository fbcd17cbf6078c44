//! The `linode_database_access_controls` resource.
//!
//! It owns the allow list of an existing database rather than a remote
//! object of its own: create and update replace the parent's allow list,
//! read projects it, and delete clears it. Removing this resource therefore
//! leaves the parent database reachable from nowhere.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::attr::Attr;
use crate::client::{CloudClient, EngineType, UpdateSpec};
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeType, Diagnostic, Schema, ValueValidator};
use crate::types::{attribute_changes, PlanResult, ResourceResponse};

/// Host type name.
pub const TYPE_NAME: &str = "linode_database_access_controls";

/// Composite id `<database-id>:<engine>`.
pub fn format_id(database_id: i64, engine: &str) -> String {
    format!("{database_id}:{engine}")
}

/// Split a composite id into the database id and engine name.
///
/// Exactly two non-empty colon-delimited segments are accepted, the first
/// an integer.
pub fn parse_id(id: &str) -> Result<(i64, String), ProviderError> {
    let invalid = |why: &str| {
        ProviderError::Validation(format!(
            "invalid access controls id {id:?}: {why}; expected <database-id>:<engine>"
        ))
    };
    let parts: Vec<&str> = id.split(':').collect();
    let [database_id, engine] = parts.as_slice() else {
        return Err(invalid(&format!("got {} segments", parts.len())));
    };
    if engine.is_empty() {
        return Err(invalid("empty engine"));
    }
    let database_id = database_id
        .parse()
        .map_err(|_| invalid("database id is not an integer"))?;
    Ok((database_id, engine.to_string()))
}

/// Resolve the engine a parent database is addressed by.
fn engine_of(database_type: &str) -> Result<EngineType, ProviderError> {
    database_type.parse().map_err(|_| {
        ProviderError::Validation(format!(
            "invalid database engine: {database_type}; expected one of mysql, postgresql"
        ))
    })
}

/// Host schema.
pub fn schema() -> Schema {
    let engines = EngineType::ALL.iter().map(|e| e.as_str().to_string()).collect();
    Schema::new()
        .with_attribute(
            "id",
            Attribute::computed(AttributeType::String)
                .with_description("The composite id <database_id>:<database_type>."),
        )
        .with_attribute(
            "database_id",
            Attribute::required(AttributeType::Int64)
                .with_force_new()
                .with_description("The unique ID of the target database."),
        )
        .with_attribute(
            "database_type",
            Attribute::required(AttributeType::String)
                .with_force_new()
                .with_description("The type of the target database.")
                .with_validator(ValueValidator::OneOf(engines)),
        )
        .with_attribute(
            "allow_list",
            Attribute::required(AttributeType::set(AttributeType::String)).with_description(
                "A list of IP addresses that can access the Managed Database. \
                 Deleting this resource clears the database's allow list.",
            ),
        )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct AccessControlsModel {
    id: Attr<String>,
    database_id: Attr<i64>,
    database_type: Attr<String>,
    allow_list: Attr<BTreeSet<String>>,
}

impl AccessControlsModel {
    fn from_state(state: &Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(state.clone())?)
    }

    fn to_state(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    fn target(&self) -> Result<(i64, EngineType), ProviderError> {
        let database_id = self.database_id.known().copied().ok_or_else(|| {
            ProviderError::Validation("database_id must be known".to_string())
        })?;
        let database_type = self.database_type.known().ok_or_else(|| {
            ProviderError::Validation("database_type must be known".to_string())
        })?;
        Ok((database_id, engine_of(database_type)?))
    }

    fn allow_list(&self) -> Vec<String> {
        self.allow_list
            .known()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

async fn set_allow_list<C: CloudClient + ?Sized>(
    client: &C,
    engine: EngineType,
    database_id: i64,
    allow_list: Vec<String>,
) -> Result<(), ProviderError> {
    info!(database_id, %engine, entries = allow_list.len(), "Setting database allow list");
    let spec = UpdateSpec {
        allow_list: Some(allow_list),
        ..Default::default()
    };
    client
        .update_database(engine, database_id, &spec)
        .await
        .map_err(|err| {
            ProviderError::from(crate::error::ApiError {
                message: format!(
                    "failed to set allow_list for database {database_id}: {}",
                    err.message
                ),
                ..err
            })
        })?;
    Ok(())
}

/// Compute the planned state.
pub fn plan(prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
    if proposed.is_null() {
        return Ok(PlanResult::no_change(Value::Null));
    }
    let mut planned = AccessControlsModel::from_state(proposed)?;

    let Some(prior_state) = prior.filter(|p| !p.is_null()) else {
        planned.id = match (&planned.database_id, &planned.database_type) {
            (Attr::Known(id), Attr::Known(engine)) => Attr::Known(format_id(*id, engine)),
            _ => Attr::Unknown,
        };
        let state = planned.to_state()?;
        let changes = attribute_changes(None, &state);
        return Ok(PlanResult::with_changes(state, changes, Vec::new()));
    };

    let prior = AccessControlsModel::from_state(prior_state)?;
    let mut replace = Vec::new();
    if planned.database_id.is_known() && planned.database_id != prior.database_id {
        replace.push("database_id".to_string());
    }
    if planned.database_type.is_known() && planned.database_type != prior.database_type {
        replace.push("database_type".to_string());
    }
    planned.id = if replace.is_empty() {
        prior.id.clone()
    } else {
        Attr::Unknown
    };

    let state = planned.to_state()?;
    let changes = attribute_changes(Some(prior_state), &state);
    if changes.is_empty() {
        return Ok(PlanResult::no_change(state));
    }
    Ok(PlanResult::with_changes(state, changes, replace))
}

/// Replace the parent's allow list and record the composite id.
pub async fn create<C: CloudClient + ?Sized>(
    client: &C,
    planned: &Value,
) -> Result<ResourceResponse, ProviderError> {
    let mut data = AccessControlsModel::from_state(planned)?;
    let (database_id, engine) = data.target()?;
    set_allow_list(client, engine, database_id, data.allow_list()).await?;
    data.id = Attr::Known(format_id(database_id, engine.as_str()));
    Ok(ResourceResponse::ok(data.to_state()?))
}

/// Project the parent's allow list.
pub async fn read<C: CloudClient + ?Sized>(
    client: &C,
    state: &Value,
) -> Result<ResourceResponse, ProviderError> {
    let mut data = AccessControlsModel::from_state(state)?;
    let id = data.id.known().cloned().unwrap_or_default();
    let (database_id, database_type) = parse_id(&id)?;
    let engine = engine_of(&database_type)?;

    let db = match client.get_database(engine, database_id).await {
        Ok(db) => db,
        Err(err) if err.is_not_found() => {
            warn!(database_id, %engine, "Parent database no longer exists, removing allow list from state");
            return Ok(ResourceResponse::removed(
                Diagnostic::warning("Removing allow_list from state because it no longer exists")
                    .with_detail(err.message),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    data.database_id = Attr::Known(database_id);
    data.database_type = Attr::Known(database_type);
    data.allow_list = Attr::Known(db.allow_list.into_iter().collect());
    Ok(ResourceResponse::ok(data.to_state()?))
}

/// Replace the parent's allow list with the planned one.
pub async fn update<C: CloudClient + ?Sized>(
    client: &C,
    prior: &Value,
    planned: &Value,
) -> Result<ResourceResponse, ProviderError> {
    let mut state = AccessControlsModel::from_state(prior)?;
    let plan = AccessControlsModel::from_state(planned)?;
    let (database_id, engine) = state.target()?;
    set_allow_list(client, engine, database_id, plan.allow_list()).await?;
    state.allow_list = plan.allow_list;
    Ok(ResourceResponse::ok(state.to_state()?))
}

/// Clear the parent's allow list.
pub async fn delete<C: CloudClient + ?Sized>(client: &C, state: &Value) -> Result<(), ProviderError> {
    let data = AccessControlsModel::from_state(state)?;
    let (database_id, engine) = data.target()?;
    match set_allow_list(client, engine, database_id, Vec::new()).await {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

/// Import by composite id.
pub async fn import<C: CloudClient + ?Sized>(client: &C, id: &str) -> Result<Value, ProviderError> {
    let (database_id, database_type) = parse_id(id)?;
    engine_of(&database_type)?;
    let response = read(client, &serde_json::json!({ "id": id })).await?;
    response.state.ok_or_else(|| {
        ProviderError::NotFound(format!("{database_type} database {database_id} does not exist"))
    })
}

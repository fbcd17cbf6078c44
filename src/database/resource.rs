//! Lifecycle of the `linode_database_<engine>_v2` resources.
//!
//! One [`DatabaseResource`] serves each engine family. Every operation is a
//! sequence of REST calls against a [`CloudClient`] with the waits in
//! between, and ends with a refresh of the attribute model from the remote.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::attr::{null_unknowns, Attr};
use crate::client::types::{action, status, MaintenanceWindow};
use crate::client::{CloudClient, EngineType, UpdateSpec};
use crate::config::Timeouts;
use crate::database::engine_config::EngineConfig;
use crate::database::model::DatabaseModel;
use crate::database::schema::resource_schema;
use crate::database::slug::{format_engine_slug, parse_engine_slug};
use crate::database::suspension::reconcile_suspension;
use crate::error::ProviderError;
use crate::poller::{
    wait_for_condition, wait_for_status, EventPoller, DELETE_POLL_INTERVAL, ENTITY_DATABASE,
};
use crate::schema::{Diagnostic, Schema};
use crate::types::{attribute_changes, PlanResult, ResourceResponse};

/// The REST calls an update needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    /// Request body.
    pub spec: UpdateSpec,
    /// Whether the remote reports the change as a `database_update` event.
    pub update: bool,
    /// Whether the remote reports the change as a `database_resize` event.
    pub resize: bool,
}

impl UpdatePlan {
    /// Collect the changes between `state` and `plan` into one request.
    ///
    /// Attributes the plan leaves unknown are not changes. Changing the
    /// engine family of `engine_id` is rejected.
    pub fn diff(
        engine: EngineType,
        state: &DatabaseModel,
        plan: &DatabaseModel,
    ) -> Result<Self, ProviderError> {
        fn changed<T: PartialEq>(state: &Attr<T>, plan: &Attr<T>) -> bool {
            plan.is_known() && state != plan
        }

        let mut out = Self::default();

        if changed(&state.label, &plan.label) {
            out.update = true;
            out.spec.label = plan.label.known().cloned();
        }

        if changed(&state.allow_list, &plan.allow_list) {
            out.update = true;
            out.spec.allow_list = plan.allow_list_vec();
        }

        if changed(&state.node_type, &plan.node_type) {
            out.resize = true;
            out.spec.node_type = plan.node_type.known().cloned();
        }

        if !plan.private_network.is_unknown() && state.private_network != plan.private_network {
            out.update = true;
            out.spec.private_network = Some(plan.private_network.known().cloned());
        }

        if let (true, Attr::Known(updates)) =
            (changed(&state.updates, &plan.updates), &plan.updates)
        {
            out.update = true;
            out.spec.updates = Some(MaintenanceWindow::from(updates));
        }

        let tunables = plan
            .engine_config
            .changed(&state.engine_config)
            .into_iter()
            .filter(|name| {
                !plan
                    .engine_config
                    .get(name)
                    .is_some_and(|value| value.is_unknown())
            })
            .count();
        if tunables > 0 {
            out.update = true;
            out.spec.engine_config = Some(plan.engine_config.expand(engine));
        }

        if let (true, Attr::Known(slug)) =
            (changed(&state.engine_id, &plan.engine_id), &plan.engine_id)
        {
            let (family, version) = parse_engine_slug(slug)?;
            let current = state.engine.known().map_or(engine.as_str(), String::as_str);
            if family != current {
                return Err(ProviderError::SchemaConsistency(format!(
                    "cannot update engine component of engine_id: {family} != {current}"
                )));
            }
            out.update = true;
            out.spec.version = Some(version.to_string());
        }

        if changed(&state.cluster_size, &plan.cluster_size) {
            out.resize = true;
            out.spec.cluster_size = plan.cluster_size.known().copied();
        }

        Ok(out)
    }

    /// Whether any REST call is needed.
    pub fn is_empty(&self) -> bool {
        !self.update && !self.resize
    }
}

/// Deadline `timeout` from now; timeouts past the clock's range never expire.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60))
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

/// Run `operation` unless `deadline` passes first.
async fn before_deadline<T>(
    deadline: Instant,
    timeout: Duration,
    what: impl FnOnce() -> String,
    operation: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    match tokio::time::timeout_at(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::DeadlineExceeded(format!(
            "{} did not complete within {timeout:?}",
            what()
        ))),
    }
}

/// A managed database resource of one engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseResource {
    engine: EngineType,
}

impl DatabaseResource {
    /// The resource for `engine`.
    pub const fn new(engine: EngineType) -> Self {
        Self { engine }
    }

    /// Engine family served.
    pub fn engine(&self) -> EngineType {
        self.engine
    }

    /// Host type name, e.g. `linode_database_mysql_v2`.
    pub fn type_name(&self) -> String {
        format!("linode_database_{}_v2", self.engine)
    }

    /// Host schema.
    pub fn schema(&self) -> Schema {
        resource_schema(self.engine)
    }

    /// Compute the planned state.
    ///
    /// Defaults are filled in. Without a prior state every unset computed
    /// attribute becomes unknown; with one, unset computed attributes keep
    /// their prior value and the attributes a change will recompute become
    /// unknown.
    pub fn plan(&self, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
        if proposed.is_null() {
            return Ok(PlanResult::no_change(Value::Null));
        }
        let engine = self.engine;
        let mut planned = DatabaseModel::from_state(engine, proposed)?;
        if planned.cluster_size.is_null() {
            planned.cluster_size = Attr::Known(1);
        }
        if planned.suspended.is_null() {
            planned.suspended = Attr::Known(false);
        }

        let Some(prior_state) = prior.filter(|p| !p.is_null()) else {
            planned.mark_computed_unknown(engine);
            let state = planned.to_state();
            let changes = attribute_changes(None, &state);
            return Ok(PlanResult::with_changes(state, changes, Vec::new()));
        };

        let prior = DatabaseModel::from_state(engine, prior_state)?;
        planned.use_prior_for_unknown(engine, &prior);

        let mut replace = Vec::new();
        if planned.region.is_known() && planned.region != prior.region {
            replace.push("region".to_string());
        }
        if !planned.fork_source.is_unknown() && planned.fork_source != prior.fork_source {
            replace.push("fork_source".to_string());
        }
        if planned.fork_restore_time.is_known() && planned.fork_restore_time != prior.fork_restore_time {
            replace.push("fork_restore_time".to_string());
        }

        if !replace.is_empty() {
            let mut fresh = DatabaseModel::from_state(engine, proposed)?;
            fresh.cluster_size = planned.cluster_size.clone();
            fresh.suspended = planned.suspended.clone();
            fresh.mark_computed_unknown(engine);
            planned = fresh;
        } else if !planned.mutable_equal(&prior) {
            planned.updated = Attr::Unknown;
            if planned.engine_id != prior.engine_id {
                planned.version = Attr::Unknown;
            }
            if planned.cluster_size != prior.cluster_size || planned.node_type != prior.node_type {
                planned.members = Attr::Unknown;
                planned.host_secondary = Attr::Unknown;
            }
            if planned.suspended != prior.suspended {
                planned.status = Attr::Unknown;
                planned.ca_cert = Attr::Unknown;
                planned.root_password = Attr::Unknown;
                planned.root_username = Attr::Unknown;
            }
        }

        let state = planned.to_state();
        let changes = attribute_changes(Some(prior_state), &state);
        if changes.is_empty() {
            return Ok(PlanResult::no_change(state));
        }
        Ok(PlanResult::with_changes(state, changes, replace))
    }

    /// Create the database described by `planned`.
    ///
    /// Once the create call returns, any later failure yields the partial
    /// state carrying the new id next to the error, so the database is
    /// never orphaned.
    pub async fn create<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        planned: &Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let engine = self.engine;
        let mut data = DatabaseModel::from_state(engine, planned)?;
        let timeouts = Timeouts::from_state(planned)?;
        let deadline = deadline_after(timeouts.create);
        let spec = data.create_spec(engine)?;
        check_engine_offered(client, engine, &spec.engine).await?;

        let mut poller = EventPoller::without_entity(client, ENTITY_DATABASE, action::DATABASE_CREATE);

        info!(%engine, label = %spec.label, region = %spec.region, "Creating database");
        debug!(?spec, "create_database");
        let db = client.create_database(engine, &spec).await?;
        let id = db.id;
        data.id = Attr::Known(id.to_string());
        poller.set_entity_id(id);

        let settled = before_deadline(
            deadline,
            timeouts.create,
            || format!("creation of {engine} database {id}"),
            self.settle_created(client, poller, &mut data, id, deadline),
        )
        .await;
        if let Err(err) = settled {
            warn!(database_id = id, %engine, error = %err, "Database created but did not settle");
            let mut state = data.to_state();
            null_unknowns(&mut state);
            return Ok(ResourceResponse::partial(state, &err));
        }

        // The id always comes from the create response.
        data.id = Attr::Known(id.to_string());
        info!(database_id = id, %engine, "Created database");
        Ok(ResourceResponse::ok(data.to_state()))
    }

    async fn settle_created<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        poller: EventPoller<'_, C>,
        data: &mut DatabaseModel,
        id: i64,
        deadline: Instant,
    ) -> Result<(), ProviderError> {
        let engine = self.engine;

        debug!(database_id = id, "Waiting for database to finish provisioning");
        poller.wait_for_finished(remaining(deadline)).await?;

        // The create event can finish before the status turns active.
        debug!(database_id = id, "Waiting for database to enter active status");
        wait_for_status(client, engine, id, status::ACTIVE, remaining(deadline)).await?;

        if let Attr::Known(updates) = &data.updates {
            let spec = UpdateSpec {
                updates: Some(MaintenanceWindow::from(updates)),
                ..Default::default()
            };
            debug!(database_id = id, ?spec, "update_database");
            client.update_database(engine, id, &spec).await?;
        }

        let desired = data.suspended.known_or(false);
        reconcile_suspension(client, engine, id, false, desired, remaining(deadline)).await?;

        data.refresh(client, engine, id, true).await
    }

    /// Refresh `state` from the remote.
    ///
    /// A database that no longer exists is removed from state with a
    /// warning.
    pub async fn read<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        state: &Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let engine = self.engine;
        let mut data = DatabaseModel::from_state(engine, state)?;

        if data.id.known().map_or(true, String::is_empty) {
            warn!(%engine, "Removing database without an id from state");
            return Ok(ResourceResponse::removed(
                Diagnostic::warning("Database has no id")
                    .with_detail("Removing the database from state because its id is empty")
                    .with_attribute("id"),
            ));
        }
        let id = data.database_id()?;

        match data.refresh(client, engine, id, false).await {
            Ok(()) => Ok(ResourceResponse::ok(data.to_state())),
            Err(err) if err.is_not_found() => {
                warn!(database_id = id, %engine, "Database no longer exists, removing from state");
                Ok(ResourceResponse::removed(
                    Diagnostic::warning("Database no longer exists").with_detail(format!(
                        "Removing {engine} database with ID {id} from state because it no longer exists"
                    )),
                ))
            }
            Err(err) => Err(err),
        }
    }

    /// Apply the difference between `prior` and `planned`.
    ///
    /// Suspension is reconciled first, then all other changes go out in a
    /// single update call whose update and resize events are awaited. The
    /// whole sequence is bounded by the update timeout. On failure the prior
    /// state is returned next to the error.
    pub async fn update<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        prior: &Value,
        planned: &Value,
    ) -> Result<ResourceResponse, ProviderError> {
        let engine = self.engine;
        let state = DatabaseModel::from_state(engine, prior)?;
        let mut plan = DatabaseModel::from_state(engine, planned)?;
        let id = plan.database_id().or_else(|_| state.database_id())?;
        let timeouts = Timeouts::from_state(planned)?;
        let changes = UpdatePlan::diff(engine, &state, &plan)?;
        let deadline = deadline_after(timeouts.update);

        let applied = before_deadline(
            deadline,
            timeouts.update,
            || format!("update of {engine} database {id}"),
            self.apply_update(client, &state, &mut plan, &changes, id, deadline),
        )
        .await;
        if let Err(err) = applied {
            warn!(database_id = id, %engine, error = %err, "Database update failed");
            return Ok(ResourceResponse::partial(prior.clone(), &err));
        }

        plan.copy_from(&state, true);
        if plan.id.known().map_or(true, String::is_empty) {
            plan.id = state.id.clone();
        }
        Ok(ResourceResponse::ok(plan.to_state()))
    }

    async fn apply_update<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        state: &DatabaseModel,
        plan: &mut DatabaseModel,
        changes: &UpdatePlan,
        id: i64,
        deadline: Instant,
    ) -> Result<(), ProviderError> {
        let engine = self.engine;

        let observed = state.suspended.known_or(false);
        let desired = plan.suspended.known().copied().unwrap_or(observed);
        reconcile_suspension(client, engine, id, observed, desired, remaining(deadline)).await?;

        if !changes.is_empty() {
            let update_poller = if changes.update {
                Some(EventPoller::new(client, ENTITY_DATABASE, id, action::DATABASE_UPDATE).await?)
            } else {
                None
            };
            let resize_poller = if changes.resize {
                Some(EventPoller::new(client, ENTITY_DATABASE, id, action::DATABASE_RESIZE).await?)
            } else {
                None
            };

            info!(
                database_id = id,
                %engine,
                update = changes.update,
                resize = changes.resize,
                "Updating database"
            );
            debug!(database_id = id, spec = ?changes.spec, "update_database");
            client.update_database(engine, id, &changes.spec).await?;

            if let Some(poller) = update_poller {
                poller.wait_for_finished(remaining(deadline)).await?;
            }
            if let Some(poller) = resize_poller {
                poller.wait_for_finished(remaining(deadline)).await?;
            }
        }

        plan.refresh(client, engine, id, false).await
    }

    /// Delete the database and wait until it is gone.
    ///
    /// A database that is already gone counts as deleted.
    pub async fn delete<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        state: &Value,
    ) -> Result<(), ProviderError> {
        let engine = self.engine;
        let data = DatabaseModel::from_state(engine, state)?;
        let timeouts = Timeouts::from_state(state)?;
        let id = data.database_id()?;

        info!(database_id = id, %engine, "Deleting database");
        match client.delete_database(engine, id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(database_id = id, "Database already deleted");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        // Deletion takes a while to propagate; dependants such as VPCs
        // cannot be removed before the database is absent.
        wait_for_condition(DELETE_POLL_INTERVAL, timeouts.delete, move || async move {
            match client.get_database(engine, id).await {
                Ok(_) => Ok(false),
                Err(err) if err.is_not_found() => Ok(true),
                Err(err) => Err(err),
            }
        })
        .await?;

        info!(database_id = id, %engine, "Deleted database");
        Ok(())
    }

    /// Import the database with decimal id `id`.
    pub async fn import<C: CloudClient + ?Sized>(
        &self,
        client: &C,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let engine = self.engine;
        let database_id: i64 = id.trim().parse().map_err(|_| {
            ProviderError::Validation(format!("invalid database id {id:?}: expected an integer"))
        })?;

        info!(database_id, %engine, "Importing database");
        let mut data = DatabaseModel {
            engine_config: EngineConfig::empty(engine),
            ..Default::default()
        };
        data.refresh(client, engine, database_id, false).await?;
        Ok(data.to_state())
    }
}

/// Fail unless `slug` names an engine version the remote offers for `engine`.
pub async fn check_engine_offered<C: CloudClient + ?Sized>(
    client: &C,
    engine: EngineType,
    slug: &str,
) -> Result<(), ProviderError> {
    let (family, _) = parse_engine_slug(slug)?;
    if family != engine.as_str() {
        return Err(ProviderError::Validation(format!(
            "engine_id {slug:?} is not a {engine} engine"
        )));
    }

    let engines = client.list_engines(Some(engine)).await?;
    let offered = engines
        .iter()
        .any(|e| e.id == slug || format_engine_slug(&e.engine, &e.version) == slug);
    if !offered {
        let available: Vec<&str> = engines.iter().map(|e| e.id.as_str()).collect();
        return Err(ProviderError::Validation(format!(
            "engine_id {slug:?} is not offered; available: {}",
            available.join(", ")
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::UNKNOWN_VALUE;
    use crate::client::types::PrivateNetwork;
    use crate::testing::FakeCloud;
    use serde_json::json;

    const MYSQL: DatabaseResource = DatabaseResource::new(EngineType::Mysql);

    fn basic_config() -> Value {
        json!({
            "label": "tf_test_basic",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "mysql/8"
        })
    }

    async fn create(cloud: &FakeCloud, resource: DatabaseResource, config: Value) -> Value {
        let planned = resource.plan(None, &config).unwrap().planned_state;
        let response = resource.create(cloud, &planned).await.unwrap();
        assert!(!response.has_errors(), "{:?}", response.diagnostics);
        response.state.unwrap()
    }

    async fn apply(cloud: &FakeCloud, prior: &Value, config: Value) -> Value {
        let planned = MYSQL.plan(Some(prior), &config).unwrap().planned_state;
        let response = MYSQL.update(cloud, prior, &planned).await.unwrap();
        assert!(!response.has_errors(), "{:?}", response.diagnostics);
        response.state.unwrap()
    }

    #[test]
    fn test_type_names() {
        assert_eq!(MYSQL.type_name(), "linode_database_mysql_v2");
        assert_eq!(
            DatabaseResource::new(EngineType::Postgresql).type_name(),
            "linode_database_postgresql_v2"
        );
    }

    #[test]
    fn test_create_plan_fills_defaults_and_unknowns() {
        let result = MYSQL.plan(None, &basic_config()).unwrap();
        let planned = &result.planned_state;
        assert_eq!(planned["cluster_size"], 1);
        assert_eq!(planned["suspended"], false);
        assert_eq!(planned["id"], UNKNOWN_VALUE);
        assert_eq!(planned["allow_list"], UNKNOWN_VALUE);
        assert_eq!(planned["root_password"], UNKNOWN_VALUE);
        assert_eq!(planned["engine_config_mysql_connect_timeout"], UNKNOWN_VALUE);
        assert_eq!(
            planned["engine_config_mysql_innodb_ft_server_stopword_table"],
            Value::Null
        );
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_update_plan_replacement() {
        let prior = json!({
            "id": "12",
            "label": "db",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "mysql/8",
            "engine": "mysql",
            "cluster_size": 1,
            "suspended": false,
            "fork_source": 3,
            "fork_restore_time": "2025-01-01T00:00:00Z"
        });

        let mut same_instant = prior.clone();
        same_instant["fork_restore_time"] = json!("2025-01-01T01:00:00+01:00");
        let result = MYSQL.plan(Some(&prior), &same_instant).unwrap();
        assert!(!result.requires_replace);
        assert!(result.changes.is_empty());

        let mut moved = prior.clone();
        moved["region"] = json!("us-east");
        let result = MYSQL.plan(Some(&prior), &moved).unwrap();
        assert_eq!(result.replace_paths, vec!["region"]);
        assert_eq!(result.planned_state["id"], UNKNOWN_VALUE);

        let mut refork = prior.clone();
        refork["fork_restore_time"] = json!("2025-01-02T00:00:00Z");
        let result = MYSQL.plan(Some(&prior), &refork).unwrap();
        assert_eq!(result.replace_paths, vec!["fork_restore_time"]);

        // fork_source is optional only; the restore time is also computed
        // and falls back to state when left out.
        let mut unforked = prior.clone();
        unforked["fork_source"] = Value::Null;
        let result = MYSQL.plan(Some(&prior), &unforked).unwrap();
        assert_eq!(result.replace_paths, vec!["fork_source"]);

        let mut untimed = prior.clone();
        untimed["fork_restore_time"] = Value::Null;
        let result = MYSQL.plan(Some(&prior), &untimed).unwrap();
        assert!(!result.requires_replace);
        let planned = DatabaseModel::from_state(EngineType::Mysql, &result.planned_state).unwrap();
        assert_eq!(
            planned.fork_restore_time,
            Attr::Known("2025-01-01T00:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn test_update_plan_keeps_prior_computed_values() {
        let prior = json!({
            "id": "12",
            "label": "db",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "mysql/8",
            "engine": "mysql",
            "cluster_size": 1,
            "suspended": false,
            "allow_list": ["10.0.0.1/32"],
            "port": 3306,
            "version": "8.0.35",
            "engine_config_mysql_connect_timeout": 10
        });
        let result = MYSQL
            .plan(Some(&prior), &json!({
                "label": "db-renamed",
                "region": "us-mia",
                "type": "g6-nanode-1",
                "engine_id": "mysql/8"
            }))
            .unwrap();
        let planned = &result.planned_state;
        assert_eq!(planned["id"], "12");
        assert_eq!(planned["port"], 3306);
        assert_eq!(planned["version"], "8.0.35");
        assert_eq!(planned["allow_list"], json!(["10.0.0.1/32"]));
        assert_eq!(planned["engine_config_mysql_connect_timeout"], 10);
        assert_eq!(planned["updated"], UNKNOWN_VALUE);
        let paths: Vec<&str> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert!(paths.contains(&"label"));
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_update_plan_diff() {
        let state = DatabaseModel::from_state(
            EngineType::Mysql,
            &json!({
                "id": "1",
                "label": "a",
                "engine": "mysql",
                "engine_id": "mysql/8",
                "type": "g6-nanode-1",
                "cluster_size": 1,
                "allow_list": [],
                "engine_config_mysql_connect_timeout": 10
            }),
        )
        .unwrap();

        let unchanged = UpdatePlan::diff(EngineType::Mysql, &state, &state).unwrap();
        assert!(unchanged.is_empty());

        let mut plan = state.clone();
        plan.node_type = Attr::Known("g6-standard-1".to_string());
        plan.allow_list = Attr::Unknown;
        let resize = UpdatePlan::diff(EngineType::Mysql, &state, &plan).unwrap();
        assert!(resize.resize && !resize.update);
        assert_eq!(resize.spec.node_type.as_deref(), Some("g6-standard-1"));
        assert_eq!(resize.spec.allow_list, None);

        let mut plan = state.clone();
        plan.engine_config
            .set("engine_config_mysql_connect_timeout", Attr::Known(json!(20)));
        plan.private_network = Attr::Known(PrivateNetwork {
            vpc_id: 5,
            subnet_id: 6,
            public_access: false,
        });
        plan.engine_id = Attr::Known("mysql/9".to_string());
        let update = UpdatePlan::diff(EngineType::Mysql, &state, &plan).unwrap();
        assert!(update.update && !update.resize);
        assert_eq!(update.spec.version.as_deref(), Some("9"));
        assert_eq!(
            update.spec.engine_config.as_ref().unwrap()["mysql"]["connect_timeout"],
            20
        );
        assert!(matches!(update.spec.private_network, Some(Some(_))));

        let mut detached = plan.clone();
        detached.private_network = Attr::Null;
        let detach = UpdatePlan::diff(EngineType::Mysql, &plan, &detached).unwrap();
        assert_eq!(detach.spec.private_network, Some(None));
    }

    #[test]
    fn test_engine_family_change_is_rejected() {
        let state = DatabaseModel::from_state(
            EngineType::Mysql,
            &json!({"id": "1", "engine": "mysql", "engine_id": "mysql/8"}),
        )
        .unwrap();
        let mut plan = state.clone();
        plan.engine_id = Attr::Known("postgresql/16".to_string());
        let err = UpdatePlan::diff(EngineType::Mysql, &state, &plan).unwrap_err();
        assert!(matches!(err, ProviderError::SchemaConsistency(_)));
    }

    #[tokio::test]
    async fn test_create_basic() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;

        assert_eq!(state["cluster_size"], 1);
        assert_eq!(state["encrypted"], true);
        assert_eq!(state["engine"], "mysql");
        assert_eq!(state["engine_id"], "mysql/8");
        assert_eq!(state["status"], "active");
        assert_eq!(state["allow_list"], json!([]));
        assert!(!state["host_primary"].as_str().unwrap().is_empty());
        assert!(!state["root_username"].as_str().unwrap().is_empty());
        assert!(!state["root_password"].as_str().unwrap().is_empty());
        assert_eq!(state["suspended"], false);
        assert!(state["engine_config_mysql_connect_timeout"].is_number());
        assert!(state["engine_config_mysql_innodb_ft_server_stopword_table"].is_null());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_engine_version() {
        let cloud = FakeCloud::new();
        let mut config = basic_config();
        config["engine_id"] = json!("mysql/5");
        let planned = MYSQL.plan(None, &config).unwrap().planned_state;
        let err = MYSQL.create(&cloud, &planned).await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert!(err.to_string().contains("mysql/5"));
        assert_eq!(cloud.calls_matching("create_database"), 0);
    }

    #[tokio::test]
    async fn test_create_with_updates_and_suspension() {
        let cloud = FakeCloud::new();
        let mut config = basic_config();
        config["updates"] = json!({"day_of_week": 3, "duration": 4, "hour_of_day": 2});
        config["suspended"] = json!(true);
        let state = create(&cloud, MYSQL, config).await;

        assert_eq!(
            state["updates"],
            json!({"day_of_week": 3, "duration": 4, "frequency": "weekly", "hour_of_day": 2})
        );
        assert_eq!(state["status"], "suspended");
        assert!(state["ca_cert"].is_null());
        assert!(state["root_password"].is_null());
    }

    #[tokio::test]
    async fn test_create_poll_failure_keeps_id() {
        let cloud = FakeCloud::new();
        cloud.fail_next_create_event();
        let planned = MYSQL.plan(None, &basic_config()).unwrap().planned_state;
        let response = MYSQL.create(&cloud, &planned).await.unwrap();

        assert!(response.has_errors());
        let state = response.state.unwrap();
        assert!(state["id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(!state.to_string().contains(UNKNOWN_VALUE));
    }

    #[test]
    fn test_deadline_after_saturates() {
        assert!(deadline_after(Duration::MAX) > Instant::now());
        assert_eq!(remaining(deadline_after(Duration::ZERO)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_create_is_bounded_by_its_timeout() {
        let cloud = FakeCloud::new();
        cloud.set_latency(Duration::from_millis(60));
        let mut config = basic_config();
        config["suspended"] = json!(true);
        config["timeouts"] = json!({"create": "150ms"});
        let planned = MYSQL.plan(None, &config).unwrap().planned_state;

        let response = MYSQL.create(&cloud, &planned).await.unwrap();
        assert!(response.has_errors());
        assert_eq!(response.diagnostics[0].summary, "Timed out");
        assert_eq!(response.state.unwrap()["id"], "1000");
        assert_eq!(cloud.calls_matching("create_database"), 1);
    }

    #[tokio::test]
    async fn test_update_is_bounded_by_its_timeout() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;
        cloud.set_latency(Duration::from_millis(60));

        let mut config = basic_config();
        config["label"] = json!("renamed");
        config["suspended"] = json!(true);
        config["timeouts"] = json!({"update": "100ms"});
        let planned = MYSQL.plan(Some(&state), &config).unwrap().planned_state;

        let response = MYSQL.update(&cloud, &state, &planned).await.unwrap();
        assert!(response.has_errors());
        assert_eq!(response.diagnostics[0].summary, "Timed out");
        assert_eq!(response.state, Some(state));
    }

    #[tokio::test]
    async fn test_failed_update_event_keeps_prior_state() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;
        cloud.fail_next_update_event();

        let mut config = basic_config();
        config["label"] = json!("renamed");
        let planned = MYSQL.plan(Some(&state), &config).unwrap().planned_state;

        let response = MYSQL.update(&cloud, &state, &planned).await.unwrap();
        assert!(response.has_errors());
        let detail = response.diagnostics[0].detail.clone().unwrap_or_default();
        assert!(detail.contains("database_update"), "{detail}");
        assert!(detail.contains("simulated failure"), "{detail}");
        assert_eq!(response.state, Some(state));
        assert_eq!(cloud.calls_matching("update_database"), 1);
    }

    #[tokio::test]
    async fn test_resize() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;

        let mut config = basic_config();
        config["type"] = json!("g6-standard-1");
        let before = cloud.calls_matching("update_database");
        let updated = apply(&cloud, &state, config).await;

        assert_eq!(cloud.calls_matching("update_database") - before, 1);
        assert_eq!(updated["type"], "g6-standard-1");
        assert_eq!(updated["id"], state["id"]);
        assert_eq!(updated["created"], state["created"]);
        assert_eq!(updated["root_username"], state["root_username"]);
    }

    #[tokio::test]
    async fn test_complex_update() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;

        let mut config = basic_config();
        config["cluster_size"] = json!(3);
        config["allow_list"] = json!(["10.0.0.4/32"]);
        config["updates"] =
            json!({"hour_of_day": 2, "day_of_week": 3, "duration": 4, "frequency": "weekly"});
        let updated = apply(&cloud, &state, config).await;

        assert_eq!(updated["cluster_size"], 3);
        assert_eq!(updated["allow_list"], json!(["10.0.0.4/32"]));
        assert_eq!(updated["updates"]["hour_of_day"], 2);
        assert_eq!(updated["pending_updates"], json!([]));
    }

    #[tokio::test]
    async fn test_unchanged_plan_is_idempotent() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;

        let result = MYSQL.plan(Some(&state), &basic_config()).unwrap();
        assert!(result.changes.is_empty(), "{:?}", result.changes);

        let read = MYSQL.read(&cloud, &state).await.unwrap().state.unwrap();
        assert_eq!(read, state);
        let reread = MYSQL.read(&cloud, &read).await.unwrap().state.unwrap();
        assert_eq!(reread, read);
    }

    #[tokio::test]
    async fn test_engine_config_change_sends_whole_config() {
        let cloud = FakeCloud::new();
        let mut config = basic_config();
        config["engine_config_mysql_connect_timeout"] = json!(20);
        config["engine_config_mysql_innodb_ft_server_stopword_table"] = json!("db/stopwords");
        let state = create(&cloud, MYSQL, config.clone()).await;
        assert_eq!(state["engine_config_mysql_connect_timeout"], 20);

        config["engine_config_mysql_wait_timeout"] = json!(300);
        config
            .as_object_mut()
            .unwrap()
            .remove("engine_config_mysql_innodb_ft_server_stopword_table");
        let updated = apply(&cloud, &state, config).await;

        assert_eq!(updated["engine_config_mysql_wait_timeout"], 300);
        assert_eq!(updated["engine_config_mysql_connect_timeout"], 20);
        assert!(updated["engine_config_mysql_innodb_ft_server_stopword_table"].is_null());
    }

    #[tokio::test]
    async fn test_fork() {
        let cloud = FakeCloud::new();
        let mut source_config = basic_config();
        source_config["label"] = json!("L");
        let source = create(&cloud, MYSQL, source_config).await;
        let restore_time = source["oldest_restore_time"].as_str().unwrap().to_string();

        let mut fork_config = basic_config();
        fork_config["label"] = json!("L-fork");
        fork_config["fork_source"] = json!(source["id"].as_str().unwrap().parse::<i64>().unwrap());
        fork_config["fork_restore_time"] = json!(restore_time);
        let fork = create(&cloud, MYSQL, fork_config).await;

        assert_eq!(fork["status"], "active");
        assert_eq!(
            fork["fork_source"],
            json!(source["id"].as_str().unwrap().parse::<i64>().unwrap())
        );
    }

    #[tokio::test]
    async fn test_suspension_round_trip() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;

        let mut suspend = basic_config();
        suspend["suspended"] = json!(true);
        let suspended = apply(&cloud, &state, suspend.clone()).await;
        assert_eq!(suspended["status"], "suspended");
        assert!(suspended["ca_cert"].is_null());
        assert!(suspended["root_password"].is_null());
        assert!(suspended["root_username"].is_null());

        let resumed = apply(&cloud, &suspended, basic_config()).await;
        assert_eq!(resumed["status"], "active");
        assert!(!resumed["ca_cert"].as_str().unwrap().is_empty());
        assert!(!resumed["root_password"].as_str().unwrap().is_empty());

        let again = apply(&cloud, &resumed, suspend).await;
        assert_eq!(again["status"], "suspended");
    }

    #[tokio::test]
    async fn test_read_removes_missing_database() {
        let cloud = FakeCloud::new();
        let response = MYSQL
            .read(&cloud, &json!({"id": "404", "label": "gone"}))
            .await
            .unwrap();
        assert!(response.state.is_none());
        assert!(!response.has_errors());
        assert_eq!(response.diagnostics.len(), 1);

        let response = MYSQL.read(&cloud, &json!({"id": ""})).await.unwrap();
        assert!(response.state.is_none());
    }

    #[tokio::test]
    async fn test_delete_waits_until_absent() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;
        MYSQL.delete(&cloud, &state).await.unwrap();

        let id: i64 = state["id"].as_str().unwrap().parse().unwrap();
        assert!(cloud
            .get_database(EngineType::Mysql, id)
            .await
            .unwrap_err()
            .is_not_found());

        // Deleting again is not an error.
        MYSQL.delete(&cloud, &state).await.unwrap();
    }

    #[tokio::test]
    async fn test_import() {
        let cloud = FakeCloud::new();
        let state = create(&cloud, MYSQL, basic_config()).await;
        let imported = MYSQL
            .import(&cloud, state["id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(imported["label"], "tf_test_basic");
        assert_eq!(imported["engine_id"], "mysql/8");

        let err = MYSQL.import(&cloud, "abc").await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_postgresql_lifecycle() {
        let cloud = FakeCloud::new();
        let pg = DatabaseResource::new(EngineType::Postgresql);
        let config = json!({
            "label": "pg",
            "region": "us-mia",
            "type": "g6-nanode-1",
            "engine_id": "postgresql/16",
            "engine_config_work_mem": 4,
            "private_network": {"vpc_id": 10, "subnet_id": 20}
        });
        let state = create(&cloud, pg, config).await;

        assert_eq!(state["engine"], "postgresql");
        assert_eq!(state["engine_config_work_mem"], 4);
        assert_eq!(
            state["private_network"],
            json!({"vpc_id": 10, "subnet_id": 20, "public_access": false})
        );
        pg.delete(&cloud, &state).await.unwrap();
    }
}

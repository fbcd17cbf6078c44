//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through the same plan and
//! apply sequences a host performs. [`FakeCloud`] is an in-memory
//! [`CloudClient`] that simulates event emission, status transitions,
//! suspension-gated TLS and credential endpoints and server-side tunable
//! defaults, and records every call it receives.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use linode_database_provider::provider::LinodeProvider;
//! use linode_database_provider::testing::{FakeCloud, ProviderTester};
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_database() {
//!     let cloud = FakeCloud::new();
//!     let tester = ProviderTester::new(LinodeProvider::with_client(Arc::new(cloud.clone())));
//!
//!     let state = tester
//!         .lifecycle_create("linode_database_mysql_v2", json!({
//!             "label": "db",
//!             "region": "us-mia",
//!             "type": "g6-nanode-1",
//!             "engine_id": "mysql/8"
//!         }))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state["status"], "active");
//!     assert_eq!(cloud.calls_matching("create_database"), 1);
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::client::types::{
    action, status, DatabaseFork, DatabaseHosts, EventEntity, MaintenanceWindow,
};
use crate::client::{
    ApiResult, CloudClient, CreateSpec, Database, DatabaseCredentials, DatabaseEngine,
    DatabaseSsl, EngineType, Event, EventFilter, UpdateSpec,
};
use crate::database::slug::parse_engine_slug;
use crate::error::{ApiError, ProviderError};
use crate::poller::ENTITY_DATABASE;
use crate::provider::ProviderService;
use crate::schema::Diagnostic;
use crate::types::{PlanResult, ResourceResponse};

/// Runs a provider through the host's plan and apply sequences.
///
/// Single requests go straight to the wrapped provider through `Deref`.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> Deref for ProviderTester<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.provider
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Plan against no prior state, with the config as proposed state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan `config` against an existing state.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan, apply and refresh a new resource. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.provider.create(resource_type, plan.planned_state).await?;
        self.refresh(resource_type, expect_state(created)?).await
    }

    /// Plan, apply and refresh a change to `prior_state`.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .provider
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.refresh(resource_type, expect_state(updated)?).await
    }

    /// Plan the destroy, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, state: Value) -> Result<(), TestError> {
        self.provider
            .plan(resource_type, Some(state.clone()), Value::Null, Value::Null)
            .await?;
        self.provider.delete(resource_type, state).await?;
        Ok(())
    }

    /// Create with `initial`, update to `updated`, then delete.
    ///
    /// Returns the state the update left behind.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial).await?;
        let state = self.lifecycle_update(resource_type, created, updated).await?;
        self.lifecycle_delete(resource_type, state.clone()).await?;
        Ok(state)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, TestError> {
        expect_state(self.provider.read(resource_type, state).await?)
    }
}

/// Why a tester sequence stopped.
#[derive(Debug)]
pub enum TestError {
    /// A response carried error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// A read dropped the resource from state.
    Removed(Vec<Diagnostic>),
    /// A request failed outright.
    Provider(ProviderError),
}

fn write_diagnostics(f: &mut fmt::Formatter<'_>, diagnostics: &[Diagnostic]) -> fmt::Result {
    for diag in diagnostics {
        write!(f, "\n  [{:?}] {}", diag.severity, diag.summary)?;
        if let Some(detail) = &diag.detail {
            write!(f, ": {detail}")?;
        }
        if let Some(attribute) = &diag.attribute {
            write!(f, " (at {attribute})")?;
        }
    }
    Ok(())
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                write!(f, "{} error diagnostic(s):", diags.len())?;
                write_diagnostics(f, diags)
            }
            TestError::Removed(diags) => {
                write!(f, "resource was removed from state")?;
                write_diagnostics(f, diags)
            }
            TestError::Provider(e) => write!(f, "provider error: {e}"),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// The state of a successful response.
///
/// Error diagnostics and removals become [`TestError`]s.
pub fn expect_state(response: ResourceResponse) -> Result<Value, TestError> {
    if response.has_errors() {
        let errors = response.diagnostics.into_iter().filter(Diagnostic::is_error).collect();
        return Err(TestError::Diagnostics(errors));
    }
    response
        .state
        .ok_or(TestError::Removed(response.diagnostics))
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

fn errors(diagnostics: &[Diagnostic]) -> impl Iterator<Item = &Diagnostic> {
    diagnostics.iter().filter(|d| d.is_error())
}

/// Panics unless the plan has changes and keeps the resource.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "plan has no changes");
    assert!(
        !plan.requires_replace,
        "plan replaces {:?}",
        plan.replace_paths
    );
}

/// Panics if the plan changes anything.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "plan changes {:?}",
        changed_paths(plan)
    );
}

/// Panics unless the plan replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "plan updates {:?} in place",
        changed_paths(plan)
    );
}

/// Panics if the plan replaces the resource.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "plan replaces {:?}",
        plan.replace_paths
    );
}

/// Panics unless `path` is among the planned changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(paths.contains(&path), "'{path}' not among changes {paths:?}");
}

/// Panics if `path` is among the planned changes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !changed_paths(plan).contains(&path),
        "plan changes '{path}'"
    );
}

/// Panics on any error diagnostic.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let summaries: Vec<_> = errors(diagnostics).map(|d| &d.summary).collect();
    assert!(summaries.is_empty(), "Expected no errors, got {summaries:?}");
}

/// Panics without an error diagnostic.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(errors(diagnostics).next().is_some(), "no error diagnostics");
}

/// Panics unless an error's summary or detail contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let found = errors(diagnostics).any(|d| {
        d.summary.contains(needle) || d.detail.as_deref().is_some_and(|s| s.contains(needle))
    });
    assert!(
        found,
        "no error mentions '{needle}': {:?}",
        errors(diagnostics)
            .map(|d| (&d.summary, &d.detail))
            .collect::<Vec<_>>()
    );
}

// In-memory cloud

const EVENT_FINISHED: &str = "finished";
const EVENT_FAILED: &str = "failed";

/// Timestamp used for every creation and update time; reads are
/// reproducible.
const FIXED_TIME: i64 = 1_735_689_600;

fn fixed_time() -> DateTime<Utc> {
    DateTime::from_timestamp(FIXED_TIME, 0).unwrap_or_default()
}

/// Engine versions the fake offers.
fn offered_engines() -> Vec<DatabaseEngine> {
    [
        ("mysql/8", "mysql", "8.0.35"),
        ("postgresql/14", "postgresql", "14.13"),
        ("postgresql/16", "postgresql", "16.4"),
    ]
    .into_iter()
    .map(|(id, engine, version)| DatabaseEngine {
        id: id.to_string(),
        engine: engine.to_string(),
        version: version.to_string(),
    })
    .collect()
}

/// Tunables the remote fills in when the create request leaves them out.
fn default_engine_config(engine: EngineType) -> Value {
    match engine {
        EngineType::Mysql => serde_json::json!({
            "binlog_retention_period": 3600,
            "mysql": {"connect_timeout": 10, "wait_timeout": 28800}
        }),
        EngineType::Postgresql => serde_json::json!({
            "pg": {"autovacuum_max_workers": 3, "autovacuum_naptime": 60}
        }),
    }
}

/// Apply an `engine_config` patch; explicit nulls remove a value.
fn merge_config(target: &mut Value, patch: &Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let (Value::Object(target), Value::Object(patch)) = (target, patch) else {
        return;
    };
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(_) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                merge_config(slot, value);
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

fn members(id: i64, cluster_size: i64) -> BTreeMap<String, String> {
    (0..cluster_size)
        .map(|n| {
            let role = if n == 0 { "primary" } else { "failover" };
            (format!("172.16.{}.{}", id % 250, n + 1), role.to_string())
        })
        .collect()
}

fn hosts(id: i64, cluster_size: i64) -> DatabaseHosts {
    DatabaseHosts {
        primary: format!("a{id}-akamai-prod-1.g2a.akamaidb.net"),
        secondary: if cluster_size > 1 {
            format!("replica-a{id}-akamai-prod-1.g2a.akamaidb.net")
        } else {
            String::new()
        },
    }
}

fn default_window() -> MaintenanceWindow {
    MaintenanceWindow {
        day_of_week: 1,
        duration: 3,
        frequency: "weekly".to_string(),
        hour_of_day: 0,
        pending: Vec::new(),
    }
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: i64,
    next_event_id: i64,
    databases: BTreeMap<i64, (EngineType, Database)>,
    events: Vec<Event>,
    calls: Vec<String>,
    fail_next_create_event: bool,
    fail_next_update_event: bool,
    latency: Duration,
}

impl FakeState {
    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn push_event(&mut self, db_id: i64, action: &str, event_status: &str) {
        self.next_event_id += 1;
        self.events.push(Event {
            id: self.next_event_id,
            action: action.to_string(),
            created: Utc::now(),
            status: event_status.to_string(),
            entity: Some(EventEntity {
                id: Some(db_id),
                kind: ENTITY_DATABASE.to_string(),
                label: None,
            }),
            percent_complete: Some(if event_status == EVENT_FINISHED { 100 } else { 0 }),
            message: (event_status == EVENT_FAILED).then(|| "simulated failure".to_string()),
        });
    }

    fn database_mut(&mut self, engine: EngineType, id: i64) -> ApiResult<&mut Database> {
        match self.databases.get_mut(&id) {
            Some((kind, db)) if *kind == engine => Ok(db),
            _ => Err(ApiError::not_found(format!("Not found: {engine} database {id}"))),
        }
    }
}

/// In-memory [`CloudClient`].
///
/// Databases are created in `provisioning` status and report a finished
/// `database_create` event immediately. Transitional statuses
/// (`provisioning`, `suspending`, `resuming`) settle after being read once.
/// TLS and credential requests fail while a database is suspended. Updates
/// emit `database_update` and `database_resize` events depending on the
/// fields they touch. Either event can be made to fail, and reads can be
/// slowed down. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeCloud {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeCloud {
    /// An empty cloud. Database ids start at 1000.
    pub fn new() -> Self {
        let cloud = Self::default();
        cloud.state().next_id = 1000;
        cloud
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call received so far, e.g. `update_database mysql 1001`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of recorded calls containing `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.contains(pattern))
            .count()
    }

    /// Report the next database's create event as failed.
    pub fn fail_next_create_event(&self) {
        self.state().fail_next_create_event = true;
    }

    /// Report the next `database_update` event as failed.
    pub fn fail_next_update_event(&self) {
        self.state().fail_next_update_event = true;
    }

    /// Delay every database read and event listing by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    async fn lag(&self) {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Append an event for database `db_id`.
    pub fn push_event(&self, db_id: i64, action: &str, event_status: &str) {
        self.state().push_event(db_id, action, event_status);
    }

    /// Drop database `id` without a delete call, as if removed elsewhere.
    pub fn remove_database(&self, id: i64) {
        self.state().databases.remove(&id);
    }

    /// Force the status of database `id`.
    pub fn set_status(&self, id: i64, new_status: &str) {
        if let Some((_, db)) = self.state().databases.get_mut(&id) {
            db.status = new_status.to_string();
        }
    }
}

#[async_trait]
impl CloudClient for FakeCloud {
    async fn get_database(&self, engine: EngineType, id: i64) -> ApiResult<Database> {
        self.lag().await;
        let mut state = self.state();
        state.record(format!("get_database {engine} {id}"));
        let db = state.database_mut(engine, id)?;
        let observed = db.clone();
        let settled = match db.status.as_str() {
            status::PROVISIONING | status::RESUMING => Some(status::ACTIVE),
            status::SUSPENDING => Some(status::SUSPENDED),
            _ => None,
        };
        if let Some(next) = settled {
            db.status = next.to_string();
        }
        Ok(observed)
    }

    async fn create_database(&self, engine: EngineType, spec: &CreateSpec) -> ApiResult<Database> {
        let mut state = self.state();
        state.record(format!("create_database {engine} {}", spec.label));

        let (family, major) = parse_engine_slug(&spec.engine)
            .map_err(|err| ApiError::from_status(400, err.message().to_string()))?;
        if family != engine.as_str() {
            return Err(ApiError::from_status(
                400,
                format!("engine {} is not a {engine} engine", spec.engine),
            ));
        }
        let version = offered_engines()
            .into_iter()
            .find(|e| e.id == spec.engine)
            .map_or_else(|| major.to_string(), |e| e.version);

        if let Some(DatabaseFork { source, .. }) = &spec.fork {
            if !state.databases.contains_key(source) {
                return Err(ApiError::from_status(
                    400,
                    format!("fork source {source} does not exist"),
                ));
            }
        }

        let mut engine_config = default_engine_config(engine);
        if let Some(patch) = &spec.engine_config {
            merge_config(&mut engine_config, patch);
        }

        let id = state.next_id;
        state.next_id += 1;
        let cluster_size = spec.cluster_size.unwrap_or(1);
        let db = Database {
            id,
            label: spec.label.clone(),
            region: spec.region.clone(),
            node_type: spec.node_type.clone(),
            engine: engine.as_str().to_string(),
            version,
            status: status::PROVISIONING.to_string(),
            cluster_size,
            platform: "rdbms-default".to_string(),
            encrypted: true,
            allow_list: spec.allow_list.clone().unwrap_or_default(),
            port: match engine {
                EngineType::Mysql => 3306,
                EngineType::Postgresql => 5432,
            },
            ssl_connection: true,
            hosts: hosts(id, cluster_size),
            members: members(id, cluster_size),
            created: Some(fixed_time()),
            updated: Some(fixed_time()),
            oldest_restore_time: Some(fixed_time()),
            updates: Some(default_window()),
            fork: spec.fork.clone(),
            private_network: spec.private_network.clone(),
            engine_config,
        };
        state.databases.insert(id, (engine, db.clone()));

        let event_status = if std::mem::take(&mut state.fail_next_create_event) {
            EVENT_FAILED
        } else {
            EVENT_FINISHED
        };
        state.push_event(id, action::DATABASE_CREATE, event_status);
        Ok(db)
    }

    async fn update_database(
        &self,
        engine: EngineType,
        id: i64,
        spec: &UpdateSpec,
    ) -> ApiResult<Database> {
        let mut state = self.state();
        state.record(format!("update_database {engine} {id}"));
        let db = state.database_mut(engine, id)?;

        if let Some(label) = &spec.label {
            db.label = label.clone();
        }
        if let Some(allow_list) = &spec.allow_list {
            db.allow_list = allow_list.clone();
        }
        if let Some(updates) = &spec.updates {
            db.updates = Some(updates.clone());
        }
        if let Some(version) = &spec.version {
            db.version = version.clone();
        }
        if let Some(private_network) = &spec.private_network {
            db.private_network = private_network.clone();
        }
        if let Some(patch) = &spec.engine_config {
            merge_config(&mut db.engine_config, patch);
        }
        if let Some(node_type) = &spec.node_type {
            db.node_type = node_type.clone();
        }
        if let Some(cluster_size) = spec.cluster_size {
            db.cluster_size = cluster_size;
            db.members = members(id, cluster_size);
            db.hosts = hosts(id, cluster_size);
        }
        let updated = db.clone();

        let update = spec.label.is_some()
            || spec.allow_list.is_some()
            || spec.updates.is_some()
            || spec.version.is_some()
            || spec.private_network.is_some()
            || spec.engine_config.is_some();
        let resize = spec.node_type.is_some() || spec.cluster_size.is_some();
        if update {
            let event_status = if std::mem::take(&mut state.fail_next_update_event) {
                EVENT_FAILED
            } else {
                EVENT_FINISHED
            };
            state.push_event(id, action::DATABASE_UPDATE, event_status);
        }
        if resize {
            state.push_event(id, action::DATABASE_RESIZE, EVENT_FINISHED);
        }
        Ok(updated)
    }

    async fn delete_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        let mut state = self.state();
        state.record(format!("delete_database {engine} {id}"));
        state.database_mut(engine, id)?;
        state.databases.remove(&id);
        Ok(())
    }

    async fn get_ssl(&self, engine: EngineType, id: i64) -> ApiResult<DatabaseSsl> {
        let mut state = self.state();
        state.record(format!("get_ssl {engine} {id}"));
        let db = state.database_mut(engine, id)?;
        if db.status == status::SUSPENDED || db.status == status::SUSPENDING {
            return Err(ApiError::from_status(400, "Database is suspended"));
        }
        let pem = format!("-----BEGIN CERTIFICATE-----\nfake-ca-{id}\n-----END CERTIFICATE-----\n");
        Ok(DatabaseSsl {
            ca_certificate: base64::engine::general_purpose::STANDARD.encode(pem),
        })
    }

    async fn get_credentials(
        &self,
        engine: EngineType,
        id: i64,
    ) -> ApiResult<DatabaseCredentials> {
        let mut state = self.state();
        state.record(format!("get_credentials {engine} {id}"));
        let db = state.database_mut(engine, id)?;
        if db.status == status::SUSPENDED || db.status == status::SUSPENDING {
            return Err(ApiError::from_status(400, "Database is suspended"));
        }
        Ok(DatabaseCredentials {
            username: match engine {
                EngineType::Mysql => "linroot".to_string(),
                EngineType::Postgresql => "akmadmin".to_string(),
            },
            password: format!("secret-{id}"),
        })
    }

    async fn suspend_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        let mut state = self.state();
        state.record(format!("suspend_database {engine} {id}"));
        state.database_mut(engine, id)?.status = status::SUSPENDING.to_string();
        Ok(())
    }

    async fn resume_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        let mut state = self.state();
        state.record(format!("resume_database {engine} {id}"));
        state.database_mut(engine, id)?.status = status::RESUMING.to_string();
        Ok(())
    }

    async fn list_engines(&self, engine: Option<EngineType>) -> ApiResult<Vec<DatabaseEngine>> {
        let mut state = self.state();
        state.record("list_engines".to_string());
        Ok(offered_engines()
            .into_iter()
            .filter(|e| engine.map_or(true, |wanted| e.engine == wanted.as_str()))
            .collect())
    }

    async fn list_events(&self, filter: &EventFilter) -> ApiResult<Vec<Event>> {
        self.lag().await;
        let mut state = self.state();
        state.record(format!("list_events {}", filter.action));
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(events)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(1)
    }
}

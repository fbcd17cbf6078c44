//! Blocking waits on account events and database status.
//!
//! An [`EventPoller`] must be built *before* the call that triggers the
//! action it waits for. Construction captures the start of the observation
//! window (backed off by [`CLOCK_SKEW`]) and the ids of matching events that
//! already exist, so that neither a late first poll nor an earlier action on
//! the same entity can be mistaken for the awaited one.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::client::types::{Event, EventFilter};
use crate::client::{ApiResult, CloudClient, EngineType};
use crate::error::{ApiError, ErrorKind};

/// Tolerated difference between the local clock and the remote's.
pub const CLOCK_SKEW: Duration = Duration::from_secs(5);

/// Entity kind of managed databases in the event stream.
pub const ENTITY_DATABASE: &str = "database";

/// Interval used while waiting for a deleted database to disappear.
pub const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(2);

const EVENT_FINISHED: &str = "finished";
const EVENT_FAILED: &str = "failed";

/// Waits for a terminal event of one action on one entity.
pub struct EventPoller<'a, C: CloudClient + ?Sized> {
    client: &'a C,
    entity_kind: String,
    entity_id: Option<i64>,
    action: String,
    since: DateTime<Utc>,
    previous: HashSet<i64>,
}

impl<'a, C: CloudClient + ?Sized> EventPoller<'a, C> {
    /// Start observing `action` on an existing entity.
    pub async fn new(
        client: &'a C,
        entity_kind: &str,
        entity_id: i64,
        action: &str,
    ) -> ApiResult<Self> {
        let mut poller = Self::without_entity(client, entity_kind, action);
        poller.entity_id = Some(entity_id);
        poller.previous = client
            .list_events(&poller.filter())
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        debug!(
            entity_kind,
            entity_id,
            action,
            previous = poller.previous.len(),
            "Event poller started"
        );
        Ok(poller)
    }

    /// Start observing `action` on an entity whose id is not known yet.
    ///
    /// Call [`set_entity_id`](Self::set_entity_id) once the triggering call
    /// returns the id.
    pub fn without_entity(client: &'a C, entity_kind: &str, action: &str) -> Self {
        let skew = chrono::Duration::from_std(CLOCK_SKEW).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            client,
            entity_kind: entity_kind.to_string(),
            entity_id: None,
            action: action.to_string(),
            since: Utc::now() - skew,
            previous: HashSet::new(),
        }
    }

    /// Bind the poller to the entity created by the triggering call.
    pub fn set_entity_id(&mut self, id: i64) {
        self.entity_id = Some(id);
    }

    /// Start of the observation window.
    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    fn filter(&self) -> EventFilter {
        EventFilter {
            entity_kind: self.entity_kind.clone(),
            entity_id: self.entity_id,
            action: self.action.clone(),
            since: self.since,
        }
    }

    /// Block until a matching event finishes or fails, or `timeout` elapses.
    pub async fn wait_for_finished(&self, timeout: Duration) -> ApiResult<Event> {
        let Some(entity_id) = self.entity_id else {
            return Err(ApiError::new(
                ErrorKind::Other,
                format!("event poller for {} has no entity id", self.action),
            ));
        };
        let filter = self.filter();
        let interval = self.client.poll_interval();

        let wait = async {
            loop {
                let events = self.client.list_events(&filter).await?;
                for event in events
                    .into_iter()
                    .filter(|e| filter.matches(e) && !self.previous.contains(&e.id))
                {
                    trace!(event_id = event.id, status = %event.status, "Observed event");
                    match event.status.as_str() {
                        EVENT_FINISHED => return Ok(event),
                        EVENT_FAILED => {
                            return Err(ApiError::new(
                                ErrorKind::ActionFailed,
                                format!(
                                    "{} event {} for {} {} failed: {}",
                                    event.action,
                                    event.id,
                                    self.entity_kind,
                                    entity_id,
                                    event.message.as_deref().unwrap_or("no details")
                                ),
                            ))
                        }
                        _ => {}
                    }
                }
                tokio::time::sleep(interval).await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::deadline_exceeded(format!(
                "timed out after {:?} waiting for {} on {} {}",
                timeout, self.action, self.entity_kind, entity_id
            ))),
        }
    }
}

/// Block until the database reports `desired` status, or `timeout` elapses.
pub async fn wait_for_status<C: CloudClient + ?Sized>(
    client: &C,
    engine: EngineType,
    id: i64,
    desired: &str,
    timeout: Duration,
) -> ApiResult<()> {
    let interval = client.poll_interval();
    let wait = async {
        loop {
            let db = client.get_database(engine, id).await?;
            if db.status == desired {
                return Ok(());
            }
            trace!(database_id = id, status = %db.status, desired, "Waiting for status");
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::deadline_exceeded(format!(
            "timed out after {timeout:?} waiting for {engine} database {id} to become {desired}"
        ))),
    }
}

/// Poll `condition` every `interval` until it yields `true`, or `timeout` elapses.
pub async fn wait_for_condition<F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut condition: F,
) -> ApiResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<bool>>,
{
    let wait = async {
        loop {
            if condition().await? {
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::deadline_exceeded(format!(
            "condition not met within {timeout:?}"
        ))),
    }
}

//! Drives a database into its desired suspension state.

use std::time::Duration;

use tracing::{debug, info};

use crate::client::types::status;
use crate::client::{ApiResult, CloudClient, EngineType};
use crate::error::ApiError;
use crate::poller::wait_for_status;

/// What reconciling suspension requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionAction {
    /// Already in the desired state.
    None,
    /// Suspend, then wait for `suspended`.
    Suspend,
    /// Resume, then wait for `active`.
    Resume,
}

impl SuspensionAction {
    /// Decide the transition from `observed` to `desired`.
    pub fn plan(observed: bool, desired: bool) -> Self {
        match (observed, desired) {
            (false, true) => Self::Suspend,
            (true, false) => Self::Resume,
            _ => Self::None,
        }
    }

    /// The status the database settles in once the action completes.
    pub fn target_status(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Suspend => Some(status::SUSPENDED),
            Self::Resume => Some(status::ACTIVE),
        }
    }
}

/// Suspend or resume database `id` so that its suspension matches `desired`,
/// waiting up to `timeout` for the target status.
pub async fn reconcile_suspension<C: CloudClient + ?Sized>(
    client: &C,
    engine: EngineType,
    id: i64,
    observed: bool,
    desired: bool,
    timeout: Duration,
) -> ApiResult<SuspensionAction> {
    let action = SuspensionAction::plan(observed, desired);
    let Some(target) = action.target_status() else {
        debug!(database_id = id, suspended = observed, "Suspension already reconciled");
        return Ok(action);
    };

    info!(database_id = id, %engine, ?action, "Reconciling database suspension");
    let result = match action {
        SuspensionAction::Suspend => client.suspend_database(engine, id).await,
        _ => client.resume_database(engine, id).await,
    };
    result.map_err(|err| {
        ApiError {
            message: format!("failed to reconcile suspension of database {id}: {}", err.message),
            ..err
        }
    })?;

    wait_for_status(client, engine, id, target, timeout).await?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::CreateSpec;
    use crate::testing::FakeCloud;

    #[test]
    fn test_plan_table() {
        assert_eq!(SuspensionAction::plan(false, false), SuspensionAction::None);
        assert_eq!(SuspensionAction::plan(true, true), SuspensionAction::None);
        assert_eq!(SuspensionAction::plan(false, true), SuspensionAction::Suspend);
        assert_eq!(SuspensionAction::plan(true, false), SuspensionAction::Resume);
        assert_eq!(SuspensionAction::None.target_status(), None);
        assert_eq!(SuspensionAction::Resume.target_status(), Some("active"));
    }

    #[tokio::test]
    async fn test_suspend_and_resume() {
        let cloud = FakeCloud::new();
        let db = cloud
            .create_database(
                EngineType::Postgresql,
                &CreateSpec {
                    label: "pg".to_string(),
                    region: "us-mia".to_string(),
                    node_type: "g6-nanode-1".to_string(),
                    engine: "postgresql/16".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let timeout = Duration::from_secs(5);

        let action =
            reconcile_suspension(&cloud, EngineType::Postgresql, db.id, false, true, timeout)
                .await
                .unwrap();
        assert_eq!(action, SuspensionAction::Suspend);
        let current = cloud.get_database(EngineType::Postgresql, db.id).await.unwrap();
        assert_eq!(current.status, "suspended");

        let action =
            reconcile_suspension(&cloud, EngineType::Postgresql, db.id, true, true, timeout)
                .await
                .unwrap();
        assert_eq!(action, SuspensionAction::None);

        reconcile_suspension(&cloud, EngineType::Postgresql, db.id, true, false, timeout)
            .await
            .unwrap();
        let current = cloud.get_database(EngineType::Postgresql, db.id).await.unwrap();
        assert_eq!(current.status, "active");
        assert_eq!(cloud.calls_matching("suspend"), 1);
        assert_eq!(cloud.calls_matching("resume"), 1);
    }

    #[tokio::test]
    async fn test_missing_database_is_not_found() {
        let cloud = FakeCloud::new();
        let err = reconcile_suspension(
            &cloud,
            EngineType::Mysql,
            999,
            false,
            true,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}

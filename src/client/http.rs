//! reqwest-backed [`CloudClient`] for the Linode REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{
    CreateSpec, Database, DatabaseCredentials, DatabaseEngine, DatabaseSsl, EngineType, Event,
    EventFilter, Page, UpdateSpec,
};
use super::{ApiResult, CloudClient};
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind, ProviderError};

/// Decides whether a failed response is worth another attempt.
///
/// Receives the request method, the path relative to the API root and the
/// response status.
pub type RetryCondition = fn(&Method, &str, StatusCode) -> bool;

/// The remote briefly answers database reads with 502 during failover.
pub fn database_read_bad_gateway(method: &Method, path: &str, status: StatusCode) -> bool {
    method == Method::GET && path.starts_with("/databases/") && status == StatusCode::BAD_GATEWAY
}

/// Instance IP listings intermittently fail with 500.
pub fn instance_ips_server_error(_method: &Method, path: &str, status: StatusCode) -> bool {
    if status != StatusCode::INTERNAL_SERVER_ERROR {
        return false;
    }
    let Some(rest) = path.strip_prefix("/linode/instances/") else {
        return false;
    };
    let mut segments = rest.split('/');
    let id = segments.next().unwrap_or_default();
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && segments.next() == Some("ips")
}

/// Rate limiting.
pub fn too_many_requests(_method: &Method, _path: &str, status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    reason: String,
    #[serde(default)]
    field: Option<String>,
}

/// Linode REST client.
pub struct LinodeClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
    retry_conditions: Vec<RetryCondition>,
}

impl LinodeClient {
    /// Build a client from resolved settings.
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let token = config.token.clone().unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config,
            token,
            retry_conditions: vec![
                database_read_bad_gateway,
                instance_ips_server_error,
                too_many_requests,
            ],
        })
    }

    /// Register an additional retry condition.
    pub fn add_retry_condition(&mut self, condition: RetryCondition) {
        self.retry_conditions.push(condition);
    }

    /// The settings the client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn should_retry(&self, method: &Method, path: &str, status: StatusCode) -> bool {
        self.retry_conditions
            .iter()
            .any(|condition| condition(method, path, status))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.config
            .min_retry_delay
            .saturating_mul(factor)
            .min(self.config.max_retry_delay)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        filter: Option<&serde_json::Value>,
    ) -> ApiResult<reqwest::Response> {
        let url = format!("{}{}", self.config.api_root(), path);
        let mut attempt = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(filter) = filter {
                request = request.header("X-Filter", filter.to_string());
            }

            debug!(%method, path, attempt, "Sending request");
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if attempt < self.config.max_retries && self.should_retry(&method, path, status) {
                let delay = self.backoff(attempt);
                warn!(%method, path, status = status.as_u16(), ?delay, "Retrying request");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(error_from_response(response).await);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send::<()>(Method::GET, path, None, None).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self.send(method, path, Some(body), None).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, method: Method, path: &str) -> ApiResult<()> {
        self.send::<()>(method, path, None, None).await?;
        Ok(())
    }
}

async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let reasons = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| {
            body.errors
                .into_iter()
                .map(|e| match e.field {
                    Some(field) => format!("{field}: {}", e.reason),
                    None => e.reason,
                })
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();

    let message = if reasons.is_empty() {
        format!("[{}] {}", status.as_u16(), status.canonical_reason().unwrap_or("error"))
    } else {
        format!("[{}] {}", status.as_u16(), reasons)
    };
    ApiError::from_status(status.as_u16(), message)
}

fn instance_path(engine: EngineType, id: i64) -> String {
    format!("/databases/{}/instances/{}", engine.as_str(), id)
}

#[async_trait]
impl CloudClient for LinodeClient {
    async fn get_database(&self, engine: EngineType, id: i64) -> ApiResult<Database> {
        self.get_json(&instance_path(engine, id)).await
    }

    async fn create_database(&self, engine: EngineType, spec: &CreateSpec) -> ApiResult<Database> {
        let path = format!("/databases/{}/instances", engine.as_str());
        self.send_json(Method::POST, &path, spec).await
    }

    async fn update_database(
        &self,
        engine: EngineType,
        id: i64,
        spec: &UpdateSpec,
    ) -> ApiResult<Database> {
        self.send_json(Method::PUT, &instance_path(engine, id), spec)
            .await
    }

    async fn delete_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        self.send_empty(Method::DELETE, &instance_path(engine, id))
            .await
    }

    async fn get_ssl(&self, engine: EngineType, id: i64) -> ApiResult<DatabaseSsl> {
        self.get_json(&format!("{}/ssl", instance_path(engine, id)))
            .await
    }

    async fn get_credentials(
        &self,
        engine: EngineType,
        id: i64,
    ) -> ApiResult<DatabaseCredentials> {
        self.get_json(&format!("{}/credentials", instance_path(engine, id)))
            .await
    }

    async fn suspend_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        self.send_empty(Method::POST, &format!("{}/suspend", instance_path(engine, id)))
            .await
    }

    async fn resume_database(&self, engine: EngineType, id: i64) -> ApiResult<()> {
        self.send_empty(Method::POST, &format!("{}/resume", instance_path(engine, id)))
            .await
    }

    async fn list_engines(&self, engine: Option<EngineType>) -> ApiResult<Vec<DatabaseEngine>> {
        let filter = engine.map(|e| serde_json::json!({ "engine": e.as_str() }));
        let mut engines = Vec::new();
        let mut page = 1;

        loop {
            let path = format!("/databases/engines?page={page}");
            let response = self
                .send::<()>(Method::GET, &path, None, filter.as_ref())
                .await?;
            let body: Page<DatabaseEngine> = response.json().await?;
            engines.extend(body.data);
            if body.page >= body.pages {
                break;
            }
            page += 1;
        }
        Ok(engines)
    }

    async fn list_events(&self, filter: &EventFilter) -> ApiResult<Vec<Event>> {
        let header = filter.to_header();
        let response = self
            .send::<()>(Method::GET, "/account/events", None, Some(&header))
            .await?;
        let body: Page<Event> = response.json().await?;
        Ok(body.data)
    }

    fn poll_interval(&self) -> Duration {
        self.config.event_poll_interval
    }
}

impl std::fmt::Debug for LinodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinodeClient")
            .field("api_root", &self.config.api_root())
            .field("retry_conditions", &self.retry_conditions.len())
            .finish()
    }
}

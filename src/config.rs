//! Provider configuration.
//!
//! Settings are resolved from built-in defaults, then the `LINODE_*`
//! environment variables, then the provider configuration block sent by the
//! host. Later sources win.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;

/// Default API endpoint.
pub const DEFAULT_URL: &str = "https://api.linode.com";

/// Default API version path segment.
pub const DEFAULT_API_VERSION: &str = "v4";

/// Settings consumed by the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Personal access token.
    pub token: Option<String>,
    /// API base URL without the version segment.
    pub base_url: String,
    /// API version segment, e.g. `v4`.
    pub api_version: String,
    /// First retry delay.
    pub min_retry_delay: Duration,
    /// Upper bound for the retry delay.
    pub max_retry_delay: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Sleep between event and status polls.
    pub event_poll_interval: Duration,
    /// Optional prefix for the User-Agent header.
    pub ua_prefix: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            min_retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(2000),
            max_retries: 5,
            event_poll_interval: Duration::from_millis(3000),
            ua_prefix: None,
        }
    }
}

/// The provider configuration block as the host sends it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderBlock {
    token: Option<String>,
    url: Option<String>,
    api_version: Option<String>,
    min_retry_delay_ms: Option<u64>,
    max_retry_delay_ms: Option<u64>,
    max_retries: Option<u32>,
    event_poll_ms: Option<u64>,
    ua_prefix: Option<String>,
}

impl ClientConfig {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings using a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let millis = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(token) = lookup("LINODE_TOKEN").filter(|t| !t.is_empty()) {
            config.token = Some(token);
        }
        if let Some(url) = lookup("LINODE_URL").filter(|u| !u.is_empty()) {
            config.base_url = url;
        }
        if let Some(version) = lookup("LINODE_API_VERSION").filter(|v| !v.is_empty()) {
            config.api_version = version;
        }
        if let Some(ms) = millis("LINODE_MIN_RETRY_DELAY_MS") {
            config.min_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = millis("LINODE_MAX_RETRY_DELAY_MS") {
            config.max_retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = lookup("LINODE_MAX_RETRIES").and_then(|v| v.trim().parse().ok()) {
            config.max_retries = n;
        }
        if let Some(ms) = millis("LINODE_EVENT_POLL_MS") {
            config.event_poll_interval = Duration::from_millis(ms);
        }
        if let Some(prefix) = lookup("LINODE_UA_PREFIX").filter(|p| !p.is_empty()) {
            config.ua_prefix = Some(prefix);
        }
        config
    }

    /// Overlay the host's provider configuration block.
    pub fn with_provider_config(mut self, block: &Value) -> Result<Self, ProviderError> {
        if block.is_null() {
            return Ok(self);
        }
        let block: ProviderBlock = serde_json::from_value(strip_nulls(block))?;

        if let Some(token) = block.token.filter(|t| !t.is_empty()) {
            self.token = Some(token);
        }
        if let Some(url) = block.url {
            self.base_url = url;
        }
        if let Some(version) = block.api_version {
            self.api_version = version;
        }
        if let Some(ms) = block.min_retry_delay_ms {
            self.min_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = block.max_retry_delay_ms {
            self.max_retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = block.max_retries {
            self.max_retries = n;
        }
        if let Some(ms) = block.event_poll_ms {
            self.event_poll_interval = Duration::from_millis(ms);
        }
        if block.ua_prefix.is_some() {
            self.ua_prefix = block.ua_prefix;
        }
        Ok(self)
    }

    /// Check that the settings can build a working client.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.token.as_deref().unwrap_or_default().is_empty() {
            return Err(ProviderError::Configuration(
                "an API token is required; set `token` or LINODE_TOKEN".to_string(),
            ));
        }
        if self.min_retry_delay > self.max_retry_delay {
            return Err(ProviderError::Configuration(format!(
                "min_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.min_retry_delay.as_millis(),
                self.max_retry_delay.as_millis()
            )));
        }
        Ok(())
    }

    /// Base URL including the version segment, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }

    /// User-Agent header value.
    pub fn user_agent(&self) -> String {
        let agent = format!("linode-database-provider/{}", env!("CARGO_PKG_VERSION"));
        match &self.ua_prefix {
            Some(prefix) => format!("{prefix} {agent}"),
            None => agent,
        }
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null() && !crate::attr::is_unknown_value(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Per-operation deadlines for a database resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Create deadline.
    pub create: Duration,
    /// Update deadline.
    pub update: Duration,
    /// Delete deadline.
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(60 * 60),
            update: Duration::from_secs(60 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

impl Timeouts {
    /// Read the `timeouts` object of a resource state, falling back to defaults.
    pub fn from_state(state: &Value) -> Result<Self, ProviderError> {
        let mut timeouts = Self::default();
        let Some(block) = state.get("timeouts").filter(|v| v.is_object()) else {
            return Ok(timeouts);
        };
        let field = |name: &str| block.get(name).and_then(Value::as_str);

        if let Some(s) = field("create") {
            timeouts.create = parse_duration(s)?;
        }
        if let Some(s) = field("update") {
            timeouts.update = parse_duration(s)?;
        }
        if let Some(s) = field("delete") {
            timeouts.delete = parse_duration(s)?;
        }
        Ok(timeouts)
    }
}

/// Parse a duration such as `90m`, `1h30m` or `45s`.
pub fn parse_duration(input: &str) -> Result<Duration, ProviderError> {
    humantime::parse_duration(input.trim())
        .map_err(|e| ProviderError::Validation(format!("invalid duration {input:?}: {e}")))
}

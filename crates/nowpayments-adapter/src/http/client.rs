/*
[INPUT]:  HTTP configuration (API key, base URL, timeouts, retry policy)
[OUTPUT]: Configured REST client composing validation, retry and execution
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::constants::{API_BASE_URL, SANDBOX_API_BASE_URL};
use crate::error::{NowPaymentsError, Result};
use crate::validation::{DefaultValidator, Validator};

use super::executor::{ApiRequest, Execute, HttpExecutor, RawResponse};
use super::retry::{RetryConfig, RetryPolicy};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Configuration pointing at the sandbox environment
    pub fn sandbox(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: SANDBOX_API_BASE_URL.to_string(),
            ..Self::default()
        }
    }
}

/// Main REST client for the NOWPayments API.
///
/// Configuration is read-only after construction, so a client can be shared
/// (`Arc`) across tasks and calls run concurrently. Each instance owns its
/// own connection pool; there is no process-wide default client.
#[derive(Debug)]
pub struct NowPaymentsClient {
    executor: Arc<dyn Execute>,
    validator: Arc<dyn Validator>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl NowPaymentsClient {
    /// Create a new production client with default configuration
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key))
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NowPaymentsError::validation("api_key", "is required"));
        }
        let executor = HttpExecutor::new(&config)?;
        Ok(Self::with_parts(
            config.retry,
            Arc::new(executor),
            Arc::new(DefaultValidator),
        ))
    }

    /// Assemble a client from an arbitrary executor and validator
    pub fn with_parts(
        retry: RetryConfig,
        executor: Arc<dyn Execute>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            executor,
            validator,
            retry: RetryPolicy::with_cancellation(retry, shutdown.clone()),
            shutdown,
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        self.retry.config()
    }

    /// Cancel pending retry sleeps; subsequent calls fail fast
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run parameters through the validator
    pub(crate) fn validated<P: Serialize + ?Sized>(&self, method: &str, params: &P) -> Result<Value> {
        let value = serde_json::to_value(params)
            .map_err(|err| NowPaymentsError::validation(method, err.to_string()))?;
        self.validator.validate(method, value)
    }

    /// Execute with retry and decode the body
    pub(crate) async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let RawResponse { status, body } = self
            .retry
            .execute_with_retry(self.executor.as_ref(), &request)
            .await?;
        serde_json::from_value(body).map_err(|err| {
            NowPaymentsError::api(status, format!("unexpected response shape: {err}"))
        })
    }
}

impl Drop for NowPaymentsClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Flatten a validated JSON object into query pairs, skipping nulls
pub(crate) fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = params else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

/// Read a normalized string field back out of a validated payload
pub(crate) fn field(params: &Value, name: &str) -> String {
    match params.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

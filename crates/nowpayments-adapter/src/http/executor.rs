/*
[INPUT]:  ApiRequest (method, path, query, body, optional bearer token)
[OUTPUT]: Parsed JSON body or a classified error (Network / Api)
[POS]:    HTTP layer - single request execution, no retry logic
[UPDATE]: When changing authentication headers or error body parsing
*/

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::API_KEY_HEADER;
use crate::error::{NowPaymentsError, Result};

use super::client::ClientConfig;

/// Outbound request description, immutable across retry attempts
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A completed 2xx exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

/// Issues a single request. Implemented by `HttpExecutor`; tests and custom
/// transports can provide their own.
#[async_trait]
pub trait Execute: Send + Sync + Debug {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// Error payload returned by NOWPayments on 4xx/5xx. `code` is a string or
/// a number; `message` is a string or, for field validation failures, a
/// list of strings.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl ApiErrorBody {
    fn code(&self) -> Option<String> {
        match self.code.as_ref()? {
            Value::String(code) if !code.is_empty() => Some(code.clone()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    }

    fn message(&self) -> Option<String> {
        let message = match self.message.as_ref()? {
            Value::String(message) => message.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(part) => Some(part.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => return None,
        };
        (!message.is_empty()).then_some(message)
    }
}

/// reqwest-backed executor carrying the API key
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    http_client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|err| {
            NowPaymentsError::validation("base_url", format!("invalid URL: {err}"))
        })?;

        Ok(Self {
            http_client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| NowPaymentsError::validation("path", format!("invalid endpoint: {err}")))
    }
}

#[async_trait]
impl Execute for HttpExecutor {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse> {
        let url = self.url(&request.path)?;
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .header(API_KEY_HEADER, &self.api_key);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let bytes = response.bytes().await?;

        if status.is_success() {
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).map_err(|err| {
                    NowPaymentsError::api(status.as_u16(), format!("invalid response body: {err}"))
                })?
            };
            return Ok(RawResponse {
                status: status.as_u16(),
                body,
            });
        }

        let err = classify_error_response(status, &bytes, retry_after);
        warn!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            error = %err,
            "request failed"
        );
        Err(err)
    }
}

/// Map a non-2xx response into an `Api` error, falling back to the
/// canonical status text when the body is not the documented error shape
pub(crate) fn classify_error_response(
    status: StatusCode,
    body: &[u8],
    retry_after: Option<u64>,
) -> NowPaymentsError {
    let parsed = serde_json::from_slice::<ApiErrorBody>(body).unwrap_or_default();
    let message = parsed
        .message()
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    NowPaymentsError::Api {
        status: status.as_u16(),
        code: parsed.code(),
        message,
        retry_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_parses_remote_body() {
        let body = br#"{"status":false,"statusCode":400,"code":"INVALID_REQUEST_PARAMS","message":"currency_from is invalid"}"#;
        match classify_error_response(StatusCode::BAD_REQUEST, body, None) {
            NowPaymentsError::Api {
                status,
                code,
                message,
                retry_after,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("INVALID_REQUEST_PARAMS"));
                assert_eq!(message, "currency_from is invalid");
                assert_eq!(retry_after, None);
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_accepts_numeric_code() {
        let body = br#"{"statusCode":400,"code":400,"message":"amountTo is too small"}"#;
        match classify_error_response(StatusCode::BAD_REQUEST, body, None) {
            NowPaymentsError::Api { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("400"));
                assert_eq!(message, "amountTo is too small");
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_joins_message_list() {
        let body = br#"{"statusCode":400,"message":["price_amount must be a number","order_id should not be empty"],"error":"Bad Request"}"#;
        match classify_error_response(StatusCode::BAD_REQUEST, body, None) {
            NowPaymentsError::Api { code, message, .. } => {
                assert!(code.is_none());
                assert_eq!(
                    message,
                    "price_amount must be a number; order_id should not be empty"
                );
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_falls_back_to_status_text() {
        let err = classify_error_response(StatusCode::BAD_GATEWAY, b"<html>oops</html>", Some(2));
        match err {
            NowPaymentsError::Api {
                status,
                code,
                message,
                retry_after,
            } => {
                assert_eq!(status, 502);
                assert!(code.is_none());
                assert_eq!(message, "Bad Gateway");
                assert_eq!(retry_after, Some(2));
            }
            other => panic!("Expected Api error variant, got {other:?}"),
        }
    }

    #[test]
    fn test_request_builders() {
        let req = ApiRequest::get("estimate")
            .with_query(vec![("amount".to_string(), "10".to_string())])
            .with_bearer("jwt");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query.len(), 1);
        assert_eq!(req.bearer.as_deref(), Some("jwt"));
        assert!(req.body.is_none());
    }

    #[test]
    fn test_url_join_keeps_version_prefix() {
        let config = ClientConfig {
            base_url: "https://api.nowpayments.io/v1".to_string(),
            ..ClientConfig::new("key")
        };
        let executor = HttpExecutor::new(&config).unwrap();
        assert_eq!(
            executor.url("/payment/123").unwrap().as_str(),
            "https://api.nowpayments.io/v1/payment/123"
        );
    }
}

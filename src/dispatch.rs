//! Request descriptor → HTTP call
//!
//! Executes a `RequestDescriptor` with a blocking reqwest client. Transport
//! problems never surface as `Err`: they come back as `CallOutcome::Failure`
//! so a long-running session can show them and carry on.

use std::collections::BTreeMap;

use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::error::RequestError;
use crate::request::{build_request, RequestDescriptor, RequestOptions};
use crate::spec::{EndpointRecord, Method};

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A 2xx response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON payload; `None` when the body is empty or not JSON
    pub body: Option<Value>,
}

/// Structured transport failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

/// Result of executing one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallOutcome {
    Success(ApiResponse),
    Failure(CallFailure),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Success(resp) => Some(resp.status_code),
            Self::Failure(failure) => failure.status_code,
        }
    }
}

/// HTTP client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    options: RequestOptions,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, options: RequestOptions) -> Result<Self, RequestError> {
        let client = Client::builder().build().map_err(RequestError::Client)?;
        Ok(Self::with_client(client, base_url, options))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, options: RequestOptions) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            options,
        }
    }

    /// Client for `base_url` using the timeout, placeholder policy and
    /// user agent from `config`.
    pub fn from_config(config: &AgentConfig, base_url: impl Into<String>) -> Result<Self, RequestError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(RequestError::Client)?;
        Ok(Self::with_client(client, base_url, config.request_options()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Resolve a request without sending it.
    pub fn prepare(
        &self,
        endpoint: &EndpointRecord,
        values: &Map<String, Value>,
        body: Option<Value>,
    ) -> Result<RequestDescriptor, RequestError> {
        build_request(&self.base_url, endpoint, values, body, &self.options)
    }

    /// Build and execute a request.
    ///
    /// `Err` only for problems found while building (nothing is sent);
    /// transport problems are reported through the outcome.
    pub fn call(
        &self,
        endpoint: &EndpointRecord,
        values: &Map<String, Value>,
        body: Option<Value>,
    ) -> Result<CallOutcome, RequestError> {
        let req = self.prepare(endpoint, values, body)?;
        Ok(self.execute(&req))
    }

    pub fn execute(&self, req: &RequestDescriptor) -> CallOutcome {
        let mut builder = self
            .client
            .request(req.method.into(), &req.url)
            .timeout(req.timeout);

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, val) in &req.headers {
            builder = builder.header(name.as_str(), val.as_str());
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let outcome = send_request(builder);
        match &outcome {
            CallOutcome::Success(resp) => {
                info!(method = %req.method, url = %req.url, status = resp.status_code, "call succeeded")
            }
            CallOutcome::Failure(failure) => warn!(
                method = %req.method,
                url = %req.url,
                status = ?failure.status_code,
                error = %failure.error,
                "call failed"
            ),
        }
        outcome
    }
}

fn send_request(req: RequestBuilder) -> CallOutcome {
    let resp = match req.send() {
        Ok(resp) => resp,
        Err(err) => {
            return CallOutcome::Failure(CallFailure {
                error: error_chain(&err),
                status_code: err.status().map(|s| s.as_u16()),
                raw_body: None,
            })
        }
    };

    let status = resp.status();
    let url = resp.url().to_string();
    let headers = collect_headers(resp.headers());

    let text = match resp.text() {
        Ok(text) => text,
        Err(err) => {
            return CallOutcome::Failure(CallFailure {
                error: format!("failed to read response body: {}", error_chain(&err)),
                status_code: Some(status.as_u16()),
                raw_body: None,
            })
        }
    };

    if !status.is_success() {
        return CallOutcome::Failure(CallFailure {
            error: format!("HTTP {status} for url: {url}"),
            status_code: Some(status.as_u16()),
            raw_body: Some(text),
        });
    }

    let body = if text.trim().is_empty() {
        None
    } else {
        serde_json::from_str(&text).ok()
    };

    CallOutcome::Success(ApiResponse {
        status_code: status.as_u16(),
        headers,
        body,
    })
}

/// Repeated headers are joined with ", ".
fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// `err` followed by each of its sources, separated by ": ".
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

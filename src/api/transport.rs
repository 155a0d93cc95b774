use crate::api::types::ApiError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// HTTP verbs the service client needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Patch,
}

/// One outbound call, expressed independently of the HTTP backend
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub bearer: String,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            bearer: String::new(),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            bearer: String::new(),
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = token.into();
        self
    }
}

/// A response that made it back, whatever its status code
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Connection-level failure: no response was received at all
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportFailure(pub String);

/// Seam between the orchestration layer and the actual HTTP stack.
///
/// Production uses [`HttpTransport`]; tests substitute scripted
/// implementations so classification, caching, and throttling can be
/// exercised without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, TransportFailure>;
}

/// reqwest-backed transport against a fixed base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Default per-request timeout applied by the underlying client
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        // A trailing slash keeps Url::join from eating the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::Unexpected(format!("invalid base url {:?}: {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Unexpected(format!("failed to build http client: {}", e)))?;

        Ok(Self { base_url, http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse, TransportFailure> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| TransportFailure(format!("invalid request path {:?}: {}", request.path, e)))?;

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Patch => self.http.patch(url),
        };
        builder = builder.bearer_auth(&request.bearer);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure(format!("response body unreadable: {}", e)))?;

        Ok(RawResponse { status, body })
    }
}

//! Transport for the google-maps lead endpoints.
//!
//! [`SearchClient`] is the seam the engine talks through; [`HttpSearchClient`]
//! is the reqwest implementation. Nothing here interprets responses beyond
//! decoding them.

use async_trait::async_trait;
use leadscout_types::{
    HistoryResponse, PreviewResponse, SearchId, SearchStatusResponse, StartSearchRequest,
    StartSearchResponse, UnlockRequest, UnlockResponse,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Transport-level failure of a single request.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid credentials")]
    Unauthorized,

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Network error. Please check your internet connection. ({0})")]
    Network(#[source] reqwest::Error),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Remote operations of the discovery backend.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Start a search, or resume the existing one for the same query.
    async fn start(&self, request: &StartSearchRequest) -> Result<StartSearchResponse, ApiError>;

    async fn status(&self, search_id: SearchId) -> Result<SearchStatusResponse, ApiError>;

    async fn preview(
        &self,
        search_id: SearchId,
        page: u32,
        per_page: u32,
    ) -> Result<PreviewResponse, ApiError>;

    async fn unlock(&self, search_id: SearchId, batch_size: u64) -> Result<UnlockResponse, ApiError>;

    async fn history(&self, page: u32, per_page: u32) -> Result<HistoryResponse, ApiError>;
}

/// Connection settings for [`HttpSearchClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the leads API group, without a trailing slash.
    pub base_url: String,
    /// Bearer token of the signed-in account.
    pub auth_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

const BASE_ENDPOINT: &str = "/leads/google-maps";

/// reqwest-backed [`SearchClient`].
pub struct HttpSearchClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpSearchClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.filter(|t| !t.is_empty()),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}{}", self.base_url, BASE_ENDPOINT, path);
        debug!(target: "leadscout::client", "{} {}", method, url);

        let builder = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(ApiError::Network)?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await.map_err(ApiError::Network)?;
            return serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        warn!(target: "leadscout::client", "Request failed with {}: {}", status, body);

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        Err(ApiError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    async fn start(&self, request: &StartSearchRequest) -> Result<StartSearchResponse, ApiError> {
        self.send(self.request(Method::POST, "/search").json(request)).await
    }

    async fn status(&self, search_id: SearchId) -> Result<SearchStatusResponse, ApiError> {
        let path = format!("/search/{}/status", search_id);
        self.send(self.request(Method::GET, &path)).await
    }

    async fn preview(
        &self,
        search_id: SearchId,
        page: u32,
        per_page: u32,
    ) -> Result<PreviewResponse, ApiError> {
        let path = format!("/search/{}/preview", search_id);
        let builder = self
            .request(Method::GET, &path)
            .query(&[("page", page), ("per_page", per_page)]);
        self.send(builder).await
    }

    async fn unlock(&self, search_id: SearchId, batch_size: u64) -> Result<UnlockResponse, ApiError> {
        let path = format!("/search/{}/unlock", search_id);
        let builder = self
            .request(Method::POST, &path)
            .json(&UnlockRequest { batch_size });
        self.send(builder).await
    }

    async fn history(&self, page: u32, per_page: u32) -> Result<HistoryResponse, ApiError> {
        let builder = self
            .request(Method::GET, "/history")
            .query(&[("page", page), ("per_page", per_page)]);
        self.send(builder).await
    }
}

/// Human-readable message for a failed response.
///
/// Prefers what the backend said (plain text body, `message`, `error`, or
/// `payload.message`), then falls back to a message for the status code.
pub fn error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(serde_json::Value::String(s)) if !s.is_empty() => return s,
            Ok(value @ serde_json::Value::Object(_)) => {
                let candidates = [
                    value.get("message"),
                    value.get("error"),
                    value.get("payload").and_then(|p| p.get("message")),
                ];
                if let Some(msg) = candidates
                    .into_iter()
                    .flatten()
                    .filter_map(|v| v.as_str())
                    .find(|s| !s.is_empty())
                {
                    return msg.to_string();
                }
            }
            Err(_) => return trimmed.to_string(),
            _ => {}
        }
    }

    match status {
        StatusCode::NOT_FOUND => "Resource not found".to_string(),
        StatusCode::INTERNAL_SERVER_ERROR => "Server error. Please try again later.".to_string(),
        StatusCode::FORBIDDEN => "Access denied".to_string(),
        StatusCode::UNAUTHORIZED => "Invalid credentials".to_string(),
        other => format!("Request failed with status {}", other.as_u16()),
    }
}

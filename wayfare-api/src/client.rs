use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;
use wayfare_session::SessionManager;
use wayfare_store::app_config::ApiConfig;

use crate::error::{ApiError, ApiResult};

/// A backend call kept as plain data so it can be replayed after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Appended after `path`, each percent-encoded as a single segment
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), segments: Vec::new(), query: Vec::new(), body: None }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds an id or other caller-supplied value as one path segment.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> ApiResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// HTTP client for the booking backend.
///
/// Attaches the session's bearer token to every call. A 401 triggers one
/// forced refresh and one retry; anything after that is `Unauthorized`.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Option<Arc<SessionManager>>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Option<Arc<SessionManager>>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { http, base_url: Url::parse(&config.backend_url)?, session })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Arc<SessionManager>> {
        self.session.as_ref()
    }

    /// Appends `path` to the base URL's own path.
    pub fn url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    pub fn request_url(&self, request: &ApiRequest) -> Url {
        let mut url = self.url(&request.path);
        if !request.segments.is_empty() {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(&request.segments);
            }
        }
        url
    }

    async fn bearer(&self) -> Option<String> {
        match &self.session {
            Some(session) => session.access_token().await,
            None => None,
        }
    }

    pub async fn send(&self, request: &ApiRequest) -> ApiResult<Response> {
        let token = self.bearer().await;
        let response = self.dispatch(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let Some(session) = &self.session else {
            return Err(ApiError::Unauthorized);
        };
        if !session.handle_unauthorized(token.as_deref()).await {
            return Err(ApiError::Unauthorized);
        }
        let Some(retry_token) = session.access_token().await else {
            return Err(ApiError::Unauthorized);
        };

        debug!(path = %request.path, "Retrying after token refresh");
        let response = self.dispatch(request, Some(&retry_token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "Request still unauthorized after refresh");
            return Err(ApiError::Unauthorized);
        }
        check_status(response).await
    }

    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// For calls whose response body carries nothing the caller needs.
    pub async fn execute_empty(&self, request: &ApiRequest) -> ApiResult<()> {
        self.send(request).await?;
        Ok(())
    }

    /// One attempt with an explicit token, no refresh handling.
    pub async fn send_with_token(&self, request: &ApiRequest, token: &str) -> ApiResult<Response> {
        let response = self.dispatch(request, Some(token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        check_status(response).await
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> ApiResult<Response> {
        let request_id = Uuid::new_v4().to_string();
        let mut builder = self
            .http
            .request(request.method.clone(), self.request_url(request))
            .header("x-request-id", &request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, %request_id, "Sending request");
        Ok(builder.send().await?)
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = ["error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    warn!(status = status.as_u16(), %message, "Backend returned an error");
    Err(ApiError::Status { status: status.as_u16(), message })
}

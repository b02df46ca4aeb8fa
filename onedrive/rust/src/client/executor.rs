//! Request executor with bearer auth, refresh-and-replay, and error mapping.

use crate::auth::TokenRefreshable;
use crate::config::OneDriveConfig;
use crate::errors::{OneDriveError, OneDriveResult, RequestError, ResponseError};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::types::{GraphErrorResponse, INVALID_AUTHENTICATION_TOKEN, NAME_ALREADY_EXISTS};
use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Refresh budget of one top-level call.
///
/// Create one per logical operation (an upload, a download, a lookup) and
/// pass it to every [`RequestExecutor::execute`] made on its behalf. Once a
/// refresh has been attempted, later expiry signals in the same call are
/// returned as-is.
#[derive(Debug, Default)]
pub struct RefreshGuard {
    attempted: bool,
}

impl RefreshGuard {
    /// A fresh budget of one refresh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the refresh has been spent.
    pub fn attempted(&self) -> bool {
        self.attempted
    }

    fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.attempted, true)
    }
}

/// Request executor that sends Graph calls with the current access token.
///
/// When a response reports an expired or revoked token, the executor
/// refreshes the credentials once per [`RefreshGuard`] and replays the call.
pub struct RequestExecutor {
    config: OneDriveConfig,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn TokenRefreshable>,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        config: OneDriveConfig,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn TokenRefreshable>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
        }
    }

    /// The client configuration.
    pub fn config(&self) -> &OneDriveConfig {
        &self.config
    }

    /// Builds a full URL from a path relative to the Graph base URL.
    pub fn build_url(&self, path: &str) -> OneDriveResult<Url> {
        self.config
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| OneDriveError::request(format!("Invalid URL: {}", e)))
    }

    /// Builds a request for a Graph path.
    pub fn request(&self, method: HttpMethod, path: &str) -> OneDriveResult<HttpRequest> {
        Ok(self.request_to(method, self.build_url(path)?))
    }

    /// Builds a request for an absolute URL.
    pub fn request_to(&self, method: HttpMethod, url: Url) -> HttpRequest {
        let mut request = HttpRequest::new(method, url);
        if let Ok(agent) = HeaderValue::from_str(&self.config.user_agent) {
            request.headers.insert(USER_AGENT, agent);
        }
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));
        request.timeout = Some(self.config.timeout);
        request
    }

    /// Builds a request for a Graph path with a JSON body.
    pub fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> OneDriveResult<HttpRequest> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| OneDriveError::request(format!("Failed to serialize body: {}", e)))?;
        let mut request = self.request(method, path)?;
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.body = Some(Bytes::from(bytes));
        Ok(request)
    }

    /// Executes a request, refreshing and replaying once on token expiry.
    ///
    /// The returned response is unclassified: pass it to
    /// [`RequestExecutor::check_response`] to map failures.
    pub async fn execute(
        &self,
        request: HttpRequest,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<HttpResponse> {
        let response = self.send_authorized(request.clone()).await?;

        if !is_token_expired(&response) || !guard.claim() {
            return Ok(response);
        }

        info!(
            method = request.method.as_str(),
            status = response.status.as_u16(),
            "Access token expired or revoked, refreshing"
        );

        if let Err(e) = self.credentials.refresh_access_token().await {
            warn!(error = %e, "Failed refreshing access token");
            return Err(OneDriveError::AccessTokenRevokedOrExpired(format!(
                "Failed refreshing access token: {}",
                e
            )));
        }

        info!("Refreshed access token, replaying request");
        self.send_authorized(request).await
    }

    /// Executes a request and maps failures to errors.
    pub async fn execute_checked(
        &self,
        request: HttpRequest,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<HttpResponse> {
        let response = self.execute(request, guard).await?;
        self.check_response(response)
    }

    /// Executes a request and deserializes the JSON response.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<T> {
        let response = self.execute_checked(request, guard).await?;
        parse_json(&response)
    }

    /// Passes successful responses through and maps the rest to errors.
    ///
    /// An expired-token body is an error even under a success status.
    pub fn check_response(&self, response: HttpResponse) -> OneDriveResult<HttpResponse> {
        if response.status.is_success() && !is_token_expired(&response) {
            return Ok(response);
        }
        Err(self.handle_error_response(response))
    }

    /// Maps an error response to a domain error.
    pub fn handle_error_response(&self, response: HttpResponse) -> OneDriveError {
        let status = response.status;
        let graph_error = GraphErrorResponse::parse(&response.body);

        let message = graph_error
            .as_ref()
            .map(|e| format!("{}: {}", e.error.code, e.error.message))
            .unwrap_or_else(|| response.body_text());

        let has_code = |code: &str| {
            graph_error
                .as_ref()
                .map(|e| e.has_code(code))
                .unwrap_or(false)
        };

        if has_code(INVALID_AUTHENTICATION_TOKEN) {
            return OneDriveError::AccessTokenRevokedOrExpired(message);
        }

        if status == StatusCode::CONFLICT || has_code(NAME_ALREADY_EXISTS) {
            debug!(status = status.as_u16(), "Name conflict");
            return OneDriveError::AlreadyUploaded(message);
        }

        if status == StatusCode::NOT_FOUND || has_code("itemNotFound") {
            return OneDriveError::not_found(message);
        }

        OneDriveError::Response(ResponseError::UnexpectedStatus {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_authorized(&self, mut request: HttpRequest) -> OneDriveResult<HttpResponse> {
        request.headers.remove(AUTHORIZATION);

        // Upload URLs are pre-authenticated and reject bearer tokens.
        if self.is_graph_url(&request.url) {
            if let Some(token) = self.credentials.access_token().await {
                let mut value =
                    HeaderValue::from_str(&format!("Bearer {}", token.expose_secret())).map_err(
                        |e| RequestError::InvalidHeader(format!("Invalid auth header: {}", e)),
                    )?;
                value.set_sensitive(true);
                request.headers.insert(AUTHORIZATION, value);
            }
        }

        debug!(method = request.method.as_str(), url = %request.url.path(), "Sending request");
        Ok(self.transport.send(request).await?)
    }

    fn is_graph_url(&self, url: &Url) -> bool {
        url.origin() == self.config.base_url.origin()
    }
}

/// Whether the body carries Graph's expired-token error code.
pub fn is_token_expired(response: &HttpResponse) -> bool {
    GraphErrorResponse::parse(&response.body)
        .map(|e| e.has_code(INVALID_AUTHENTICATION_TOKEN))
        .unwrap_or(false)
}

/// Deserializes a JSON response body.
pub fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> OneDriveResult<T> {
    if response.body.is_empty() {
        return Err(ResponseError::EmptyBody.into());
    }
    serde_json::from_slice(&response.body)
        .map_err(|e| OneDriveError::deserialization(format!("Failed to deserialize response: {}", e)))
}

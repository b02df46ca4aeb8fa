//! Token lifecycle for a Microsoft account.
//!
//! [`MicrosoftCredentials`] owns the access and refresh tokens of one account.
//! It acquires tokens in two ways:
//!
//! - the on-behalf-of exchange, trading an identity token issued to a client
//!   app for a Graph token pair;
//! - the refresh exchange, renewing the pair with the stored refresh token.
//!
//! After each successful exchange the pair is handed to the configured
//! [`CredentialStore`]. A failing store fails the exchange, but the new tokens
//! stay in memory.

use super::identity::{ClientIdentity, ClientIdentitySource};
use super::store::{CredentialStore, NoopCredentialStore};
use super::tokens::{TokenPair, TokenResponse};
use crate::config::OneDriveConfig;
use crate::errors::{ConfigurationError, TokenError};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Scope requested in every exchange.
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/user.read offline_access";

/// Grant type of the on-behalf-of exchange.
pub const ON_BEHALF_OF_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Grant type of the refresh exchange.
pub const REFRESH_GRANT_TYPE: &str = "refresh_token";

/// Form body of a token request. Field order is the wire order.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    assertion: Option<&'a str>,
    scope: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested_token_use: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

impl TokenRequest<'_> {
    fn encode(&self) -> Result<String, TokenError> {
        serde_urlencoded::to_string(self).map_err(|e| TokenError::FormEncoding(e.to_string()))
    }
}

/// Access and refresh tokens of one Microsoft account.
pub struct MicrosoftCredentials {
    identity: ClientIdentity,
    transport: Arc<dyn HttpTransport>,
    token_url: Url,
    timeout: Option<Duration>,
    store: Arc<dyn CredentialStore>,
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl MicrosoftCredentials {
    /// Creates credentials without tokens.
    ///
    /// Fails with [`ConfigurationError::MissingCredentials`] when the client
    /// id or secret is empty.
    pub fn new(
        identity: ClientIdentity,
        config: &OneDriveConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigurationError> {
        identity.validate()?;
        Ok(Self {
            identity,
            transport,
            token_url: config.token_url.clone(),
            timeout: Some(config.timeout),
            store: Arc::new(NoopCredentialStore),
            access_token: None,
            refresh_token: None,
            expires_at: None,
        })
    }

    /// Creates credentials, resolving the identity from `source`.
    pub fn from_source(
        source: &dyn ClientIdentitySource,
        config: &OneDriveConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(source.client_identity()?, config, transport)
    }

    /// Sets the store that receives tokens after each exchange.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets an access token handed in by the caller, e.g. from a request header.
    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(SecretString::new(access_token.into()));
        self
    }

    /// Sets both tokens.
    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.apply(tokens);
        self
    }

    /// Restores tokens saved with [`MicrosoftCredentials::to_json`].
    pub fn with_json(self, json: &str) -> Result<Self, TokenError> {
        let tokens = TokenPair::from_json(json)
            .map_err(|e| TokenError::MalformedTokenResponse(e.to_string()))?;
        Ok(self.with_tokens(tokens))
    }

    /// The application identity.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Current access token.
    pub fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    /// Current refresh token.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// Expiry of the access token, when the token endpoint reported one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Current tokens as a pair; `None` before an access token exists.
    pub fn token_pair(&self) -> Option<TokenPair> {
        self.access_token.as_ref().map(|access| {
            TokenPair::from_parts(access.clone(), self.refresh_token.clone(), self.expires_at)
        })
    }

    /// Serializes the tokens as `{"accessToken": ..., "refreshToken": ...}`.
    pub fn to_json(&self) -> Result<String, TokenError> {
        let tokens = self.token_pair().ok_or(TokenError::NoAccessToken)?;
        tokens
            .to_json()
            .map_err(|e| TokenError::MalformedTokenResponse(e.to_string()))
    }

    /// Trades an identity token (a JWT issued to the client app) for a
    /// Graph token pair.
    pub async fn exchange_on_behalf_of(&mut self, assertion: &str) -> Result<(), TokenError> {
        if assertion.is_empty() {
            return Err(TokenError::MissingAssertion);
        }

        jsonwebtoken::decode_header(assertion)
            .map_err(|e| TokenError::InvalidAssertion(e.to_string()))?;

        let form = TokenRequest {
            grant_type: ON_BEHALF_OF_GRANT_TYPE,
            client_id: self.identity.client_id(),
            client_secret: self.identity.client_secret().expose_secret(),
            assertion: Some(assertion),
            scope: GRAPH_SCOPE,
            requested_token_use: Some("on_behalf_of"),
            refresh_token: None,
        }
        .encode()?;

        self.request_tokens("on_behalf_of", form).await
    }

    /// Renews the token pair with the stored refresh token.
    pub async fn exchange_refresh_token(&mut self) -> Result<(), TokenError> {
        let refresh_token = self
            .refresh_token
            .as_ref()
            .ok_or(TokenError::NoRefreshToken)?
            .expose_secret()
            .clone();

        let form = TokenRequest {
            grant_type: REFRESH_GRANT_TYPE,
            client_id: self.identity.client_id(),
            client_secret: self.identity.client_secret().expose_secret(),
            assertion: None,
            scope: GRAPH_SCOPE,
            requested_token_use: None,
            refresh_token: Some(refresh_token.as_str()),
        }
        .encode()?;

        self.request_tokens("refresh_token", form).await
    }

    /// Takes every token `newer` holds; tokens it lacks are kept.
    pub fn merge(&mut self, newer: &MicrosoftCredentials) {
        if let Some(access_token) = &newer.access_token {
            self.access_token = Some(access_token.clone());
            self.expires_at = newer.expires_at;
        }
        if let Some(refresh_token) = &newer.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
    }

    fn apply(&mut self, tokens: TokenPair) {
        self.access_token = Some(tokens.access_token().clone());
        self.expires_at = tokens.expires_at();
        if let Some(refresh_token) = tokens.refresh_token() {
            self.refresh_token = Some(refresh_token.clone());
        }
    }

    async fn request_tokens(
        &mut self,
        grant: &'static str,
        body: String,
    ) -> Result<(), TokenError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: self.token_url.clone(),
            headers,
            body: Some(Bytes::from(body)),
            timeout: self.timeout,
        };

        debug!(grant = grant, "Requesting tokens");

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(grant = grant, error = %e, "Token request failed");
            TokenError::from(e)
        })?;

        if response.status != StatusCode::OK {
            warn!(
                grant = grant,
                status = response.status.as_u16(),
                "Token exchange rejected"
            );
            return Err(TokenError::UnexpectedStatus(response.status.as_u16()));
        }

        if response.body.is_empty() {
            return Err(TokenError::EmptyResponse);
        }

        let parsed: TokenResponse = serde_json::from_slice(&response.body)
            .map_err(|e| TokenError::MalformedTokenResponse(e.to_string()))?;

        let tokens = parsed.into_token_pair();
        let rotated = tokens.refresh_token().is_some();
        self.apply(tokens);

        info!(
            grant = grant,
            refresh_token_rotated = rotated,
            "Token exchange succeeded"
        );

        self.persist().await
    }

    async fn persist(&self) -> Result<(), TokenError> {
        let Some(tokens) = self.token_pair() else {
            return Ok(());
        };

        self.store.save(&tokens).await.map_err(|e| {
            warn!(error = %e, "Failed to persist credentials");
            TokenError::PersistenceFailed(e.to_string())
        })
    }
}

impl std::fmt::Debug for MicrosoftCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrosoftCredentials")
            .field("identity", &self.identity)
            .field("token_url", &self.token_url.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

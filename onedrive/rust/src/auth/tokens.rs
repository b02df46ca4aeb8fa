//! Token pair and the token endpoint's response format.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Access token plus the optional refresh token that renews it.
#[derive(Clone)]
pub struct TokenPair {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    /// Creates a pair with both tokens.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: Some(SecretString::new(refresh_token.into())),
            expires_at: None,
        }
    }

    /// Creates a pair with only an access token.
    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::new(access_token.into()),
            refresh_token: None,
            expires_at: None,
        }
    }

    pub(crate) fn from_parts(
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// The access token.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// The refresh token, if one was issued.
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    /// Expiry reported by the token endpoint. Not persisted.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Serializes to `{"accessToken": ..., "refreshToken": ...}`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&StoredTokensRef {
            access_token: self.access_token.expose_secret(),
            refresh_token: self.refresh_token.as_ref().map(|t| t.expose_secret().as_str()),
        })
    }

    /// Parses the stored form written by [`TokenPair::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let stored: StoredTokens = serde_json::from_str(json)?;
        Ok(Self {
            access_token: SecretString::new(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::new),
            expires_at: None,
        })
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokensRef<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Body returned by the token endpoint on success.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Extended lifetime in seconds, used during identity platform outages.
    #[serde(default)]
    pub ext_expires_in: Option<i64>,
    /// Access token.
    pub access_token: String,
    /// Refresh token; only present when `offline_access` was granted.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Converts into a token pair, computing the expiry from `expires_in`.
    pub fn into_token_pair(self) -> TokenPair {
        let expires_at = self
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        TokenPair {
            access_token: SecretString::new(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::new),
            expires_at,
        }
    }
}

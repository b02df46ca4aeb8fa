//! Authentication against the Microsoft identity platform.
//!
//! # Examples
//!
//! ```no_run
//! use integrations_onedrive::auth::{ClientIdentity, MicrosoftCredentials};
//! use integrations_onedrive::config::OneDriveConfig;
//! use integrations_onedrive::transport::ReqwestTransport;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OneDriveConfig::builder().build()?;
//! let transport = Arc::new(ReqwestTransport::with_options(
//!     Duration::from_secs(30),
//!     &config.user_agent,
//! )?);
//!
//! let mut credentials = MicrosoftCredentials::new(
//!     ClientIdentity::from_env()?,
//!     &config,
//!     transport,
//! )?;
//! credentials.exchange_on_behalf_of("eyJ0eXAiOiJKV1Qi...").await?;
//! # Ok(())
//! # }
//! ```

mod credentials;
mod identity;
mod store;
mod tokens;

pub use credentials::{
    MicrosoftCredentials, GRAPH_SCOPE, ON_BEHALF_OF_GRANT_TYPE, REFRESH_GRANT_TYPE,
};
pub use identity::{ClientIdentity, ClientIdentitySource, EnvIdentitySource};
pub use store::{CredentialStore, InMemoryCredentialStore, NoopCredentialStore, StoreError};
pub use tokens::{TokenPair, TokenResponse};

use crate::errors::TokenError;
use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;

/// Credentials shared between the services of one client.
pub type SharedCredentials = std::sync::Arc<Mutex<MicrosoftCredentials>>;

/// Credentials that can hand out an access token and renew it.
#[async_trait]
pub trait TokenRefreshable: Send + Sync {
    /// Current access token, if one has been obtained.
    async fn access_token(&self) -> Option<SecretString>;

    /// Renews the access token.
    async fn refresh_access_token(&self) -> Result<(), TokenError>;
}

#[async_trait]
impl TokenRefreshable for Mutex<MicrosoftCredentials> {
    async fn access_token(&self) -> Option<SecretString> {
        self.lock().await.access_token().cloned()
    }

    async fn refresh_access_token(&self) -> Result<(), TokenError> {
        self.lock().await.exchange_refresh_token().await
    }
}

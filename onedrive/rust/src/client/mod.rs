//! OneDrive client implementation.

use crate::auth::{
    ClientIdentity, CredentialStore, MicrosoftCredentials, SharedCredentials, TokenPair,
};
use crate::config::{OneDriveConfig, OneDriveConfigBuilder};
use crate::errors::{OneDriveError, OneDriveResult};
use crate::services::{FilesService, UploadService};
use crate::transport::{HttpTransport, ReqwestTransport};
use std::sync::Arc;
use tokio::sync::Mutex;

mod executor;
pub use executor::{is_token_expired, parse_json, RefreshGuard, RequestExecutor};

/// OneDrive client.
///
/// Owns one account's credentials and hands out the file and upload
/// services. Services share the credentials behind a mutex, so concurrent
/// calls never interleave token writes.
pub struct OneDriveClient {
    config: OneDriveConfig,
    credentials: SharedCredentials,
    executor: Arc<RequestExecutor>,
}

impl OneDriveClient {
    /// Creates a client from credentials and a transport.
    ///
    /// The transport carries the Graph calls; the credentials use their own
    /// for token exchanges.
    pub fn with_transport(
        config: OneDriveConfig,
        credentials: MicrosoftCredentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let credentials: SharedCredentials = Arc::new(Mutex::new(credentials));
        let executor = Arc::new(RequestExecutor::new(
            config.clone(),
            transport,
            credentials.clone(),
        ));

        Self {
            config,
            credentials,
            executor,
        }
    }

    /// Creates a new client builder.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use integrations_onedrive::OneDriveClient;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = OneDriveClient::builder()
    ///     .client_identity("client-id", "client-secret")
    ///     .timeout(std::time::Duration::from_secs(60))
    ///     .build()?;
    ///
    /// client.exchange_on_behalf_of("eyJ0eXAiOiJKV1Qi...").await?;
    /// let exists = client.files().lookup_file("notes.txt").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> OneDriveClientBuilder {
        OneDriveClientBuilder::new()
    }

    /// Access the files service.
    pub fn files(&self) -> FilesService {
        FilesService::new(self.executor.clone())
    }

    /// Access the upload session service.
    pub fn uploads(&self) -> UploadService {
        UploadService::new(self.executor.clone())
    }

    /// The shared credentials.
    pub fn credentials(&self) -> &SharedCredentials {
        &self.credentials
    }

    /// Trades an identity token for a Graph token pair.
    pub async fn exchange_on_behalf_of(&self, assertion: &str) -> OneDriveResult<()> {
        self.credentials
            .lock()
            .await
            .exchange_on_behalf_of(assertion)
            .await
            .map_err(OneDriveError::from)
    }

    /// Gets the configuration.
    pub fn config(&self) -> &OneDriveConfig {
        &self.config
    }

    /// Gets the request executor (for advanced use cases).
    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }
}

/// Builder for [`OneDriveClient`].
pub struct OneDriveClientBuilder {
    config_builder: OneDriveConfigBuilder,
    identity: Option<ClientIdentity>,
    tokens: Option<TokenPair>,
    access_token: Option<String>,
    store: Option<Arc<dyn CredentialStore>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl OneDriveClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            config_builder: OneDriveConfig::builder(),
            identity: None,
            tokens: None,
            access_token: None,
            store: None,
            transport: None,
        }
    }

    /// Replaces the configuration builder.
    pub fn config(mut self, config_builder: OneDriveConfigBuilder) -> Self {
        self.config_builder = config_builder;
        self
    }

    /// Sets the application identity. Read from the environment when unset.
    pub fn client_identity(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.identity = Some(ClientIdentity::new(client_id, client_secret));
        self
    }

    /// Starts from previously obtained tokens.
    pub fn tokens(mut self, tokens: TokenPair) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Starts from an access token handed in by the caller.
    pub fn access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    /// Sets the store notified after every token exchange.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the transport used for Graph and token calls.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the Graph base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(url);
        self
    }

    /// Sets the token endpoint URL.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.token_url(url);
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Sets the session upload block size.
    pub fn upload_block_size(mut self, size: u64) -> Self {
        self.config_builder = self.config_builder.upload_block_size(size);
        self
    }

    /// Sets the user agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Builds the client.
    pub fn build(self) -> OneDriveResult<OneDriveClient> {
        let config = self.config_builder.build()?;

        let identity = match self.identity {
            Some(identity) => identity,
            None => ClientIdentity::from_env()?,
        };
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_options(
                config.connect_timeout,
                &config.user_agent,
            )?),
        };

        let mut credentials = MicrosoftCredentials::new(identity, &config, transport.clone())?;
        if let Some(store) = self.store {
            credentials = credentials.with_store(store);
        }
        if let Some(tokens) = self.tokens {
            credentials = credentials.with_tokens(tokens);
        }
        if let Some(access_token) = self.access_token {
            credentials = credentials.with_access_token(access_token);
        }

        Ok(OneDriveClient::with_transport(config, credentials, transport))
    }
}

impl Default for OneDriveClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

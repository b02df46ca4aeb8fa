//! Configuration for the OneDrive client.

use crate::chunking::{UploadState, DEFAULT_BLOCK_SIZE};
use crate::errors::{ConfigurationError, OneDriveError, OneDriveResult};
use std::time::Duration;
use url::Url;

/// Default Microsoft Graph base URL.
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0/";

/// Default Microsoft identity platform token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Largest payload sent as a single PUT (4 MiB).
pub const DEFAULT_DIRECT_UPLOAD_LIMIT: u64 = 4 * 1024 * 1024;

/// Configuration for the OneDrive client.
#[derive(Clone, Debug)]
pub struct OneDriveConfig {
    /// Graph base URL, always ending in `/`.
    pub base_url: Url,

    /// Token endpoint of the identity provider.
    pub token_url: Url,

    /// Per-request timeout handed to the transport.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Block size for session uploads.
    pub upload_block_size: u64,

    /// Whether block sizes must be 320 KiB aligned.
    pub validate_block_alignment: bool,

    /// Payloads up to this size are uploaded with a single PUT.
    pub direct_upload_limit: u64,

    /// User agent string.
    pub user_agent: String,
}

impl OneDriveConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OneDriveConfigBuilder {
        OneDriveConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ONEDRIVE_BASE_URL` (optional): Graph base URL
    /// - `ONEDRIVE_TIMEOUT` (optional): Request timeout in seconds
    /// - `ONEDRIVE_UPLOAD_BLOCK_SIZE` (optional): Session upload block size in bytes
    pub fn from_env() -> OneDriveResult<Self> {
        let mut builder = OneDriveConfigBuilder::new();

        if let Ok(base_url) = std::env::var("ONEDRIVE_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(timeout_str) = std::env::var("ONEDRIVE_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        if let Ok(block_str) = std::env::var("ONEDRIVE_UPLOAD_BLOCK_SIZE") {
            let block_size = block_str.parse::<u64>().map_err(|_| {
                OneDriveError::configuration(format!(
                    "ONEDRIVE_UPLOAD_BLOCK_SIZE is not a number: {}",
                    block_str
                ))
            })?;
            builder = builder.upload_block_size(block_size);
        }

        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> OneDriveResult<()> {
        UploadState::new(self.upload_block_size, 0, self.validate_block_alignment)
            .map_err(|e| OneDriveError::configuration(e.to_string()))?;

        require_https("Base URL", &self.base_url)?;
        require_https("Token URL", &self.token_url)?;

        if self.base_url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidUrl(self.base_url.to_string()).into());
        }

        Ok(())
    }
}

fn require_https(label: &str, url: &Url) -> OneDriveResult<()> {
    let loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );

    if url.scheme() != "https" && !loopback {
        return Err(OneDriveError::configuration(format!(
            "{} must use HTTPS: {}",
            label, url
        )));
    }

    Ok(())
}

/// Builder for [`OneDriveConfig`].
pub struct OneDriveConfigBuilder {
    base_url: Option<String>,
    token_url: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    upload_block_size: u64,
    validate_block_alignment: bool,
    direct_upload_limit: u64,
    user_agent: Option<String>,
}

impl OneDriveConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token_url: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            upload_block_size: DEFAULT_BLOCK_SIZE,
            validate_block_alignment: true,
            direct_upload_limit: DEFAULT_DIRECT_UPLOAD_LIMIT,
            user_agent: None,
        }
    }

    /// Sets the Graph base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the token endpoint URL.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the session upload block size.
    pub fn upload_block_size(mut self, size: u64) -> Self {
        self.upload_block_size = size;
        self
    }

    /// Enables or disables 320 KiB alignment checks on the block size.
    pub fn validate_block_alignment(mut self, validate: bool) -> Self {
        self.validate_block_alignment = validate;
        self
    }

    /// Sets the largest payload uploaded with a single PUT.
    pub fn direct_upload_limit(mut self, limit: u64) -> Self {
        self.direct_upload_limit = limit;
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> OneDriveResult<OneDriveConfig> {
        let mut base = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = parse_url(&base)?;

        let token_url = parse_url(
            self.token_url
                .as_deref()
                .unwrap_or(DEFAULT_TOKEN_URL),
        )?;

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("integrations-onedrive/{}", env!("CARGO_PKG_VERSION")));

        let config = OneDriveConfig {
            base_url,
            token_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            upload_block_size: self.upload_block_size,
            validate_block_alignment: self.validate_block_alignment,
            direct_upload_limit: self.direct_upload_limit,
            user_agent,
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for OneDriveConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(raw: &str) -> OneDriveResult<Url> {
    Url::parse(raw)
        .map_err(|e| ConfigurationError::InvalidUrl(format!("{}: {}", raw, e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::BLOCK_ALIGNMENT;

    #[test]
    fn test_default_config() {
        let config = OneDriveConfig::builder().build().unwrap();

        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(config.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.upload_block_size, 3_276_800);
        assert_eq!(config.direct_upload_limit, 4 * 1024 * 1024);
        assert!(config.validate_block_alignment);
        assert!(config.user_agent.starts_with("integrations-onedrive/"));
    }

    #[test]
    fn test_custom_config() {
        let config = OneDriveConfig::builder()
            .base_url("https://graph.microsoft.com/beta")
            .timeout(Duration::from_secs(60))
            .upload_block_size(20 * BLOCK_ALIGNMENT)
            .user_agent("test-agent/1.0")
            .build()
            .unwrap();

        assert_eq!(config.base_url.as_str(), "https://graph.microsoft.com/beta/");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.upload_block_size, 20 * BLOCK_ALIGNMENT);
        assert_eq!(config.user_agent, "test-agent/1.0");
    }

    #[test]
    fn test_invalid_block_size() {
        let result = OneDriveConfig::builder()
            .upload_block_size(1024 * 1024)
            .build();
        assert!(matches!(result, Err(OneDriveError::Configuration(_))));

        let result = OneDriveConfig::builder().upload_block_size(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unaligned_block_size_allowed_without_validation() {
        let config = OneDriveConfig::builder()
            .upload_block_size(100)
            .validate_block_alignment(false)
            .build()
            .unwrap();
        assert_eq!(config.upload_block_size, 100);
    }

    #[test]
    fn test_https_required_except_loopback() {
        let result = OneDriveConfig::builder()
            .base_url("http://graph.example.com/v1.0/")
            .build();
        assert!(result.is_err());

        let config = OneDriveConfig::builder()
            .base_url("http://127.0.0.1:8080")
            .token_url("http://localhost:8080/token")
            .build()
            .unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_invalid_url() {
        let result = OneDriveConfig::builder().token_url("not a url").build();
        assert!(matches!(
            result,
            Err(OneDriveError::Configuration(ConfigurationError::InvalidUrl(_)))
        ));
    }
}

//! Application identity registered with the Microsoft identity platform.

use crate::errors::ConfigurationError;
use secrecy::{ExposeSecret, SecretString};

/// Client id and secret of the registered application.
#[derive(Clone)]
pub struct ClientIdentity {
    client_id: String,
    client_secret: SecretString,
}

impl ClientIdentity {
    /// Creates a new identity.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
        }
    }

    /// Reads `MICROSOFT_CLIENT_ID` and `MICROSOFT_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let client_id = std::env::var("MICROSOFT_CLIENT_ID").map_err(|_| {
            ConfigurationError::MissingCredentials(
                "MICROSOFT_CLIENT_ID environment variable not set".to_string(),
            )
        })?;
        let client_secret = std::env::var("MICROSOFT_CLIENT_SECRET").map_err(|_| {
            ConfigurationError::MissingCredentials(
                "MICROSOFT_CLIENT_SECRET environment variable not set".to_string(),
            )
        })?;

        let identity = Self::new(client_id, client_secret);
        identity.validate()?;
        Ok(identity)
    }

    /// Fails when either value is empty.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigurationError::MissingCredentials(
                "Client id is empty".to_string(),
            ));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ConfigurationError::MissingCredentials(
                "Client secret is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The application (client) id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret.
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Supplies the client identity when credentials are constructed.
pub trait ClientIdentitySource: Send + Sync {
    /// Resolves the identity; absence is a configuration error.
    fn client_identity(&self) -> Result<ClientIdentity, ConfigurationError>;
}

impl ClientIdentitySource for ClientIdentity {
    fn client_identity(&self) -> Result<ClientIdentity, ConfigurationError> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Reads the identity from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvIdentitySource;

impl ClientIdentitySource for EnvIdentitySource {
    fn client_identity(&self) -> Result<ClientIdentity, ConfigurationError> {
        ClientIdentity::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_values() {
        assert!(ClientIdentity::new("", "secret").validate().is_err());
        assert!(ClientIdentity::new("id", "").validate().is_err());
        assert!(ClientIdentity::new("id", "secret").validate().is_ok());
    }

    #[test]
    fn test_identity_source() {
        let identity = ClientIdentity::new("id", "secret");
        let resolved = identity.client_identity().unwrap();
        assert_eq!(resolved.client_id(), "id");

        let missing = ClientIdentity::new("id", "");
        assert!(matches!(
            missing.client_identity(),
            Err(ConfigurationError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let identity = ClientIdentity::new("id", "super-secret");
        let debug = format!("{:?}", identity);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }
}

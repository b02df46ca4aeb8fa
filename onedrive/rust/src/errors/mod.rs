//! Error types for the OneDrive integration.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for OneDrive operations.
pub type OneDriveResult<T> = Result<T, OneDriveError>;

/// Top-level error type for the OneDrive integration.
///
/// Two variants are distinguished from generic failures because callers
/// recover from them differently:
/// - [`OneDriveError::AccessTokenRevokedOrExpired`]: the end user has to
///   re-authenticate.
/// - [`OneDriveError::AlreadyUploaded`]: the target name exists; a retried
///   upload has already landed.
#[derive(Debug, Error)]
pub enum OneDriveError {
    /// The access token is expired or revoked and could not be refreshed.
    #[error("Access token revoked or expired: {0}")]
    AccessTokenRevokedOrExpired(String),

    /// The upload target already exists.
    #[error("Already uploaded: {0}")]
    AlreadyUploaded(String),

    /// Client or identity settings are unusable.
    #[error("Invalid client setup: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A token exchange failed outside the refresh-and-replay path.
    #[error("Token exchange failed: {0}")]
    Token(#[from] TokenError),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    /// The addressed drive item is missing.
    #[error("{0}")]
    Resource(#[from] ResourceError),

    /// A direct or session upload could not complete.
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    /// The exchange never completed.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Graph answered with something unusable.
    #[error("Unusable Graph response: {0}")]
    Response(#[from] ResponseError),
}

impl OneDriveError {
    /// Shorthand for [`ConfigurationError::InvalidConfiguration`].
    pub fn configuration(msg: impl Into<String>) -> Self {
        OneDriveError::Configuration(ConfigurationError::InvalidConfiguration(msg.into()))
    }

    /// Shorthand for [`RequestError::ValidationError`].
    pub fn request(msg: impl Into<String>) -> Self {
        OneDriveError::Request(RequestError::ValidationError(msg.into()))
    }

    /// Shorthand for [`ResourceError::FileNotFound`].
    pub fn not_found(msg: impl Into<String>) -> Self {
        OneDriveError::Resource(ResourceError::FileNotFound(msg.into()))
    }

    /// Shorthand for [`ResponseError::DeserializationError`].
    pub fn deserialization(msg: impl Into<String>) -> Self {
        OneDriveError::Response(ResponseError::DeserializationError(msg.into()))
    }

    /// Returns true if the end user has to re-authenticate.
    pub fn is_access_token_revoked_or_expired(&self) -> bool {
        matches!(self, OneDriveError::AccessTokenRevokedOrExpired(_))
    }

    /// Returns true if the target already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OneDriveError::AlreadyUploaded(_))
    }

    /// Returns true if the error is a missing file or folder.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OneDriveError::Resource(ResourceError::FileNotFound(_)))
    }

    /// Status code this error stands for, when it came from one.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            OneDriveError::AccessTokenRevokedOrExpired(_) => Some(StatusCode::UNAUTHORIZED),
            OneDriveError::AlreadyUploaded(_) => Some(StatusCode::CONFLICT),
            OneDriveError::Resource(ResourceError::FileNotFound(_)) => {
                Some(StatusCode::NOT_FOUND)
            }
            OneDriveError::Token(TokenError::UnexpectedStatus(code)) => {
                StatusCode::from_u16(*code).ok()
            }
            OneDriveError::Response(ResponseError::UnexpectedStatus { status, .. }) => {
                StatusCode::from_u16(*status).ok()
            }
            _ => None,
        }
    }
}

/// Problems with client settings or the application identity.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Client id or secret is missing.
    #[error("Missing client identity: {0}")]
    MissingCredentials(String),

    /// A setting is out of range.
    #[error("{0}")]
    InvalidConfiguration(String),

    /// A configured endpoint is not a usable URL.
    #[error("Unusable endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Errors from the token exchanges with the identity provider.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No assertion token to exchange.
    #[error("No assertion token available for the on-behalf-of exchange")]
    MissingAssertion,

    /// The assertion is not a JWT identity token.
    #[error("Invalid assertion: {0}")]
    InvalidAssertion(String),

    /// No access token obtained yet.
    #[error("No access token available")]
    NoAccessToken,

    /// No refresh token stored.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The identity provider answered with a non-success status.
    #[error("Unexpected status code from token endpoint: {0}")]
    UnexpectedStatus(u16),

    /// The identity provider returned no body.
    #[error("Empty response from token endpoint")]
    EmptyResponse,

    /// The body was not a token pair.
    #[error("Malformed token response: {0}")]
    MalformedTokenResponse(String),

    /// Tokens were updated in memory but could not be saved.
    #[error("Failed to persist credentials: {0}")]
    PersistenceFailed(String),

    /// The request form could not be encoded.
    #[error("Failed to encode token request: {0}")]
    FormEncoding(String),

    /// The exchange did not reach the identity provider.
    #[error("Token exchange transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Requests rejected before they are sent.
#[derive(Debug, Error)]
pub enum RequestError {
    /// An argument was rejected.
    #[error("{0}")]
    ValidationError(String),

    /// A required argument was empty.
    #[error("Required argument is empty: {0}")]
    MissingParameter(String),

    /// A header value could not be encoded.
    #[error("Unencodable header value: {0}")]
    InvalidHeader(String),
}

/// Drive item lookups that came back empty.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Graph reported `itemNotFound` or 404.
    #[error("No such file in the app folder: {0}")]
    FileNotFound(String),
}

/// Failures specific to direct and session uploads.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Block size is zero or not correctly aligned.
    #[error("Invalid block size: {0}")]
    InvalidBlockSize(String),

    /// The current block has no bytes.
    #[error("Empty range: {0}")]
    EmptyRange(String),

    /// Payload length differs from the upload state's total.
    #[error("Size mismatch: {0}")]
    SizeMismatch(String),

    /// The payload is too large for a direct upload.
    #[error("Payload too large for a direct upload: {0}")]
    UploadSizeExceeded(String),

    /// The last block was sent but the session did not complete.
    #[error("Upload session incomplete: {0}")]
    IncompleteSession(String),

    /// The session no longer exists on the server.
    #[error("Upload session expired: {0}")]
    SessionExpired(String),
}

/// Graph responses that map to no distinguished error.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Non-success status that maps to no more specific error.
    #[error("HTTP {status}: {message}")]
    UnexpectedStatus {
        /// Status code.
        status: u16,
        /// Error message from the body, or the raw body.
        message: String,
    },

    /// The body did not decode into the expected type.
    #[error("Undecodable body: {0}")]
    DeserializationError(String),

    /// The response carried no body.
    #[error("Empty response body")]
    EmptyBody,

    /// Expected field absent.
    #[error("Missing field in response: {0}")]
    MissingField(String),
}

/// Failures below the HTTP status line.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established or was dropped.
    #[error("Connection failed: {0}")]
    Network(String),

    /// The per-request timeout elapsed.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Any other client-side HTTP failure.
    #[error("{0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() || err.is_request() {
            TransportError::Network(message)
        } else {
            TransportError::Http(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinguished_variants() {
        let error = OneDriveError::AccessTokenRevokedOrExpired("expired".to_string());
        assert!(error.is_access_token_revoked_or_expired());
        assert!(!error.is_conflict());

        let error = OneDriveError::AlreadyUploaded("file.txt".to_string());
        assert!(error.is_conflict());
        assert!(!error.is_access_token_revoked_or_expired());

        let error = OneDriveError::Token(TokenError::NoRefreshToken);
        assert!(!error.is_access_token_revoked_or_expired());
        assert!(!error.is_conflict());
    }

    #[test]
    fn test_status_code() {
        let error = OneDriveError::AccessTokenRevokedOrExpired("test".to_string());
        assert_eq!(error.status_code(), Some(StatusCode::UNAUTHORIZED));

        let error = OneDriveError::AlreadyUploaded("test".to_string());
        assert_eq!(error.status_code(), Some(StatusCode::CONFLICT));

        let error = OneDriveError::not_found("test");
        assert!(error.is_not_found());
        assert_eq!(error.status_code(), Some(StatusCode::NOT_FOUND));

        let error = OneDriveError::Token(TokenError::UnexpectedStatus(400));
        assert_eq!(error.status_code(), Some(StatusCode::BAD_REQUEST));

        let error = OneDriveError::request("bad");
        assert_eq!(error.status_code(), None);
    }

    #[test]
    fn test_transport_error_converts() {
        let error: OneDriveError = TransportError::Timeout("slow".to_string()).into();
        assert!(matches!(error, OneDriveError::Transport(TransportError::Timeout(_))));
    }
}

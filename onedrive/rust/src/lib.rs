//! OneDrive Integration Module
//!
//! Client core for storing files in a Microsoft OneDrive application folder
//! through Microsoft Graph v1.0.
//!
//! # Features
//!
//! - **Token lifecycle**: on-behalf-of and refresh-token exchanges against the
//!   Microsoft identity platform, with a save hook after every exchange
//! - **Refresh and replay**: an expired or revoked access token is refreshed
//!   at most once per call and the call is replayed
//! - **Resumable uploads**: large payloads are split into 320 KiB aligned
//!   blocks and sent through an upload session
//! - **File operations**: direct upload, download, delete, lookup
//!
//! # Example
//!
//! ```no_run
//! use integrations_onedrive::OneDriveClient;
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OneDriveClient::builder()
//!     .client_identity("client-id", "client-secret")
//!     .build()?;
//!
//! client.exchange_on_behalf_of("eyJ0eXAiOiJKV1Qi...").await?;
//!
//! let checksum = client
//!     .uploads()
//!     .upload("notes.txt", &mime::TEXT_PLAIN, Bytes::from("hello"))
//!     .await?;
//! println!("uploaded, sha1 {}", checksum);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod auth;
pub mod chunking;
pub mod client;
pub mod config;
pub mod errors;
pub mod mocks;
pub mod services;
pub mod transport;
pub mod types;

pub use auth::{ClientIdentity, MicrosoftCredentials, TokenPair, TokenRefreshable};
pub use client::{OneDriveClient, RefreshGuard};
pub use config::{OneDriveConfig, OneDriveConfigBuilder};
pub use errors::{OneDriveError, OneDriveResult};
pub use types::{DownloadedFile, DriveItem, FileLookup, UploadSession};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_onedrive::prelude::*;
/// ```
pub mod prelude {
    // Client
    pub use crate::client::{OneDriveClient, RefreshGuard, RequestExecutor};

    // Configuration
    pub use crate::config::{OneDriveConfig, OneDriveConfigBuilder};

    // Authentication
    pub use crate::auth::{
        ClientIdentity, ClientIdentitySource, CredentialStore, MicrosoftCredentials, TokenPair,
        TokenRefreshable,
    };

    // Chunking
    pub use crate::chunking::{plan, BlockPlan, UploadState};

    // Services
    pub use crate::services::{ChunkedUploader, FilesService, UploadService};

    // Common types
    pub use crate::types::{DownloadedFile, DriveItem, FileLookup, UploadSession};

    // Errors
    pub use crate::errors::{OneDriveError, OneDriveResult};
}

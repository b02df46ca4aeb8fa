//! Microsoft Graph wire types.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name-conflict instruction attached to uploads.
pub const CONFLICT_BEHAVIOR_FAIL: &str = "fail";

/// Graph error code for an expired, revoked or malformed access token.
pub const INVALID_AUTHENTICATION_TOKEN: &str = "InvalidAuthenticationToken";

/// Graph error code for an existing item with the same name.
pub const NAME_ALREADY_EXISTS: &str = "nameAlreadyExists";

/// A file or folder in a drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    /// Item id.
    #[serde(default)]
    pub id: Option<String>,

    /// Item name.
    #[serde(default)]
    pub name: Option<String>,

    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,

    /// ETag.
    #[serde(default, rename = "eTag")]
    pub e_tag: Option<String>,

    /// Creation time.
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,

    /// Last modification time.
    #[serde(default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,

    /// Present when the item is a file.
    #[serde(default)]
    pub file: Option<FileFacet>,

    /// Present when the item is a folder.
    #[serde(default)]
    pub folder: Option<FolderFacet>,
}

impl DriveItem {
    /// Content checksum: SHA-1 when reported, otherwise the QuickXorHash.
    ///
    /// OneDrive for Business only reports the QuickXorHash.
    pub fn checksum(&self) -> Option<&str> {
        let hashes = self.file.as_ref()?.hashes.as_ref()?;
        hashes
            .sha1_hash
            .as_deref()
            .or(hashes.quick_xor_hash.as_deref())
    }

    /// Whether the item is a folder.
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }
}

/// File facet of a drive item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    /// MIME type.
    #[serde(default)]
    pub mime_type: Option<String>,

    /// Content hashes.
    #[serde(default)]
    pub hashes: Option<Hashes>,
}

/// Content hashes computed by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashes {
    /// SHA-1 (personal accounts).
    #[serde(default)]
    pub sha1_hash: Option<String>,

    /// SHA-256 (personal accounts, some regions).
    #[serde(default)]
    pub sha256_hash: Option<String>,

    /// QuickXorHash (all accounts).
    #[serde(default)]
    pub quick_xor_hash: Option<String>,
}

/// Folder facet of a drive item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    /// Number of direct children.
    #[serde(default)]
    pub child_count: Option<u64>,
}

/// Body of a `createUploadSession` request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUploadSessionRequest {
    /// Item properties for the upload.
    pub item: UploadItemProperties,
}

impl CreateUploadSessionRequest {
    /// A session request that fails when the name is taken.
    pub fn fail_on_conflict() -> Self {
        Self {
            item: UploadItemProperties {
                conflict_behavior: CONFLICT_BEHAVIOR_FAIL.to_string(),
            },
        }
    }
}

/// Item properties sent with a session request.
#[derive(Debug, Clone, Serialize)]
pub struct UploadItemProperties {
    /// What to do when the name already exists.
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: String,
}

/// Server-side handle of a resumable upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Pre-authenticated URL that receives the blocks.
    pub upload_url: String,

    /// When the session expires.
    #[serde(default)]
    pub expiration_date_time: Option<DateTime<Utc>>,

    /// Ranges the service still expects.
    #[serde(default)]
    pub next_expected_ranges: Vec<String>,
}

/// Graph error envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorResponse {
    /// The error.
    pub error: GraphError,
}

/// Graph error object.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphError {
    /// Error code.
    pub code: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// More specific error.
    #[serde(default)]
    pub inner_error: Option<Box<GraphInnerError>>,
}

/// Nested Graph error.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInnerError {
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphErrorResponse {
    /// Parses a body as a Graph error, `None` if it is not one.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Whether this error, or its inner error, carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.error.code == code
            || self
                .error
                .inner_error
                .as_ref()
                .and_then(|inner| inner.code.as_deref())
                == Some(code)
    }
}

/// Lookup outcome for a named file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileLookup {
    /// The file exists.
    Found(DriveItem),
    /// No file with that name.
    NotFound,
}

impl FileLookup {
    /// Whether the file exists.
    pub fn exists(&self) -> bool {
        matches!(self, FileLookup::Found(_))
    }
}

/// Downloaded file contents.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// File bytes.
    pub data: Bytes,

    /// Content checksum from the item metadata, if reported.
    pub checksum: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_prefers_sha1() {
        let item: DriveItem = serde_json::from_str(
            r#"{"name":"a.txt","file":{"hashes":{"sha1Hash":"SHA","quickXorHash":"QX"}}}"#,
        )
        .unwrap();
        assert_eq!(item.checksum(), Some("SHA"));

        let item: DriveItem =
            serde_json::from_str(r#"{"name":"a.txt","file":{"hashes":{"quickXorHash":"QX"}}}"#)
                .unwrap();
        assert_eq!(item.checksum(), Some("QX"));

        let item: DriveItem =
            serde_json::from_str(r#"{"name":"f","folder":{"childCount":2}}"#).unwrap();
        assert_eq!(item.checksum(), None);
        assert!(item.is_folder());
    }

    #[test]
    fn test_session_request_body() {
        let body = serde_json::to_value(CreateUploadSessionRequest::fail_on_conflict()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"item": {"@microsoft.graph.conflictBehavior": "fail"}})
        );
    }

    #[test]
    fn test_upload_session_parse() {
        let session: UploadSession = serde_json::from_str(
            r#"{
                "uploadUrl": "https://sn3302.up.1drv.com/up/fe6987415ace7X4e1eF866337",
                "expirationDateTime": "2015-01-29T09:21:55.523Z",
                "nextExpectedRanges": ["0-"]
            }"#,
        )
        .unwrap();
        assert!(session.upload_url.starts_with("https://sn3302"));
        assert!(session.expiration_date_time.is_some());
        assert_eq!(session.next_expected_ranges, vec!["0-".to_string()]);
    }

    #[test]
    fn test_graph_error_codes() {
        let body = br#"{"error":{"code":"InvalidAuthenticationToken","message":"Access token has expired."}}"#;
        let error = GraphErrorResponse::parse(body).unwrap();
        assert!(error.has_code(INVALID_AUTHENTICATION_TOKEN));

        let body = br#"{"error":{"code":"conflict","message":"exists","innerError":{"code":"nameAlreadyExists"}}}"#;
        let error = GraphErrorResponse::parse(body).unwrap();
        assert!(error.has_code(NAME_ALREADY_EXISTS));

        assert!(GraphErrorResponse::parse(br#"{"id":"1"}"#).is_none());
        assert!(GraphErrorResponse::parse(b"").is_none());
    }
}

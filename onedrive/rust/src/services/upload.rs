//! Resumable upload sessions.
//!
//! Payloads above the direct-upload limit go through an upload session:
//!
//! 1. `POST .../approot:/{name}:/createUploadSession` returns a pre-authenticated
//!    upload URL.
//! 2. Each block is sent as `PUT {uploadUrl}` with
//!    `Content-Range: bytes {start}-{end}/{total}`. The service answers 202
//!    while it expects more and 200/201 with the item after the last block.
//!
//! The blocks of one upload share a single [`RefreshGuard`]. An expired token
//! that cannot be renewed aborts the upload; sessions are not resumed.
//!
//! # Example
//! ```no_run
//! use integrations_onedrive::OneDriveClient;
//! use bytes::Bytes;
//!
//! # async fn example(client: OneDriveClient) -> Result<(), Box<dyn std::error::Error>> {
//! let content = Bytes::from(vec![0u8; 20 * 1024 * 1024]);
//! let checksum = client
//!     .uploads()
//!     .upload_file_using_session("backup.zip", content)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use super::{checksum_of, item_path, FilesService};
use crate::chunking::UploadState;
use crate::client::{parse_json, RefreshGuard, RequestExecutor};
use crate::errors::{OneDriveError, OneDriveResult, UploadError};
use crate::transport::{HttpMethod, HttpResponse};
use crate::types::{CreateUploadSessionRequest, DriveItem, UploadSession};
use async_trait::async_trait;
use bytes::Bytes;
use mime::Mime;
use reqwest::header::{HeaderValue, CONTENT_RANGE};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Storage backends that upload large payloads in blocks.
#[async_trait]
pub trait ChunkedUploader: Send + Sync {
    /// Opens an upload session for `name`.
    async fn create_upload_session(&self, name: &str) -> OneDriveResult<UploadSession>;

    /// Sends every block of `data` described by `state` and returns the
    /// checksum of the completed item.
    async fn drive_upload(
        &self,
        session: &UploadSession,
        state: UploadState,
        data: Bytes,
    ) -> OneDriveResult<String>;
}

/// Service for session-based uploads.
#[derive(Clone)]
pub struct UploadService {
    executor: Arc<RequestExecutor>,
}

impl UploadService {
    /// Creates a new upload service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Creates a session and uploads `data` through it in blocks of the
    /// configured size.
    pub async fn upload_file_using_session(&self, name: &str, data: Bytes) -> OneDriveResult<String> {
        let config = self.executor.config();
        let state = UploadState::for_data(
            config.upload_block_size,
            &data,
            config.validate_block_alignment,
        )?;

        let mut guard = RefreshGuard::new();
        let session = self.create_session(name, &mut guard).await?;
        self.send_blocks(&session, state, data, &mut guard).await
    }

    /// Uploads `data`, directly when it fits the direct-upload limit and
    /// through a session otherwise.
    pub async fn upload(&self, name: &str, mime: &Mime, data: Bytes) -> OneDriveResult<String> {
        let limit = self.executor.config().direct_upload_limit;
        if data.len() as u64 <= limit {
            debug!(name = name, size = data.len(), "Using direct upload");
            FilesService::new(self.executor.clone())
                .upload_file(name, mime, data)
                .await
        } else {
            debug!(name = name, size = data.len(), "Using upload session");
            self.upload_file_using_session(name, data).await
        }
    }

    async fn create_session(
        &self,
        name: &str,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<UploadSession> {
        let path = format!("{}/createUploadSession", item_path(name)?);
        let request = self.executor.json_request(
            HttpMethod::Post,
            &path,
            &CreateUploadSessionRequest::fail_on_conflict(),
        )?;

        let session: UploadSession = self.executor.execute_json(request, guard).await?;

        info!(
            name = name,
            expires = ?session.expiration_date_time,
            "Upload session created"
        );

        Ok(session)
    }

    async fn send_blocks(
        &self,
        session: &UploadSession,
        mut state: UploadState,
        data: Bytes,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<String> {
        if data.len() as u64 != state.total_bytes() {
            return Err(UploadError::SizeMismatch(format!(
                "Payload has {} bytes, upload state expects {}",
                data.len(),
                state.total_bytes()
            ))
            .into());
        }

        if state.total_bytes() == 0 {
            return Err(UploadError::EmptyRange(
                "Upload sessions cannot carry an empty payload".to_string(),
            )
            .into());
        }

        let url = Url::parse(&session.upload_url)
            .map_err(|e| OneDriveError::deserialization(format!("Invalid upload URL: {}", e)))?;

        info!(
            total_bytes = state.total_bytes(),
            blocks = state.plan().total_blocks(),
            "Starting session upload"
        );

        loop {
            let response = self.send_block(&url, &state, &data, guard).await?;

            if !state.advance() {
                return self.finish(response, &state);
            }
        }
    }

    async fn send_block(
        &self,
        url: &Url,
        state: &UploadState,
        data: &Bytes,
        guard: &mut RefreshGuard,
    ) -> OneDriveResult<HttpResponse> {
        let range = state.current_range();
        let content_range = state.content_range_header()?;

        let mut request = self.executor.request_to(HttpMethod::Put, url.clone());
        let header = HeaderValue::from_str(&content_range)
            .map_err(|e| OneDriveError::request(format!("Invalid Content-Range: {}", e)))?;
        request.headers.insert(CONTENT_RANGE, header);
        request.body = Some(data.slice(range.start as usize..range.end as usize));

        debug!(
            start = range.start,
            end = range.end,
            total = state.total_bytes(),
            "Uploading block"
        );

        let response = self.executor.execute(request, guard).await?;

        self.executor.check_response(response).map_err(|e| {
            if e.is_not_found() {
                warn!("Upload session expired");
                UploadError::SessionExpired(e.to_string()).into()
            } else {
                e
            }
        })
    }

    fn finish(&self, response: HttpResponse, state: &UploadState) -> OneDriveResult<String> {
        if response.status == StatusCode::ACCEPTED {
            warn!(
                total_bytes = state.total_bytes(),
                "Last block accepted but upload not completed"
            );
            return Err(UploadError::IncompleteSession(response.body_text()).into());
        }

        let item: DriveItem = parse_json(&response)?;
        info!(
            name = item.name.as_deref().unwrap_or_default(),
            total_bytes = state.total_bytes(),
            "Session upload completed"
        );
        checksum_of(&item)
    }
}

#[async_trait]
impl ChunkedUploader for UploadService {
    async fn create_upload_session(&self, name: &str) -> OneDriveResult<UploadSession> {
        self.create_session(name, &mut RefreshGuard::new()).await
    }

    async fn drive_upload(
        &self,
        session: &UploadSession,
        state: UploadState,
        data: Bytes,
    ) -> OneDriveResult<String> {
        self.send_blocks(session, state, data, &mut RefreshGuard::new())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MicrosoftCredentials;
    use crate::config::OneDriveConfig;
    use crate::mocks::{MockResponse, MockTransport, TestFixtures};
    use tokio::sync::Mutex;

    const UPLOAD_URL: &str = "https://sn3302.up.1drv.com/up/fe6987415ace7X4e1eF866337";

    struct Harness {
        uploads: UploadService,
        graph: Arc<MockTransport>,
        identity: Arc<MockTransport>,
    }

    fn harness(graph: Vec<MockResponse>, identity: Vec<MockResponse>) -> Harness {
        let config = OneDriveConfig::builder()
            .upload_block_size(100)
            .validate_block_alignment(false)
            .direct_upload_limit(150)
            .build()
            .unwrap();
        let graph = Arc::new(MockTransport::with_responses(graph));
        let identity = Arc::new(MockTransport::with_responses(identity));
        let credentials =
            MicrosoftCredentials::new(TestFixtures::identity(), &config, identity.clone())
                .unwrap()
                .with_tokens(TestFixtures::token_pair());
        let executor =
            RequestExecutor::new(config, graph.clone(), Arc::new(Mutex::new(credentials)));
        Harness {
            uploads: UploadService::new(Arc::new(executor)),
            graph,
            identity,
        }
    }

    fn session_created() -> MockResponse {
        MockResponse::ok_with_body(TestFixtures::upload_session_json(UPLOAD_URL))
    }

    fn completed(size: u64) -> MockResponse {
        MockResponse::json(201, &TestFixtures::drive_item_json("big.bin", size))
    }

    fn content_ranges(graph: &MockTransport) -> Vec<String> {
        graph
            .requests()
            .iter()
            .filter_map(|r| r.headers.get(CONTENT_RANGE))
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_session_upload_sends_contiguous_blocks() {
        let h = harness(
            vec![
                session_created(),
                MockResponse::accepted(),
                MockResponse::accepted(),
                completed(250),
            ],
            vec![],
        );
        let data = Bytes::from((0..250u32).map(|i| i as u8).collect::<Vec<_>>());

        let checksum = h
            .uploads
            .upload_file_using_session("big.bin", data.clone())
            .await
            .unwrap();

        assert_eq!(checksum, "A94A8FE5CCB19BA61C4C0873D391E987982FBBD3");
        assert_eq!(h.graph.request_count(), 4);
        assert_eq!(
            content_ranges(&h.graph),
            vec!["bytes 0-99/250", "bytes 100-199/250", "bytes 200-249/250"]
        );

        let requests = h.graph.requests();
        assert!(requests[0]
            .url
            .as_str()
            .ends_with("/me/drive/special/approot:/big.bin:/createUploadSession"));
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body_bytes()).unwrap();
        assert_eq!(body["item"]["@microsoft.graph.conflictBehavior"], "fail");

        let mut reassembled = Vec::new();
        for request in &requests[1..] {
            assert_eq!(request.url.as_str(), UPLOAD_URL);
            reassembled.extend_from_slice(&request.body_bytes());
        }
        assert_eq!(Bytes::from(reassembled), data);
    }

    #[tokio::test]
    async fn test_single_partial_block() {
        let h = harness(vec![session_created(), completed(99)], vec![]);

        h.uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![1u8; 99]))
            .await
            .unwrap();

        assert_eq!(content_ranges(&h.graph), vec!["bytes 0-98/99"]);
    }

    #[tokio::test]
    async fn test_expiry_mid_upload_refreshes_once_and_replays_block() {
        let h = harness(
            vec![
                session_created(),
                MockResponse::error(401, TestFixtures::expired_token_body()),
                MockResponse::accepted(),
                completed(199),
            ],
            vec![MockResponse::ok_with_body(TestFixtures::token_response_body(
                "a2", "r2",
            ))],
        );

        h.uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![0u8; 199]))
            .await
            .unwrap();

        assert_eq!(h.identity.request_count(), 1);
        assert_eq!(
            content_ranges(&h.graph),
            vec!["bytes 0-99/199", "bytes 0-99/199", "bytes 100-198/199"]
        );
    }

    #[tokio::test]
    async fn test_second_expiry_in_same_upload_aborts() {
        let h = harness(
            vec![
                session_created(),
                MockResponse::error(401, TestFixtures::expired_token_body()),
                MockResponse::accepted(),
                MockResponse::error(401, TestFixtures::expired_token_body()),
            ],
            vec![MockResponse::ok_with_body(TestFixtures::token_response_body(
                "a2", "r2",
            ))],
        );

        let result = h
            .uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![0u8; 199]))
            .await;

        assert!(matches!(
            result,
            Err(OneDriveError::AccessTokenRevokedOrExpired(_))
        ));
        assert_eq!(h.identity.request_count(), 1);
        assert_eq!(h.graph.request_count(), 4);
    }

    #[tokio::test]
    async fn test_conflict_on_session_creation() {
        let h = harness(
            vec![MockResponse::error(
                409,
                TestFixtures::graph_error_body("nameAlreadyExists", "Name already exists"),
            )],
            vec![],
        );

        let result = h
            .uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![0u8; 199]))
            .await;

        assert!(matches!(result, Err(OneDriveError::AlreadyUploaded(_))));
        assert_eq!(h.graph.request_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_session() {
        let h = harness(
            vec![session_created(), MockResponse::error(404, "")],
            vec![],
        );

        let result = h
            .uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![0u8; 199]))
            .await;

        assert!(matches!(
            result,
            Err(OneDriveError::Upload(UploadError::SessionExpired(_)))
        ));
    }

    #[tokio::test]
    async fn test_incomplete_session() {
        let h = harness(
            vec![session_created(), MockResponse::accepted()],
            vec![],
        );

        let result = h
            .uploads
            .upload_file_using_session("big.bin", Bytes::from(vec![0u8; 50]))
            .await;

        assert!(matches!(
            result,
            Err(OneDriveError::Upload(UploadError::IncompleteSession(_)))
        ));
    }

    #[tokio::test]
    async fn test_drive_upload_validates_payload() {
        let h = harness(vec![], vec![]);
        let session: UploadSession =
            serde_json::from_str(&TestFixtures::upload_session_json(UPLOAD_URL)).unwrap();

        let state = UploadState::new(100, 10, false).unwrap();
        let result = h
            .uploads
            .drive_upload(&session, state, Bytes::from(vec![0u8; 11]))
            .await;
        assert!(matches!(
            result,
            Err(OneDriveError::Upload(UploadError::SizeMismatch(_)))
        ));

        let state = UploadState::new(100, 0, false).unwrap();
        let result = h.uploads.drive_upload(&session, state, Bytes::new()).await;
        assert!(matches!(
            result,
            Err(OneDriveError::Upload(UploadError::EmptyRange(_)))
        ));

        assert_eq!(h.graph.request_count(), 0);
    }

    #[tokio::test]
    async fn test_chunked_uploader_trait() {
        let h = harness(vec![session_created(), completed(10)], vec![]);
        let uploader: &dyn ChunkedUploader = &h.uploads;

        let session = uploader.create_upload_session("big.bin").await.unwrap();
        assert_eq!(session.upload_url, UPLOAD_URL);

        let state = UploadState::new(100, 10, false).unwrap();
        let checksum = uploader
            .drive_upload(&session, state, Bytes::from(vec![0u8; 10]))
            .await
            .unwrap();
        assert_eq!(checksum, "A94A8FE5CCB19BA61C4C0873D391E987982FBBD3");
    }

    #[tokio::test]
    async fn test_upload_chooses_strategy_by_size() {
        let h = harness(
            vec![
                completed(150),
                session_created(),
                MockResponse::accepted(),
                completed(151),
            ],
            vec![],
        );

        h.uploads
            .upload("small.bin", &mime::APPLICATION_OCTET_STREAM, Bytes::from(vec![0u8; 150]))
            .await
            .unwrap();
        assert!(h.graph.requests()[0].url.path().ends_with(":/content"));

        h.uploads
            .upload("big.bin", &mime::APPLICATION_OCTET_STREAM, Bytes::from(vec![0u8; 151]))
            .await
            .unwrap();
        assert_eq!(h.graph.request_count(), 4);
        assert!(h.graph.requests()[1]
            .url
            .path()
            .ends_with(":/createUploadSession"));
    }
}

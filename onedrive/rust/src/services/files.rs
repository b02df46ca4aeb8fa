//! File operations in the application folder.
//!
//! Every public method is one top-level call with its own
//! [`RefreshGuard`]: an expired access token is refreshed at most once per
//! call and the call is replayed.

use super::{checksum_of, item_path, APP_FOLDER_PATH};
use crate::client::{parse_json, RefreshGuard, RequestExecutor};
use crate::errors::{OneDriveError, OneDriveResult, UploadError};
use crate::transport::HttpMethod;
use crate::types::{DownloadedFile, DriveItem, FileLookup};
use bytes::Bytes;
use mime::Mime;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use std::sync::Arc;
use tracing::{debug, info};

/// Service for file operations.
#[derive(Clone)]
pub struct FilesService {
    executor: Arc<RequestExecutor>,
}

impl FilesService {
    /// Creates a new files service.
    pub(crate) fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Uploads `data` with a single PUT and returns its checksum.
    ///
    /// Fails with [`OneDriveError::AlreadyUploaded`] when `name` exists and
    /// with [`UploadError::UploadSizeExceeded`] above the direct-upload limit.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use integrations_onedrive::*;
    /// # async fn example(client: OneDriveClient) -> OneDriveResult<()> {
    /// let checksum = client
    ///     .files()
    ///     .upload_file("notes.txt", &mime::TEXT_PLAIN, bytes::Bytes::from("hello"))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn upload_file(&self, name: &str, mime: &Mime, data: Bytes) -> OneDriveResult<String> {
        let limit = self.executor.config().direct_upload_limit;
        if data.len() as u64 > limit {
            return Err(UploadError::UploadSizeExceeded(format!(
                "{} bytes exceeds the direct upload limit of {} bytes",
                data.len(),
                limit
            ))
            .into());
        }

        let path = format!("{}/content", item_path(name)?);
        let mut request = self.executor.request(HttpMethod::Put, &path)?;
        request
            .url
            .set_query(Some("@microsoft.graph.conflictBehavior=fail"));
        let content_type = HeaderValue::from_str(mime.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        request.headers.insert(CONTENT_TYPE, content_type);
        let size = data.len();
        request.body = Some(data);

        debug!(name = name, size = size, "Uploading file");

        let item: DriveItem = self
            .executor
            .execute_json(request, &mut RefreshGuard::new())
            .await?;

        info!(name = name, size = size, "File uploaded");
        checksum_of(&item)
    }

    /// Looks up `name`; a missing file is [`FileLookup::NotFound`].
    pub async fn check_for_file(&self, name: &str) -> OneDriveResult<FileLookup> {
        let mut guard = RefreshGuard::new();
        match self.get_item(name, &mut guard).await {
            Ok(item) => Ok(FileLookup::Found(item)),
            Err(e) if e.is_not_found() => Ok(FileLookup::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Whether `name` exists.
    pub async fn lookup_file(&self, name: &str) -> OneDriveResult<bool> {
        Ok(self.check_for_file(name).await?.exists())
    }

    /// Downloads `name` together with its checksum.
    pub async fn download_file(&self, name: &str) -> OneDriveResult<DownloadedFile> {
        let mut guard = RefreshGuard::new();
        let item = self.get_item(name, &mut guard).await?;

        let path = format!("{}/content", item_path(name)?);
        let request = self.executor.request(HttpMethod::Get, &path)?;
        let response = self.executor.execute_checked(request, &mut guard).await?;

        debug!(name = name, size = response.body.len(), "File downloaded");

        Ok(DownloadedFile {
            data: response.body,
            checksum: item.checksum().map(str::to_string),
        })
    }

    /// Deletes `name`.
    pub async fn delete_file(&self, name: &str) -> OneDriveResult<()> {
        let request = self.executor.request(HttpMethod::Delete, &item_path(name)?)?;
        self.executor
            .execute_checked(request, &mut RefreshGuard::new())
            .await?;
        info!(name = name, "File deleted");
        Ok(())
    }

    /// Deletes an item by id.
    pub async fn delete_item(&self, item_id: &str) -> OneDriveResult<()> {
        if item_id.trim().is_empty() {
            return Err(OneDriveError::request("Item id is empty"));
        }
        let path = format!("me/drive/items/{}", item_id);
        let request = self.executor.request(HttpMethod::Delete, &path)?;
        self.executor
            .execute_checked(request, &mut RefreshGuard::new())
            .await?;
        info!(item_id = item_id, "Item deleted");
        Ok(())
    }

    /// Returns the application folder, which Graph creates on first access.
    pub async fn create_app_folder(&self) -> OneDriveResult<DriveItem> {
        let request = self.executor.request(HttpMethod::Get, APP_FOLDER_PATH)?;
        let response = self
            .executor
            .execute_checked(request, &mut RefreshGuard::new())
            .await?;
        parse_json(&response)
    }

    async fn get_item(&self, name: &str, guard: &mut RefreshGuard) -> OneDriveResult<DriveItem> {
        let request = self.executor.request(HttpMethod::Get, &item_path(name)?)?;
        self.executor.execute_json(request, guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MicrosoftCredentials;
    use crate::config::OneDriveConfig;
    use crate::mocks::{MockResponse, MockTransport, TestFixtures};
    use tokio::sync::Mutex;

    fn service(responses: Vec<MockResponse>) -> (FilesService, Arc<MockTransport>) {
        let config = OneDriveConfig::builder()
            .direct_upload_limit(16)
            .build()
            .unwrap();
        let graph = Arc::new(MockTransport::with_responses(responses));
        let identity = Arc::new(MockTransport::new());
        let credentials = MicrosoftCredentials::new(TestFixtures::identity(), &config, identity)
            .unwrap()
            .with_tokens(TestFixtures::token_pair());
        let executor = RequestExecutor::new(config, graph.clone(), Arc::new(Mutex::new(credentials)));
        (FilesService::new(Arc::new(executor)), graph)
    }

    fn item(name: &str) -> MockResponse {
        MockResponse::json(201, &TestFixtures::drive_item_json(name, 5))
    }

    #[tokio::test]
    async fn test_upload_file() {
        let (files, graph) = service(vec![item("a.txt")]);

        let checksum = files
            .upload_file("a.txt", &mime::TEXT_PLAIN, Bytes::from("hello"))
            .await
            .unwrap();

        assert_eq!(checksum, "A94A8FE5CCB19BA61C4C0873D391E987982FBBD3");
        let request = graph.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(
            request.url.as_str(),
            "https://graph.microsoft.com/v1.0/me/drive/special/approot:/a.txt:/content?@microsoft.graph.conflictBehavior=fail"
        );
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(request.body_bytes(), Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_upload_file_conflict() {
        let (files, _) = service(vec![MockResponse::error(
            409,
            TestFixtures::graph_error_body("nameAlreadyExists", "Name already exists"),
        )]);

        let result = files
            .upload_file("a.txt", &mime::TEXT_PLAIN, Bytes::from("hello"))
            .await;

        assert!(matches!(result, Err(OneDriveError::AlreadyUploaded(_))));
    }

    #[tokio::test]
    async fn test_upload_file_over_limit() {
        let (files, graph) = service(vec![]);

        let result = files
            .upload_file("a.bin", &mime::APPLICATION_OCTET_STREAM, Bytes::from(vec![0u8; 17]))
            .await;

        assert!(matches!(
            result,
            Err(OneDriveError::Upload(UploadError::UploadSizeExceeded(_)))
        ));
        assert_eq!(graph.request_count(), 0);
    }

    #[tokio::test]
    async fn test_check_for_file() {
        let (files, _) = service(vec![
            MockResponse::json(200, &TestFixtures::drive_item_json("a.txt", 5)),
            MockResponse::error(
                404,
                TestFixtures::graph_error_body("itemNotFound", "The resource could not be found."),
            ),
        ]);

        match files.check_for_file("a.txt").await.unwrap() {
            FileLookup::Found(item) => assert_eq!(item.name.as_deref(), Some("a.txt")),
            FileLookup::NotFound => panic!("expected file"),
        }
        assert!(!files.lookup_file("missing.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_file() {
        let (files, graph) = service(vec![
            MockResponse::json(200, &TestFixtures::drive_item_json("a.txt", 5)),
            MockResponse::ok_with_body("hello"),
        ]);

        let downloaded = files.download_file("a.txt").await.unwrap();

        assert_eq!(downloaded.data, Bytes::from("hello"));
        assert_eq!(
            downloaded.checksum.as_deref(),
            Some("A94A8FE5CCB19BA61C4C0873D391E987982FBBD3")
        );
        assert!(graph.last_request().unwrap().url.path().ends_with(":/content"));
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (files, _) = service(vec![MockResponse::error(404, "")]);
        let result = files.download_file("missing.txt").await;
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_delete() {
        let (files, graph) = service(vec![
            MockResponse::no_content(),
            MockResponse::no_content(),
            MockResponse::error(404, ""),
        ]);

        files.delete_file("a.txt").await.unwrap();
        assert_eq!(graph.last_request().unwrap().method, HttpMethod::Delete);

        files.delete_item("01BYE5RZ").await.unwrap();
        assert!(graph
            .last_request()
            .unwrap()
            .url
            .as_str()
            .ends_with("/me/drive/items/01BYE5RZ"));

        let result = files.delete_file("a.txt").await;
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[tokio::test]
    async fn test_create_app_folder() {
        let (files, graph) = service(vec![MockResponse::json(
            200,
            &serde_json::json!({"id": "root-id", "name": "MyApp", "folder": {"childCount": 0}}),
        )]);

        let folder = files.create_app_folder().await.unwrap();

        assert!(folder.is_folder());
        assert!(graph
            .last_request()
            .unwrap()
            .url
            .as_str()
            .ends_with("/me/drive/special/approot"));
    }
}

use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// MIME types accepted for post images and attachments, with the extension used in the key.
const ALLOWED_UPLOADS: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

const PRESIGN_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Contract for the object storage layer holding recruitment post images.
/// `S3StorageClient` talks to S3/MinIO; `MockStorageService` serves tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the configured bucket if needed. Called once at startup in local mode.
    async fn ensure_bucket_exists(&self);

    /// Signs a short-lived PUT URL for `key`, pinned to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

/// S3StorageClient
///
/// `aws-sdk-s3` client with path-style addressing, as MinIO requires.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            // Already-exists errors land here too.
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket did not succeed");
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(PRESIGN_TTL).map_err(|e| e.to_string())?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// Returns the key extension for an accepted MIME type.
pub fn upload_extension(content_type: &str) -> Option<&'static str> {
    ALLOWED_UPLOADS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type.trim()))
        .map(|(_, ext)| *ext)
}

/// Builds a fresh object key under `posts/`. The extension comes from the MIME type,
/// never from the client's filename.
pub fn new_upload_key(content_type: &str) -> Option<String> {
    upload_extension(content_type).map(|ext| format!("posts/{}.{}", Uuid::new_v4(), ext))
}

/// Strips `..`, `.` and empty segments from a key.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// Deterministic in-process storage for tests; `should_fail` simulates an outage.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("mock storage error".to_string());
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

pub type StorageState = Arc<dyn StorageService>;

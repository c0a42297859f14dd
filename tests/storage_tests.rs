use backoffice::storage::{
    MockStorageService, S3StorageClient, StorageService, new_upload_key, upload_extension,
};

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_allowed_upload_types() {
        assert_eq!(upload_extension("image/png"), Some("png"));
        assert_eq!(upload_extension("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(upload_extension(" application/pdf "), Some("pdf"));
        assert_eq!(upload_extension("image/webp"), Some("webp"));
        assert_eq!(upload_extension("video/mp4"), None);
        assert_eq!(upload_extension("text/html"), None);
    }

    #[test]
    fn test_upload_keys_are_fresh_and_typed() {
        let a = new_upload_key("image/png").unwrap();
        let b = new_upload_key("image/png").unwrap();
        assert!(a.starts_with("posts/"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
        assert!(new_upload_key("application/x-msdownload").is_none());
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "posts/poster.png";
        let url = mock.get_presigned_upload_url(key, "image/png").await.unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("posts/a.png", "image/png").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "text/plain")
            .await
            .unwrap();

        assert!(!url.contains(".."));
        assert!(url.contains("mock-bucket/etc/passwd"));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    // Presigning is computed locally; no storage server is contacted.
    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await;

        let key = "posts/0b6f7c1e-notice.pdf";
        let url = client
            .get_presigned_upload_url(key, "application/pdf")
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:9000/testbucket/"));
        assert!(url.contains(key));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}

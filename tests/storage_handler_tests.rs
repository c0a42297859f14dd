use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use backoffice::{
    AppConfig, AppState, InMemoryRepository, create_router,
    access::Role,
    models::{PresignedUrlRequest, PresignedUrlResponse},
    repository::{NewUser, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

async fn app_with(storage: MockStorageService) -> (axum::Router, Uuid, Uuid) {
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let mut ids = Vec::new();
    for (email, role) in [("deo@example.com", Role::Deo), ("staff@example.com", Role::Staff)] {
        let user = repo
            .create_user(NewUser {
                name: email.to_string(),
                email: email.to_string(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .unwrap();
        ids.push(user.id);
    }

    let state = AppState {
        repo,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    };
    (create_router(state), ids[0], ids[1])
}

fn presign_request(user_id: Option<Uuid>, file_type: &str) -> Request<Body> {
    let payload = PresignedUrlRequest {
        filename: "poster.png".to_string(),
        file_type: file_type.to_string(),
    };
    let mut builder = Request::builder()
        .method("POST")
        .uri("/upload/presigned")
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        // Local-mode bypass header.
        builder = builder.header("x-user-id", id.to_string());
    }
    builder
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_presigned_url_success() {
    let (app, deo, _) = app_with(MockStorageService::new()).await;

    let response = app
        .oneshot(presign_request(Some(deo), "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: PresignedUrlResponse = serde_json::from_slice(&bytes).unwrap();

    assert!(body.resource_key.starts_with("posts/"));
    assert!(body.resource_key.ends_with(".png"));
    assert!(body.upload_url.contains(&body.resource_key));
}

#[tokio::test]
async fn test_presigned_url_rejects_unsupported_type() {
    let (app, deo, _) = app_with(MockStorageService::new()).await;

    let response = app
        .oneshot(presign_request(Some(deo), "application/x-sh"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_presigned_url_storage_failure() {
    let (app, deo, _) = app_with(MockStorageService::new_failing()).await;

    let response = app
        .oneshot(presign_request(Some(deo), "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    // Storage details are not leaked.
    assert_eq!(body["message"], "internal server error");
}

#[tokio::test]
async fn test_presigned_url_requires_deo_role() {
    let (app, _, staff) = app_with(MockStorageService::new()).await;

    let response = app
        .clone()
        .oneshot(presign_request(Some(staff), "image/png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(presign_request(None, "image/png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

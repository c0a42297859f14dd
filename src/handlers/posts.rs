use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    access::Capability,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CreatePostRequest, PresignedUrlRequest, PresignedUrlResponse, PublishPostRequest,
        RecruitmentPost, SearchQuery, UpdatePostRequest,
    },
    poster::Poster,
    repository::RepositoryState,
    storage::new_upload_key,
};

async fn published_post(repo: &RepositoryState, id: Uuid) -> AppResult<RecruitmentPost> {
    repo.get_post(id)
        .await?
        .filter(|post| post.is_published)
        .ok_or(AppError::NotFound)
}

// --- Public ---

/// list_published_posts
///
/// [Public Route] Published posts only, newest first.
#[utoipa::path(
    get,
    path = "/posts",
    tag = "posts",
    params(SearchQuery),
    responses((status = 200, description = "Published posts", body = [RecruitmentPost]))
)]
pub async fn list_published_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<RecruitmentPost>>> {
    Ok(Json(state.repo.list_posts(true, query.search).await?))
}

/// get_published_post
///
/// [Public Route] Unpublished posts look exactly like missing ones.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = RecruitmentPost),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_published_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecruitmentPost>> {
    Ok(Json(published_post(&state.repo, id).await?))
}

/// get_published_poster
///
/// [Public Route] Poster layout for a published post, dated today (UTC).
#[utoipa::path(
    get,
    path = "/posts/{id}/poster",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Poster", body = Poster),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_published_poster(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Poster>> {
    let post = published_post(&state.repo, id).await?;
    Ok(Json(Poster::build(&post, Utc::now().date_naive())))
}

// --- Management ---

/// list_all_posts
///
/// [DEO Route] Drafts included.
#[utoipa::path(
    get,
    path = "/manage/posts",
    tag = "posts",
    params(SearchQuery),
    responses((status = 200, description = "All posts", body = [RecruitmentPost]))
)]
pub async fn list_all_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<RecruitmentPost>>> {
    auth.require(Capability::ManagePosts)?;
    Ok(Json(state.repo.list_posts(false, query.search).await?))
}

/// create_post
///
/// [DEO Route] New posts start unpublished.
#[utoipa::path(
    post,
    path = "/manage/posts",
    tag = "posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = RecruitmentPost),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<RecruitmentPost>)> {
    auth.require(Capability::ManagePosts)?;
    payload.validate()?;

    let post = state.repo.create_post(payload, auth.id).await?;
    tracing::info!(post_id = %post.id, created_by = %auth.id, "recruitment post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[utoipa::path(
    put,
    path = "/manage/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = RecruitmentPost),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<Json<RecruitmentPost>> {
    auth.require(Capability::ManagePosts)?;
    payload.validate()?;

    let post = state
        .repo
        .update_post(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// preview_poster
///
/// [DEO Route] Same layout as the public poster, for drafts too.
#[utoipa::path(
    get,
    path = "/manage/posts/{id}/poster",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Poster preview", body = Poster),
        (status = 404, description = "Not Found")
    )
)]
pub async fn preview_poster(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Poster>> {
    auth.require(Capability::ManagePosts)?;
    let post = state.repo.get_post(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(Poster::build(&post, Utc::now().date_naive())))
}

/// publish_post
///
/// [Admin Route] Shows or hides a post on the public listing.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}/publish",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = PublishPostRequest,
    responses(
        (status = 200, description = "Updated", body = RecruitmentPost),
        (status = 404, description = "Not Found")
    )
)]
pub async fn publish_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PublishPostRequest>,
) -> AppResult<Json<RecruitmentPost>> {
    auth.require(Capability::PublishPosts)?;

    let post = state
        .repo
        .set_post_published(id, payload.is_published)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(post_id = %id, is_published = post.is_published, "post visibility changed");
    Ok(Json(post))
}

#[utoipa::path(
    delete,
    path = "/admin/posts/{id}",
    tag = "posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(Capability::PublishPosts)?;
    if !state.repo.delete_post(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id = %id, deleted_by = %auth.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// get_presigned_url
///
/// [DEO Route] Signs a 10-minute PUT URL so the browser can upload a post image or
/// PDF straight to object storage. The key is generated here from the MIME type;
/// the client's filename is only logged.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    tag = "posts",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Unsupported file type")
    )
)]
pub async fn get_presigned_url(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    auth.require(Capability::UploadFiles)?;

    let object_key = new_upload_key(&payload.file_type).ok_or_else(|| {
        AppError::Validation(format!("unsupported file type '{}'", payload.file_type))
    })?;

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, payload.file_type.trim())
        .await
        .map_err(|e| AppError::internal(format!("presigning failed: {e}")))?;

    tracing::debug!(user_id = %auth.id, filename = %payload.filename, key = %object_key, "issued upload url");
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

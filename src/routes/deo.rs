use crate::{
    AppState,
    handlers::{clients, posts},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Data-Entry Router Module
///
/// Client records and post drafting, open to data-entry operators and
/// administrators. Guarded by `deo_guard`.
pub fn deo_routes() -> Router<AppState> {
    Router::new()
        // GET /clients?search=... and POST /clients
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route("/clients/{id}", get(clients::get_client).put(clients::update_client))
        // Drafts and published posts alike.
        .route("/manage/posts", get(posts::list_all_posts).post(posts::create_post))
        .route("/manage/posts/{id}", put(posts::update_post))
        .route("/manage/posts/{id}/poster", get(posts::preview_poster))
        // POST /upload/presigned
        // Short-lived S3 PUT URL for a post image or PDF.
        .route("/upload/presigned", post(posts::get_presigned_url))
}

use crate::{AppState, handlers::{posts, session}};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Post handlers here only ever return
/// published posts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /login shows the sign-in page (or bounces signed-in users home),
        // POST /login verifies credentials and sets the session cookie.
        .route("/login", get(session::login_page).post(session::login))
        .route("/logout", post(session::logout))
        // GET /posts?search=...
        .route("/posts", get(posts::list_published_posts))
        .route("/posts/{id}", get(posts::get_published_post))
        // GET /posts/{id}/poster
        // Structured poster plus share text for messaging apps.
        .route("/posts/{id}/poster", get(posts::get_published_poster))
}

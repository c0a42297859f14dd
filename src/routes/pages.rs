use crate::{AppState, handlers::pages};
use axum::{Router, routing::get};

/// Front Controller Router
///
/// Every page of the back-office is opened through `/app/{page}`. The handler
/// checks the session and the role's page whitelist itself and answers with a
/// redirect rather than an error, so no auth layer sits in front of it.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/app", get(pages::app_root))
        .route("/app/{page}", get(pages::app_page))
}

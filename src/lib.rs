use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod poster;
pub mod repository;
pub mod storage;
pub mod workflow;

// Routers grouped by access level.
pub mod routes;
use access::Capability;
use auth::AuthUser;
use routes::{admin, authenticated, deo, pages, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document assembled from the `#[utoipa::path]` handlers, served at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::session::login, handlers::session::logout, handlers::session::login_page,
        handlers::pages::app_root, handlers::pages::app_page,
        handlers::users::get_me, handlers::users::change_my_password,
        handlers::users::list_users, handlers::users::create_user,
        handlers::users::update_user, handlers::users::reset_password,
        handlers::tasks::list_tasks, handlers::tasks::create_task,
        handlers::tasks::update_task, handlers::tasks::delete_task,
        handlers::tasks::review_task, handlers::tasks::my_tasks,
        handlers::tasks::update_task_status,
        handlers::clients::list_clients, handlers::clients::get_client,
        handlers::clients::create_client, handlers::clients::update_client,
        handlers::clients::delete_client,
        handlers::posts::list_published_posts, handlers::posts::get_published_post,
        handlers::posts::get_published_poster, handlers::posts::list_all_posts,
        handlers::posts::create_post, handlers::posts::update_post,
        handlers::posts::preview_poster, handlers::posts::publish_post,
        handlers::posts::delete_post, handlers::posts::get_presigned_url,
        handlers::withdrawals::my_withdrawals, handlers::withdrawals::my_balance,
        handlers::withdrawals::request_withdrawal, handlers::withdrawals::cancel_withdrawal,
        handlers::withdrawals::list_withdrawals, handlers::withdrawals::review_withdrawal,
        handlers::dashboard::get_admin_stats, handlers::dashboard::get_dashboard
    ),
    components(
        schemas(
            access::Role, access::Page, workflow::TaskStatus, workflow::WithdrawalStatus,
            workflow::PayoutMethod, models::User, models::Task, models::Client,
            models::RecruitmentPost, models::Withdrawal, models::Balance,
            models::AdminDashboardStats, models::WorkerDashboard, models::TaskCounts,
            models::Dashboard, models::PageView, models::NavEntry, poster::Poster,
            poster::PosterLine, error::ErrorResponse,
        )
    ),
    tags(
        (name = "backoffice", description = "Back-office portal API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for the services every handler needs.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of the state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Requires a valid session. The `AuthUser` extractor rejects with 401 before the
/// handler runs and caches the resolved user in the request extensions.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// deo_guard
///
/// Session plus a role that manages clients and posts (admin or deo); 403 otherwise.
async fn deo_guard(auth_user: AuthUser, request: Request, next: Next) -> Response {
    match auth_user.require(Capability::ManageClients) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// admin_guard
///
/// Session plus the admin role; 403 otherwise.
async fn admin_guard(auth_user: AuthUser, request: Request, next: Next) -> Response {
    match auth_user.require(Capability::ManageUsers) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// create_router
///
/// Assembles every route group with its guard, then wraps the whole app in the
/// observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(pages::page_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            deo::deo_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), deo_guard)),
        )
        .nest(
            "/admin",
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_guard)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the `x-request-id` set above, so
/// every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

use crate::{
    AppState,
    handlers::{clients, dashboard, posts, tasks, users, withdrawals},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Admin Router Module
///
/// Routes for administrators only, nested under `/admin` and guarded by
/// `admin_guard`. Handlers re-check the matching capability as well.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        .route("/stats", get(dashboard::get_admin_stats))
        // --- Users ---
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}/password", put(users::reset_password))
        // --- Tasks ---
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/tasks/{id}", put(tasks::update_task).delete(tasks::delete_task))
        // POST /admin/tasks/{id}/review
        // Approves or rejects a submitted task; approval credits the reward.
        .route("/tasks/{id}/review", post(tasks::review_task))
        // --- Clients & posts ---
        .route("/clients/{id}", delete(clients::delete_client))
        .route("/posts/{id}/publish", put(posts::publish_post))
        .route("/posts/{id}", delete(posts::delete_post))
        // --- Withdrawals ---
        .route("/withdrawals", get(withdrawals::list_withdrawals))
        .route("/withdrawals/{id}/review", post(withdrawals::review_withdrawal))
}

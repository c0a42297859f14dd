use crate::{
    AppState,
    handlers::{dashboard, tasks, users, withdrawals},
};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Wrapped in `auth_middleware`, which resolves the
/// session once and caches the `AuthUser` for the handler. Handlers still check
/// capabilities (e.g. only workers have task lists and balances).
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Profile ---
        .route("/me", get(users::get_me))
        .route("/me/password", put(users::change_my_password))
        // GET /dashboard
        // Role-aware summary: system counters for admins, own tasks and balance otherwise.
        .route("/dashboard", get(dashboard::get_dashboard))
        // --- Assigned work ---
        .route("/tasks/mine", get(tasks::my_tasks))
        // PATCH /tasks/{id}/status
        // Assignee moves the task along; non-assignees get 404.
        .route("/tasks/{id}/status", patch(tasks::update_task_status))
        // --- Withdrawals ---
        .route("/withdrawals", post(withdrawals::request_withdrawal))
        .route("/withdrawals/mine", get(withdrawals::my_withdrawals))
        .route("/withdrawals/balance", get(withdrawals::my_balance))
        .route("/withdrawals/{id}/cancel", post(withdrawals::cancel_withdrawal))
}

use axum::{Json, extract::State};

use crate::{
    AppState,
    access::{Capability, Role},
    auth::AuthUser,
    error::AppResult,
    models::{AdminDashboardStats, Dashboard, WorkerDashboard},
};

/// get_admin_stats
///
/// [Admin Route] System-wide counters.
#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "dashboard",
    responses((status = 200, description = "Stats", body = AdminDashboardStats))
)]
pub async fn get_admin_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminDashboardStats>> {
    auth.require(Capability::ManageUsers)?;
    Ok(Json(state.repo.get_stats().await?))
}

/// get_dashboard
///
/// [Authenticated Route] Summary for the caller's role: admins get the system
/// counters, workers get their own task counts and balance.
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "dashboard",
    responses((status = 200, description = "Dashboard", body = Dashboard))
)]
pub async fn get_dashboard(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    if auth.role == Role::Admin {
        return Ok(Json(Dashboard::Admin(state.repo.get_stats().await?)));
    }

    let tasks = state.repo.count_tasks(Some(auth.id)).await?;
    let balance = state.repo.get_balance(auth.id).await?;
    let total_clients = if auth.role.can(Capability::ManageClients) {
        Some(state.repo.count_clients().await?)
    } else {
        None
    };

    Ok(Json(Dashboard::Worker(WorkerDashboard {
        tasks,
        balance,
        total_clients,
    })))
}

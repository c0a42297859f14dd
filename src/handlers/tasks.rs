use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    access::Capability,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CreateTaskRequest, ReviewTaskRequest, Task, TaskFilter, TaskStatusRequest,
        UpdateTaskRequest,
    },
    repository::RepositoryState,
    workflow::{TaskActor, TaskStatus},
};

/// Query for the caller's own task list.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MyTasksQuery {
    pub status: Option<TaskStatus>,
}

/// The assignee must exist, be active and be allowed to work tasks.
async fn check_assignee(repo: &RepositoryState, assignee: Uuid) -> AppResult<()> {
    match repo.get_user(assignee).await? {
        Some(user) if user.is_active && user.role.can(Capability::WorkTasks) => Ok(()),
        _ => Err(AppError::Validation(
            "assignee must be an active staff member or data-entry operator".to_string(),
        )),
    }
}

/// Checks the status machine for `actor`, then applies the change with a
/// compare-and-set on the current status.
async fn apply_transition(
    repo: &RepositoryState,
    task: Task,
    to: TaskStatus,
    actor: TaskActor,
) -> AppResult<Task> {
    if !task.status.can_transition(to, actor) {
        return Err(AppError::conflict(format!(
            "cannot move task from {} to {}",
            task.status, to
        )));
    }

    let updated = repo
        .transition_task(task.id, task.status, to)
        .await?
        .ok_or_else(|| AppError::conflict("task was changed by someone else; reload and retry"))?;

    tracing::info!(task_id = %task.id, from = %task.status, to = %to, ?actor, "task status changed");
    Ok(updated)
}

/// list_tasks
///
/// [Admin Route] Every task, optionally filtered by status and assignee.
#[utoipa::path(
    get,
    path = "/admin/tasks",
    tag = "tasks",
    params(TaskFilter),
    responses((status = 200, description = "Tasks", body = [Task]))
)]
pub async fn list_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> AppResult<Json<Vec<Task>>> {
    auth.require(Capability::ManageTasks)?;
    Ok(Json(state.repo.list_tasks(&filter).await?))
}

/// create_task
///
/// [Admin Route] Assigns a new task. It starts in `pending`.
#[utoipa::path(
    post,
    path = "/admin/tasks",
    tag = "tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Created", body = Task),
        (status = 422, description = "Invalid payload or assignee")
    )
)]
pub async fn create_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTaskRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    auth.require(Capability::ManageTasks)?;
    payload.validate()?;
    check_assignee(&state.repo, payload.assigned_to).await?;

    let task = state.repo.create_task(payload, auth.id).await?;
    tracing::info!(task_id = %task.id, assigned_to = %task.assigned_to, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// update_task
///
/// [Admin Route] Edits task details. Approved tasks are already credited, so their
/// reward and assignee are frozen.
#[utoipa::path(
    put,
    path = "/admin/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Updated", body = Task),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Task already approved")
    )
)]
pub async fn update_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> AppResult<Json<Task>> {
    auth.require(Capability::ManageTasks)?;
    payload.validate()?;

    if let Some(assignee) = payload.assigned_to {
        check_assignee(&state.repo, assignee).await?;
    }

    let task = state
        .repo
        .update_task(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(task))
}

/// delete_task
///
/// [Admin Route] Removes a task that has not been approved.
#[utoipa::path(
    delete,
    path = "/admin/tasks/{id}",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Task already approved")
    )
)]
pub async fn delete_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(Capability::ManageTasks)?;

    // The repository refuses approved tasks in the same statement as the delete.
    if !state.repo.delete_task(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// review_task
///
/// [Admin Route] Approves or rejects a submitted task.
#[utoipa::path(
    post,
    path = "/admin/tasks/{id}/review",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = ReviewTaskRequest,
    responses(
        (status = 200, description = "Reviewed", body = Task),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Task is not submitted")
    )
)]
pub async fn review_task(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewTaskRequest>,
) -> AppResult<Json<Task>> {
    auth.require(Capability::ManageTasks)?;

    let task = state.repo.get_task(id).await?.ok_or(AppError::NotFound)?;
    let to = if payload.approve {
        TaskStatus::Approved
    } else {
        TaskStatus::Rejected
    };
    let task = apply_transition(&state.repo, task, to, TaskActor::Reviewer).await?;
    Ok(Json(task))
}

/// my_tasks
///
/// [Authenticated Route] Tasks assigned to the caller.
#[utoipa::path(
    get,
    path = "/tasks/mine",
    tag = "tasks",
    params(MyTasksQuery),
    responses((status = 200, description = "My tasks", body = [Task]))
)]
pub async fn my_tasks(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<MyTasksQuery>,
) -> AppResult<Json<Vec<Task>>> {
    auth.require(Capability::WorkTasks)?;
    let filter = TaskFilter {
        status: query.status,
        assigned_to: Some(auth.id),
    };
    Ok(Json(state.repo.list_tasks(&filter).await?))
}

/// update_task_status
///
/// [Authenticated Route] Moves a task along its status machine. The assignee drives
/// the work states; an administrator may use this route for review transitions.
/// Anyone else gets 404.
#[utoipa::path(
    patch,
    path = "/tasks/{id}/status",
    tag = "tasks",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = TaskStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Task),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Invalid transition or concurrent change")
    )
)]
pub async fn update_task_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TaskStatusRequest>,
) -> AppResult<Json<Task>> {
    let task = state.repo.get_task(id).await?.ok_or(AppError::NotFound)?;

    let actor = if task.assigned_to == auth.id && auth.role.can(Capability::WorkTasks) {
        TaskActor::Assignee
    } else if auth.role.can(Capability::ManageTasks) {
        TaskActor::Reviewer
    } else {
        return Err(AppError::NotFound);
    };

    let task = apply_transition(&state.repo, task, payload.status, actor).await?;
    Ok(Json(task))
}

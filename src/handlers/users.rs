use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    access::{Capability, Role},
    auth::{AuthUser, PasswordHasher, normalize_email},
    error::{AppError, AppResult},
    models::{
        ChangePasswordRequest, CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, User,
    },
    repository::NewUser,
};

/// get_me
///
/// [Authenticated Route] The caller's own account.
#[utoipa::path(
    get,
    path = "/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<User>> {
    let user = state.repo.get_user(auth.id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// change_my_password
///
/// [Authenticated Route] Requires the current password.
#[utoipa::path(
    put,
    path = "/me/password",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 403, description = "Current password is wrong"),
        (status = 422, description = "New password too short")
    )
)]
pub async fn change_my_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    payload.validate()?;
    let user = state.repo.get_user(auth.id).await?.ok_or(AppError::NotFound)?;

    if !PasswordHasher::verify(payload.current_password, user.password_hash).await? {
        tracing::warn!(user_id = %auth.id, "password change rejected: wrong current password");
        return Err(AppError::Forbidden);
    }

    let hash = PasswordHasher::hash(payload.new_password).await?;
    state.repo.set_password_hash(auth.id, hash).await?;
    tracing::info!(user_id = %auth.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// list_users
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "users",
    responses((status = 200, description = "All users", body = [User]))
)]
pub async fn list_users(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    auth.require(Capability::ManageUsers)?;
    Ok(Json(state.repo.list_users().await?))
}

/// create_user
///
/// [Admin Route] Creates an account. Emails are stored trimmed and lower-cased.
#[utoipa::path(
    post,
    path = "/admin/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 409, description = "Email already in use"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    auth.require(Capability::ManageUsers)?;
    payload.validate()?;

    let password_hash = PasswordHasher::hash(payload.password).await?;
    let user = state
        .repo
        .create_user(NewUser {
            name: payload.name.trim().to_string(),
            email: normalize_email(&payload.email),
            password_hash,
            role: payload.role,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, created_by = %auth.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// [Admin Route] Renames, changes role or (de)activates an account. Administrators
/// cannot lock themselves out.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Would deactivate or demote the caller")
    )
)]
pub async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    auth.require(Capability::ManageUsers)?;
    payload.validate()?;

    if id == auth.id {
        let deactivates = payload.is_active == Some(false);
        let demotes = payload.role.is_some_and(|role| role != Role::Admin);
        if deactivates || demotes {
            return Err(AppError::conflict(
                "administrators cannot deactivate or demote their own account",
            ));
        }
    }

    let user = state
        .repo
        .update_user(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %id, role = %user.role, is_active = user.is_active, "user updated");
    Ok(Json(user))
}

/// reset_password
///
/// [Admin Route] Sets a new password without knowing the old one.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/password",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password reset"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn reset_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    auth.require(Capability::ManageUsers)?;
    payload.validate()?;

    let hash = PasswordHasher::hash(payload.new_password).await?;
    if !state.repo.set_password_hash(id, hash).await? {
        return Err(AppError::NotFound);
    }
    tracing::warn!(user_id = %id, reset_by = %auth.id, "password reset by administrator");
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    access::Capability,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Client, CreateClientRequest, SearchQuery, UpdateClientRequest},
};

/// list_clients
///
/// [DEO Route] Newest first; `search` matches name, phone or email.
#[utoipa::path(
    get,
    path = "/clients",
    tag = "clients",
    params(SearchQuery),
    responses((status = 200, description = "Clients", body = [Client]))
)]
pub async fn list_clients(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Client>>> {
    auth.require(Capability::ManageClients)?;
    Ok(Json(state.repo.list_clients(query.search).await?))
}

#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "clients",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client", body = Client),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_client(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    auth.require(Capability::ManageClients)?;
    let client = state.repo.get_client(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(client))
}

#[utoipa::path(
    post,
    path = "/clients",
    tag = "clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Created", body = Client),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_client(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateClientRequest>,
) -> AppResult<(StatusCode, Json<Client>)> {
    auth.require(Capability::ManageClients)?;
    payload.validate()?;

    let client = state.repo.create_client(payload, auth.id).await?;
    tracing::info!(client_id = %client.id, created_by = %auth.id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

/// update_client
///
/// [DEO Route] Partial update.
#[utoipa::path(
    put,
    path = "/clients/{id}",
    tag = "clients",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Updated", body = Client),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_client(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateClientRequest>,
) -> AppResult<Json<Client>> {
    auth.require(Capability::ManageClients)?;
    payload.validate()?;

    let client = state
        .repo
        .update_client(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(client))
}

/// delete_client
///
/// [Admin Route]
#[utoipa::path(
    delete,
    path = "/admin/clients/{id}",
    tag = "clients",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_client(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(Capability::DeleteClients)?;
    if !state.repo.delete_client(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(client_id = %id, deleted_by = %auth.id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}

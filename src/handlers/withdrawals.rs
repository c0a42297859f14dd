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
        Balance, CreateWithdrawalRequest, ReviewWithdrawalRequest, Withdrawal, WithdrawalFilter,
    },
    workflow::WithdrawalStatus,
};

#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MyWithdrawalsQuery {
    pub status: Option<WithdrawalStatus>,
}

/// my_withdrawals
///
/// [Authenticated Route]
#[utoipa::path(
    get,
    path = "/withdrawals/mine",
    tag = "withdrawals",
    params(MyWithdrawalsQuery),
    responses((status = 200, description = "My withdrawals", body = [Withdrawal]))
)]
pub async fn my_withdrawals(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<MyWithdrawalsQuery>,
) -> AppResult<Json<Vec<Withdrawal>>> {
    auth.require(Capability::RequestWithdrawals)?;
    let filter = WithdrawalFilter {
        status: query.status,
        user_id: Some(auth.id),
    };
    Ok(Json(state.repo.list_withdrawals(&filter).await?))
}

/// my_balance
///
/// [Authenticated Route] Earned, reserved, paid and available amounts.
#[utoipa::path(
    get,
    path = "/withdrawals/balance",
    tag = "withdrawals",
    responses((status = 200, description = "Balance", body = Balance))
)]
pub async fn my_balance(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<Balance>> {
    auth.require(Capability::RequestWithdrawals)?;
    Ok(Json(state.repo.get_balance(auth.id).await?))
}

/// request_withdrawal
///
/// [Authenticated Route] Reserves `amount_cents` of the available balance until an
/// administrator reviews the request.
#[utoipa::path(
    post,
    path = "/withdrawals",
    tag = "withdrawals",
    request_body = CreateWithdrawalRequest,
    responses(
        (status = 201, description = "Requested", body = Withdrawal),
        (status = 409, description = "Insufficient balance"),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn request_withdrawal(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateWithdrawalRequest>,
) -> AppResult<(StatusCode, Json<Withdrawal>)> {
    auth.require(Capability::RequestWithdrawals)?;
    payload.validate()?;

    let withdrawal = state.repo.create_withdrawal(auth.id, payload).await?;
    tracing::info!(
        withdrawal_id = %withdrawal.id,
        user_id = %auth.id,
        amount_cents = withdrawal.amount_cents,
        "withdrawal requested"
    );
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// cancel_withdrawal
///
/// [Authenticated Route] The owner may withdraw a request while it is still pending.
/// Other users' requests are reported as missing.
#[utoipa::path(
    post,
    path = "/withdrawals/{id}/cancel",
    tag = "withdrawals",
    params(("id" = Uuid, Path, description = "Withdrawal ID")),
    responses(
        (status = 200, description = "Cancelled", body = Withdrawal),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already reviewed")
    )
)]
pub async fn cancel_withdrawal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Withdrawal>> {
    let withdrawal = state
        .repo
        .get_withdrawal(id)
        .await?
        .filter(|w| w.user_id == auth.id)
        .ok_or(AppError::NotFound)?;
    if withdrawal.status.is_final() {
        return Err(AppError::conflict(format!(
            "withdrawal is already {}",
            withdrawal.status
        )));
    }

    let withdrawal = state
        .repo
        .settle_withdrawal(id, WithdrawalStatus::Cancelled, None, None)
        .await?
        .ok_or_else(|| AppError::conflict("withdrawal was reviewed in the meantime"))?;
    tracing::info!(withdrawal_id = %id, user_id = %auth.id, "withdrawal cancelled");
    Ok(Json(withdrawal))
}

/// list_withdrawals
///
/// [Admin Route] Filter by status and/or requester.
#[utoipa::path(
    get,
    path = "/admin/withdrawals",
    tag = "withdrawals",
    params(WithdrawalFilter),
    responses((status = 200, description = "Withdrawals", body = [Withdrawal]))
)]
pub async fn list_withdrawals(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<WithdrawalFilter>,
) -> AppResult<Json<Vec<Withdrawal>>> {
    auth.require(Capability::ReviewWithdrawals)?;
    Ok(Json(state.repo.list_withdrawals(&filter).await?))
}

/// review_withdrawal
///
/// [Admin Route] Approves (pays out) or rejects a pending request.
#[utoipa::path(
    post,
    path = "/admin/withdrawals/{id}/review",
    tag = "withdrawals",
    params(("id" = Uuid, Path, description = "Withdrawal ID")),
    request_body = ReviewWithdrawalRequest,
    responses(
        (status = 200, description = "Reviewed", body = Withdrawal),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn review_withdrawal(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewWithdrawalRequest>,
) -> AppResult<Json<Withdrawal>> {
    auth.require(Capability::ReviewWithdrawals)?;
    payload.validate()?;

    let current = state.repo.get_withdrawal(id).await?.ok_or(AppError::NotFound)?;
    if current.status.is_final() {
        return Err(AppError::conflict(format!(
            "withdrawal is already {}",
            current.status
        )));
    }

    let to = if payload.approve {
        WithdrawalStatus::Approved
    } else {
        WithdrawalStatus::Rejected
    };
    let remarks = payload.remarks.filter(|r| !r.trim().is_empty());
    let withdrawal = state
        .repo
        .settle_withdrawal(id, to, Some(auth.id), remarks)
        .await?
        .ok_or_else(|| AppError::conflict("withdrawal was changed in the meantime"))?;

    tracing::info!(withdrawal_id = %id, status = %to, reviewed_by = %auth.id, "withdrawal reviewed");
    Ok(Json(withdrawal))
}

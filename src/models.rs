use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::access::{Page, Role};
use crate::error::{AppError, AppResult};
use crate::workflow::{PayoutMethod, TaskStatus, WithdrawalStatus};

/// Upper bound for a single task reward or withdrawal, in cents.
pub const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A back-office account from the `users` table. The password hash is loaded for
/// sign-in checks but never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Task
///
/// A unit of work assigned by an admin to a DEO or staff member. Approved tasks
/// credit `reward_cents` to the assignee's withdrawable balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assigned_to: Uuid,
    pub created_by: Uuid,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub reward_cents: i64,
    pub due_date: Option<NaiveDate>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Client
///
/// A customer record captured by data-entry operators.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// RecruitmentPost
///
/// A job advertisement. Only published posts are visible on the public endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct RecruitmentPost {
    pub id: Uuid,
    pub title: String,
    pub organization: String,
    pub location: String,
    pub vacancies: i32,
    pub qualification: String,
    pub salary: Option<String>,
    pub last_date: NaiveDate,
    pub description: String,
    pub contact: Option<String>,
    // Object storage key of the poster image, if one was uploaded.
    pub image_key: Option<String>,
    pub is_published: bool,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Withdrawal
///
/// A payout request against the requester's earned task rewards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub method: PayoutMethod,
    pub account_details: String,
    #[sqlx(try_from = "String")]
    pub status: WithdrawalStatus,
    pub remarks: Option<String>,
    pub reviewed_by: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    /// Page to return to after sign-in; ignored unless it is a local `/app/` path.
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub assigned_to: Uuid,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_AMOUNT_CENTS))]
    pub reward_cents: i64,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0, max = MAX_AMOUNT_CENTS))]
    pub reward_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ReviewTaskRequest {
    pub approve: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    #[validate(length(min = 5, max = 20))]
    pub phone: String,
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdateClientRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 150))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Free-text search shared by the client and post listings.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub organization: String,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[validate(range(min = 1))]
    pub vacancies: i32,
    #[validate(length(min = 1))]
    pub qualification: String,
    #[serde(default)]
    pub salary: Option<String>,
    pub last_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub image_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200))]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub vacancies: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublishPostRequest {
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct CreateWithdrawalRequest {
    #[validate(range(min = 1, max = MAX_AMOUNT_CENTS))]
    pub amount_cents: i64,
    pub method: PayoutMethod,
    #[validate(length(min = 1, max = 500))]
    pub account_details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct ReviewWithdrawalRequest {
    pub approve: bool,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct WithdrawalFilter {
    pub status: Option<WithdrawalStatus>,
    pub user_id: Option<Uuid>,
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload/presigned).
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "poster.png")]
    pub filename: String,
    #[schema(example = "image/png")]
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    /// Object key to store on the post (`image_key`).
    pub resource_key: String,
}

// --- Dashboard Schemas (Output) ---

/// Money position of a worker, all values in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Balance {
    pub earned_cents: i64,
    /// Requested but not yet reviewed.
    pub reserved_cents: i64,
    pub paid_cents: i64,
    pub available_cents: i64,
}

impl Balance {
    pub fn new(earned_cents: i64, reserved_cents: i64, paid_cents: i64) -> AppResult<Self> {
        let available_cents = earned_cents
            .checked_sub(reserved_cents)
            .and_then(|rest| rest.checked_sub(paid_cents))
            .ok_or_else(|| AppError::internal("balance out of range"))?;
        Ok(Self {
            earned_cents,
            reserved_cents,
            paid_cents,
            available_cents,
        })
    }

    /// Sums amounts in cents; `Internal` if the total leaves the `i64` range.
    pub fn total(amounts: impl IntoIterator<Item = i64>) -> AppResult<i64> {
        amounts
            .into_iter()
            .try_fold(0i64, i64::checked_add)
            .ok_or_else(|| AppError::internal("balance out of range"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminDashboardStats {
    pub total_users: i64,
    pub active_users: i64,
    pub open_tasks: i64,
    pub submitted_tasks: i64,
    pub total_clients: i64,
    pub published_posts: i64,
    pub pending_withdrawals: i64,
    pub pending_withdrawal_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TaskCounts {
    pub pending: i64,
    pub in_progress: i64,
    pub submitted: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WorkerDashboard {
    pub tasks: TaskCounts,
    pub balance: Balance,
    /// Only filled in for data-entry operators.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_clients: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
#[ts(export)]
pub enum Dashboard {
    Admin(AdminDashboardStats),
    Worker(WorkerDashboard),
}

// --- Front Controller Schemas ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NavEntry {
    pub page: Page,
    pub title: String,
    pub href: String,
}

/// PageView
///
/// What the front controller hands the client shell for a granted page: which screen
/// to draw, where its data lives, and the role's navigation menu.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PageView {
    pub page: Page,
    pub title: String,
    pub role: Role,
    pub data_endpoint: String,
    pub nav: Vec<NavEntry>,
}

use crate::{
    access::Role,
    error::AppResult,
    models::{
        AdminDashboardStats, Balance, Client, CreateClientRequest, CreatePostRequest,
        CreateTaskRequest, CreateWithdrawalRequest, RecruitmentPost, Task, TaskCounts, TaskFilter,
        UpdateClientRequest, UpdatePostRequest, UpdateTaskRequest, UpdateUserRequest, User,
        Withdrawal, WithdrawalFilter,
    },
    workflow::{TaskStatus, WithdrawalStatus},
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Input for creating an account; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Repository Trait
///
/// The persistence contract used by handlers and the auth extractor. Implemented by
/// `PostgresRepository` for deployments and `InMemoryRepository` for local runs and tests;
/// both must behave identically, including the compare-and-set status updates.
///
/// Send + Sync + async_trait make `Arc<dyn Repository>` usable across Axum's tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
    // Email must already be normalized (trimmed, lower-case).
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn count_users(&self) -> AppResult<i64>;
    // Conflict if the email is already registered.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> AppResult<Option<User>>;
    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<bool>;

    // --- Tasks ---
    async fn create_task(&self, req: CreateTaskRequest, created_by: Uuid) -> AppResult<Task>;
    async fn get_task(&self, id: Uuid) -> AppResult<Option<Task>>;
    async fn list_tasks(&self, filter: &TaskFilter) -> AppResult<Vec<Task>>;
    /// `Conflict` if the task is approved and the update would change its reward or
    /// assignee. The status check and the write happen in one step.
    async fn update_task(&self, id: Uuid, req: UpdateTaskRequest) -> AppResult<Option<Task>>;
    /// Moves a task to `to` only if it is still in `from`. `None` when the id is unknown
    /// or the status changed underneath us.
    async fn transition_task(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> AppResult<Option<Task>>;
    /// `Ok(false)` for an unknown id, `Conflict` for an approved task.
    async fn delete_task(&self, id: Uuid) -> AppResult<bool>;
    // Counts per status, for one assignee or across everyone.
    async fn count_tasks(&self, assigned_to: Option<Uuid>) -> AppResult<TaskCounts>;

    // --- Clients ---
    async fn create_client(&self, req: CreateClientRequest, created_by: Uuid) -> AppResult<Client>;
    async fn get_client(&self, id: Uuid) -> AppResult<Option<Client>>;
    async fn list_clients(&self, search: Option<String>) -> AppResult<Vec<Client>>;
    async fn update_client(&self, id: Uuid, req: UpdateClientRequest) -> AppResult<Option<Client>>;
    async fn delete_client(&self, id: Uuid) -> AppResult<bool>;
    async fn count_clients(&self) -> AppResult<i64>;

    // --- Recruitment posts ---
    async fn create_post(&self, req: CreatePostRequest, created_by: Uuid) -> AppResult<RecruitmentPost>;
    async fn get_post(&self, id: Uuid) -> AppResult<Option<RecruitmentPost>>;
    async fn list_posts(
        &self,
        published_only: bool,
        search: Option<String>,
    ) -> AppResult<Vec<RecruitmentPost>>;
    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<RecruitmentPost>>;
    async fn set_post_published(&self, id: Uuid, is_published: bool) -> AppResult<Option<RecruitmentPost>>;
    async fn delete_post(&self, id: Uuid) -> AppResult<bool>;

    // --- Withdrawals ---
    async fn get_balance(&self, user_id: Uuid) -> AppResult<Balance>;
    /// Inserts a pending withdrawal. The balance check and the insert are atomic;
    /// Conflict if the amount exceeds the available balance.
    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        req: CreateWithdrawalRequest,
    ) -> AppResult<Withdrawal>;
    async fn get_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>>;
    async fn list_withdrawals(&self, filter: &WithdrawalFilter) -> AppResult<Vec<Withdrawal>>;
    /// Moves a pending withdrawal to a final status. `None` if it is unknown or no longer pending.
    async fn settle_withdrawal(
        &self,
        id: Uuid,
        to: WithdrawalStatus,
        reviewed_by: Option<Uuid>,
        remarks: Option<String>,
    ) -> AppResult<Option<Withdrawal>>;

    // --- Dashboard ---
    async fn get_stats(&self) -> AppResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

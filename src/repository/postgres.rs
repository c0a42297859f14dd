use super::{NewUser, Repository};
use crate::{
    error::{AppError, AppResult},
    models::{
        AdminDashboardStats, Balance, Client, CreateClientRequest, CreatePostRequest,
        CreateTaskRequest, CreateWithdrawalRequest, RecruitmentPost, Task, TaskCounts, TaskFilter,
        UpdateClientRequest, UpdatePostRequest, UpdateTaskRequest, UpdateUserRequest, User,
        Withdrawal, WithdrawalFilter,
    },
    workflow::{TaskStatus, WithdrawalStatus},
};
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, is_active, created_at, updated_at";
const TASK_COLUMNS: &str = "id, title, description, assigned_to, created_by, status, \
     reward_cents, due_date, created_at, updated_at";
const CLIENT_COLUMNS: &str =
    "id, name, phone, email, address, notes, created_by, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, organization, location, vacancies, qualification, \
     salary, last_date, description, contact, image_key, is_published, created_by, \
     created_at, updated_at";
const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount_cents, method, account_details, status, \
     remarks, reviewed_by, created_at, reviewed_at";

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. All statements are
/// parameterized; optional filters are assembled with `QueryBuilder`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Re-read after a guarded statement touched no rows.
    async fn task_exists(&self, id: Uuid) -> AppResult<bool> {
        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

/// Sums a user's approved rewards and withdrawals. Runs on the pool or inside
/// the withdrawal transaction.
async fn balance_with<'e, E: PgExecutor<'e>>(executor: E, user_id: Uuid) -> AppResult<Balance> {
    let (earned, reserved, paid): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE((SELECT SUM(reward_cents) FROM tasks
                      WHERE assigned_to = $1 AND status = 'approved'), 0)::BIGINT,
            COALESCE((SELECT SUM(amount_cents) FROM withdrawals
                      WHERE user_id = $1 AND status = 'pending'), 0)::BIGINT,
            COALESCE((SELECT SUM(amount_cents) FROM withdrawals
                      WHERE user_id = $1 AND status = 'approved'), 0)::BIGINT
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;

    Balance::new(earned, reserved, paid)
}

fn search_pattern(search: &str) -> String {
    format!("%{}%", search.trim())
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY role ASC, name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique(e, "email is already registered"))
    }

    /// Partial update: `COALESCE` keeps the stored value for every absent field.
    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                role = COALESCE($3, role),
                is_active = COALESCE($4, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.role.map(|r| r.as_str()))
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<bool> {
        let res = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- TASKS ---

    async fn create_task(&self, req: CreateTaskRequest, created_by: Uuid) -> AppResult<Task> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks (id, title, description, assigned_to, created_by, status, reward_cents, due_date, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, NOW(), NOW()) RETURNING {TASK_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.description)
        .bind(req.assigned_to)
        .bind(created_by)
        .bind(req.reward_cents)
        .bind(req.due_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> AppResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> AppResult<Vec<Task>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks WHERE TRUE"));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(assignee) = filter.assigned_to {
            builder.push(" AND assigned_to = ").push_bind(assignee);
        }
        builder.push(" ORDER BY created_at DESC");

        let tasks = builder.build_query_as::<Task>().fetch_all(&self.pool).await?;
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, req: UpdateTaskRequest) -> AppResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                assigned_to = COALESCE($4, assigned_to),
                reward_cents = COALESCE($5, reward_cents),
                due_date = COALESCE($6, due_date),
                updated_at = NOW()
            WHERE id = $1
              AND (status <> 'approved'
                   OR (($4::UUID IS NULL OR $4 = assigned_to)
                       AND ($5::BIGINT IS NULL OR $5 = reward_cents)))
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.description)
        .bind(req.assigned_to)
        .bind(req.reward_cents)
        .bind(req.due_date)
        .fetch_optional(&self.pool)
        .await?;
        match task {
            Some(task) => Ok(Some(task)),
            None if self.task_exists(id).await? => Err(AppError::conflict(
                "reward and assignee of an approved task cannot change",
            )),
            None => Ok(None),
        }
    }

    async fn transition_task(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> AppResult<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM tasks WHERE id = $1 AND status <> 'approved'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() > 0 {
            return Ok(true);
        }
        if self.task_exists(id).await? {
            return Err(AppError::conflict("approved tasks cannot be deleted"));
        }
        Ok(false)
    }

    async fn count_tasks(&self, assigned_to: Option<Uuid>) -> AppResult<TaskCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM tasks \
             WHERE ($1::uuid IS NULL OR assigned_to = $1) GROUP BY status",
        )
        .bind(assigned_to)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = TaskCounts::default();
        for (status, n) in rows {
            match TaskStatus::parse(&status) {
                Some(TaskStatus::Pending) => counts.pending = n,
                Some(TaskStatus::InProgress) => counts.in_progress = n,
                Some(TaskStatus::Submitted) => counts.submitted = n,
                Some(TaskStatus::Approved) => counts.approved = n,
                Some(TaskStatus::Rejected) => counts.rejected = n,
                None => tracing::warn!(status = %status, "unknown task status in database"),
            }
        }
        Ok(counts)
    }

    // --- CLIENTS ---

    async fn create_client(&self, req: CreateClientRequest, created_by: Uuid) -> AppResult<Client> {
        let client = sqlx::query_as::<_, Client>(&format!(
            "INSERT INTO clients (id, name, phone, email, address, notes, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW()) RETURNING {CLIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.phone)
        .bind(req.email)
        .bind(req.address)
        .bind(req.notes)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        let client =
            sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(client)
    }

    /// Case-insensitive search across name, phone and email.
    async fn list_clients(&self, search: Option<String>) -> AppResult<Vec<Client>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE TRUE"));

        if let Some(s) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = search_pattern(&s);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR phone ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC");

        let clients = builder.build_query_as::<Client>().fetch_all(&self.pool).await?;
        Ok(clients)
    }

    async fn update_client(&self, id: Uuid, req: UpdateClientRequest) -> AppResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(&format!(
            r#"
            UPDATE clients
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                address = COALESCE($5, address),
                notes = COALESCE($6, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CLIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.phone)
        .bind(req.email)
        .bind(req.address)
        .bind(req.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn delete_client(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_clients(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- POSTS ---

    /// New posts always start unpublished.
    async fn create_post(&self, req: CreatePostRequest, created_by: Uuid) -> AppResult<RecruitmentPost> {
        let post = sqlx::query_as::<_, RecruitmentPost>(&format!(
            "INSERT INTO recruitment_posts (id, title, organization, location, vacancies, qualification, \
             salary, last_date, description, contact, image_key, is_published, created_by, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE, $12, NOW(), NOW()) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(req.title)
        .bind(req.organization)
        .bind(req.location)
        .bind(req.vacancies)
        .bind(req.qualification)
        .bind(req.salary)
        .bind(req.last_date)
        .bind(req.description)
        .bind(req.contact)
        .bind(req.image_key)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<RecruitmentPost>> {
        let post = sqlx::query_as::<_, RecruitmentPost>(&format!(
            "SELECT {POST_COLUMNS} FROM recruitment_posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn list_posts(
        &self,
        published_only: bool,
        search: Option<String>,
    ) -> AppResult<Vec<RecruitmentPost>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM recruitment_posts WHERE TRUE"));

        if published_only {
            builder.push(" AND is_published = TRUE");
        }
        if let Some(s) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = search_pattern(&s);
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR organization ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR location ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        builder.push(" ORDER BY created_at DESC");

        let posts = builder
            .build_query_as::<RecruitmentPost>()
            .fetch_all(&self.pool)
            .await?;
        Ok(posts)
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<RecruitmentPost>> {
        let post = sqlx::query_as::<_, RecruitmentPost>(&format!(
            r#"
            UPDATE recruitment_posts
            SET title = COALESCE($2, title),
                organization = COALESCE($3, organization),
                location = COALESCE($4, location),
                vacancies = COALESCE($5, vacancies),
                qualification = COALESCE($6, qualification),
                salary = COALESCE($7, salary),
                last_date = COALESCE($8, last_date),
                description = COALESCE($9, description),
                contact = COALESCE($10, contact),
                image_key = COALESCE($11, image_key),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.title)
        .bind(req.organization)
        .bind(req.location)
        .bind(req.vacancies)
        .bind(req.qualification)
        .bind(req.salary)
        .bind(req.last_date)
        .bind(req.description)
        .bind(req.contact)
        .bind(req.image_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn set_post_published(&self, id: Uuid, is_published: bool) -> AppResult<Option<RecruitmentPost>> {
        let post = sqlx::query_as::<_, RecruitmentPost>(&format!(
            "UPDATE recruitment_posts SET is_published = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(is_published)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM recruitment_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- WITHDRAWALS ---

    async fn get_balance(&self, user_id: Uuid) -> AppResult<Balance> {
        balance_with(&self.pool, user_id).await
    }

    /// Locks the requester's user row so concurrent requests from the same user
    /// are checked against the balance one at a time.
    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        req: CreateWithdrawalRequest,
    ) -> AppResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound);
        }

        let balance = balance_with(&mut *tx, user_id).await?;
        if req.amount_cents > balance.available_cents {
            return Err(AppError::conflict(format!(
                "insufficient balance: {} cents available",
                balance.available_cents
            )));
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "INSERT INTO withdrawals (id, user_id, amount_cents, method, account_details, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', NOW()) RETURNING {WITHDRAWAL_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.amount_cents)
        .bind(req.method.as_str())
        .bind(req.account_details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn get_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(withdrawal)
    }

    async fn list_withdrawals(&self, filter: &WithdrawalFilter) -> AppResult<Vec<Withdrawal>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE TRUE"));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(user_id) = filter.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        builder.push(" ORDER BY created_at DESC");

        let withdrawals = builder
            .build_query_as::<Withdrawal>()
            .fetch_all(&self.pool)
            .await?;
        Ok(withdrawals)
    }

    async fn settle_withdrawal(
        &self,
        id: Uuid,
        to: WithdrawalStatus,
        reviewed_by: Option<Uuid>,
        remarks: Option<String>,
    ) -> AppResult<Option<Withdrawal>> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET status = $2,
                reviewed_by = $3,
                remarks = COALESCE($4, remarks),
                reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(to.as_str())
        .bind(reviewed_by)
        .bind(remarks)
        .fetch_optional(&self.pool)
        .await?;
        Ok(withdrawal)
    }

    // --- DASHBOARD ---

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        let active_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        let counts = self.count_tasks(None).await?;
        let total_clients = self.count_clients().await?;
        let published_posts =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM recruitment_posts WHERE is_published")
                .fetch_one(&self.pool)
                .await?;
        let (pending_withdrawals, pending_withdrawal_cents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0)::BIGINT FROM withdrawals WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminDashboardStats {
            total_users,
            active_users,
            open_tasks: counts.pending + counts.in_progress,
            submitted_tasks: counts.submitted,
            total_clients,
            published_posts,
            pending_withdrawals,
            pending_withdrawal_cents,
        })
    }
}

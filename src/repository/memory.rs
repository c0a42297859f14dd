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
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

const FROZEN_TASK: &str = "reward and assignee of an approved task cannot change";
const APPROVED_UNDELETABLE: &str = "approved tasks cannot be deleted";

fn touches_earnings(task: &Task, req: &UpdateTaskRequest) -> bool {
    req.reward_cents.is_some_and(|r| r != task.reward_cents)
        || req.assigned_to.is_some_and(|a| a != task.assigned_to)
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tasks: HashMap<Uuid, Task>,
    clients: HashMap<Uuid, Client>,
    posts: HashMap<Uuid, RecruitmentPost>,
    withdrawals: HashMap<Uuid, Withdrawal>,
}

impl Tables {
    fn balance(&self, user_id: Uuid) -> AppResult<Balance> {
        let earned = Balance::total(
            self.tasks
                .values()
                .filter(|t| t.assigned_to == user_id && t.status == TaskStatus::Approved)
                .map(|t| t.reward_cents),
        )?;
        let sum_withdrawals = |status: WithdrawalStatus| {
            Balance::total(
                self.withdrawals
                    .values()
                    .filter(|w| w.user_id == user_id && w.status == status)
                    .map(|w| w.amount_cents),
            )
        };
        Balance::new(
            earned,
            sum_withdrawals(WithdrawalStatus::Pending)?,
            sum_withdrawals(WithdrawalStatus::Approved)?,
        )
    }

    fn count_tasks(&self, assigned_to: Option<Uuid>) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self
            .tasks
            .values()
            .filter(|t| assigned_to.is_none_or(|id| t.assigned_to == id))
        {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Submitted => counts.submitted += 1,
                TaskStatus::Approved => counts.approved += 1,
                TaskStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

/// InMemoryRepository
///
/// A process-local `Repository` used when no database is configured in local mode,
/// and by the test suite. A single `RwLock` over all tables makes every operation,
/// including the withdrawal balance check, atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Newest first, matching the `ORDER BY created_at DESC` of the SQL store.
fn newest_first<T, F>(mut rows: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| a.role.as_str().cmp(b.role.as_str()).then(a.name.cmp(&b.name)));
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::conflict("email is already registered"));
        }
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> AppResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            user.name = name;
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: String) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_task(&self, req: CreateTaskRequest, created_by: Uuid) -> AppResult<Task> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            assigned_to: req.assigned_to,
            created_by,
            status: TaskStatus::Pending,
            reward_cents: req.reward_cents,
            due_date: req.due_date,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, id: Uuid) -> AppResult<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> AppResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let tasks = tables
            .tasks
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.assigned_to.is_none_or(|id| t.assigned_to == id))
            .cloned()
            .collect();
        Ok(newest_first(tasks, |t| t.created_at))
    }

    async fn update_task(&self, id: Uuid, req: UpdateTaskRequest) -> AppResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if task.status == TaskStatus::Approved && touches_earnings(task, &req) {
            return Err(AppError::conflict(FROZEN_TASK));
        }
        if let Some(title) = req.title {
            task.title = title;
        }
        if let Some(description) = req.description {
            task.description = description;
        }
        if let Some(assignee) = req.assigned_to {
            task.assigned_to = assignee;
        }
        if let Some(reward) = req.reward_cents {
            task.reward_cents = reward;
        }
        if let Some(due) = req.due_date {
            task.due_date = Some(due);
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn transition_task(
        &self,
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    ) -> AppResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id) {
            Some(task) if task.status == from => {
                task.status = to;
                task.updated_at = Utc::now();
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_task(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get(&id).map(|t| t.status) {
            None => Ok(false),
            Some(TaskStatus::Approved) => Err(AppError::conflict(APPROVED_UNDELETABLE)),
            Some(_) => Ok(tables.tasks.remove(&id).is_some()),
        }
    }

    async fn count_tasks(&self, assigned_to: Option<Uuid>) -> AppResult<TaskCounts> {
        Ok(self.tables.read().await.count_tasks(assigned_to))
    }

    async fn create_client(&self, req: CreateClientRequest, created_by: Uuid) -> AppResult<Client> {
        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: req.name,
            phone: req.phone,
            email: req.email,
            address: req.address,
            notes: req.notes,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn get_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        Ok(self.tables.read().await.clients.get(&id).cloned())
    }

    async fn list_clients(&self, search: Option<String>) -> AppResult<Vec<Client>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tables = self.tables.read().await;
        let clients = tables
            .clients
            .values()
            .filter(|c| match &needle {
                Some(n) => {
                    contains_ci(&c.name, n)
                        || contains_ci(&c.phone, n)
                        || c.email.as_deref().is_some_and(|e| contains_ci(e, n))
                }
                None => true,
            })
            .cloned()
            .collect();
        Ok(newest_first(clients, |c| c.created_at))
    }

    async fn update_client(&self, id: Uuid, req: UpdateClientRequest) -> AppResult<Option<Client>> {
        let mut tables = self.tables.write().await;
        let Some(client) = tables.clients.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            client.name = name;
        }
        if let Some(phone) = req.phone {
            client.phone = phone;
        }
        if req.email.is_some() {
            client.email = req.email;
        }
        if req.address.is_some() {
            client.address = req.address;
        }
        if req.notes.is_some() {
            client.notes = req.notes;
        }
        client.updated_at = Utc::now();
        Ok(Some(client.clone()))
    }

    async fn delete_client(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.tables.write().await.clients.remove(&id).is_some())
    }

    async fn count_clients(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.clients.len() as i64)
    }

    async fn create_post(&self, req: CreatePostRequest, created_by: Uuid) -> AppResult<RecruitmentPost> {
        let now = Utc::now();
        let post = RecruitmentPost {
            id: Uuid::new_v4(),
            title: req.title,
            organization: req.organization,
            location: req.location,
            vacancies: req.vacancies,
            qualification: req.qualification,
            salary: req.salary,
            last_date: req.last_date,
            description: req.description,
            contact: req.contact,
            image_key: req.image_key,
            is_published: false,
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: Uuid) -> AppResult<Option<RecruitmentPost>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn list_posts(
        &self,
        published_only: bool,
        search: Option<String>,
    ) -> AppResult<Vec<RecruitmentPost>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tables = self.tables.read().await;
        let posts = tables
            .posts
            .values()
            .filter(|p| !published_only || p.is_published)
            .filter(|p| match &needle {
                Some(n) => {
                    contains_ci(&p.title, n)
                        || contains_ci(&p.organization, n)
                        || contains_ci(&p.location, n)
                }
                None => true,
            })
            .cloned()
            .collect();
        Ok(newest_first(posts, |p| p.created_at))
    }

    async fn update_post(&self, id: Uuid, req: UpdatePostRequest) -> AppResult<Option<RecruitmentPost>> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = req.title {
            post.title = v;
        }
        if let Some(v) = req.organization {
            post.organization = v;
        }
        if let Some(v) = req.location {
            post.location = v;
        }
        if let Some(v) = req.vacancies {
            post.vacancies = v;
        }
        if let Some(v) = req.qualification {
            post.qualification = v;
        }
        if req.salary.is_some() {
            post.salary = req.salary;
        }
        if let Some(v) = req.last_date {
            post.last_date = v;
        }
        if let Some(v) = req.description {
            post.description = v;
        }
        if req.contact.is_some() {
            post.contact = req.contact;
        }
        if req.image_key.is_some() {
            post.image_key = req.image_key;
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn set_post_published(&self, id: Uuid, is_published: bool) -> AppResult<Option<RecruitmentPost>> {
        let mut tables = self.tables.write().await;
        Ok(tables.posts.get_mut(&id).map(|post| {
            post.is_published = is_published;
            post.updated_at = Utc::now();
            post.clone()
        }))
    }

    async fn delete_post(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.tables.write().await.posts.remove(&id).is_some())
    }

    async fn get_balance(&self, user_id: Uuid) -> AppResult<Balance> {
        self.tables.read().await.balance(user_id)
    }

    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        req: CreateWithdrawalRequest,
    ) -> AppResult<Withdrawal> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        let balance = tables.balance(user_id)?;
        if req.amount_cents > balance.available_cents {
            return Err(AppError::conflict(format!(
                "insufficient balance: {} cents available",
                balance.available_cents
            )));
        }

        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            user_id,
            amount_cents: req.amount_cents,
            method: req.method,
            account_details: req.account_details,
            status: WithdrawalStatus::Pending,
            remarks: None,
            reviewed_by: None,
            created_at: Utc::now(),
            reviewed_at: None,
        };
        tables.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn get_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>> {
        Ok(self.tables.read().await.withdrawals.get(&id).cloned())
    }

    async fn list_withdrawals(&self, filter: &WithdrawalFilter) -> AppResult<Vec<Withdrawal>> {
        let tables = self.tables.read().await;
        let withdrawals = tables
            .withdrawals
            .values()
            .filter(|w| filter.status.is_none_or(|s| w.status == s))
            .filter(|w| filter.user_id.is_none_or(|id| w.user_id == id))
            .cloned()
            .collect();
        Ok(newest_first(withdrawals, |w| w.created_at))
    }

    async fn settle_withdrawal(
        &self,
        id: Uuid,
        to: WithdrawalStatus,
        reviewed_by: Option<Uuid>,
        remarks: Option<String>,
    ) -> AppResult<Option<Withdrawal>> {
        let mut tables = self.tables.write().await;
        match tables.withdrawals.get_mut(&id) {
            Some(w) if w.status == WithdrawalStatus::Pending => {
                w.status = to;
                w.reviewed_by = reviewed_by;
                if remarks.is_some() {
                    w.remarks = remarks;
                }
                w.reviewed_at = Some(Utc::now());
                Ok(Some(w.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let tables = self.tables.read().await;
        let counts = tables.count_tasks(None);
        let pending: Vec<&Withdrawal> = tables
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .collect();

        Ok(AdminDashboardStats {
            total_users: tables.users.len() as i64,
            active_users: tables.users.values().filter(|u| u.is_active).count() as i64,
            open_tasks: tables.tasks.values().filter(|t| t.status.is_open()).count() as i64,
            submitted_tasks: counts.submitted,
            total_clients: tables.clients.len() as i64,
            published_posts: tables.posts.values().filter(|p| p.is_published).count() as i64,
            pending_withdrawals: pending.len() as i64,
            pending_withdrawal_cents: pending.iter().map(|w| w.amount_cents).sum(),
        })
    }
}

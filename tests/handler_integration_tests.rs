use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;
use backoffice::{
    AppError, AppState, InMemoryRepository, MockStorageService,
    access::Role,
    auth::{AuthUser, PasswordHasher},
    config::AppConfig,
    handlers::{
        clients, dashboard,
        posts,
        session,
        tasks::{self, MyTasksQuery},
        users,
        withdrawals::{self, MyWithdrawalsQuery},
    },
    models::{
        ChangePasswordRequest, CreateClientRequest, CreatePostRequest, CreateTaskRequest,
        CreateUserRequest, CreateWithdrawalRequest, Dashboard, LoginRequest, PublishPostRequest,
        ReviewTaskRequest, ReviewWithdrawalRequest, SearchQuery, Task, TaskFilter,
        MAX_AMOUNT_CENTS, TaskStatusRequest, UpdateTaskRequest, UpdateUserRequest,
        WithdrawalFilter,
    },
    repository::{NewUser, RepositoryState},
    workflow::{PayoutMethod, TaskStatus, WithdrawalStatus},
};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

// --- Test Context ---

struct Ctx {
    state: AppState,
    admin: AuthUser,
    deo: AuthUser,
    staff: AuthUser,
}

async fn add_user(state: &AppState, email: &str, role: Role) -> AuthUser {
    let user = state
        .repo
        .create_user(NewUser {
            name: email.to_string(),
            email: email.to_string(),
            password_hash: "unused".to_string(),
            role,
        })
        .await
        .unwrap();
    AuthUser { id: user.id, role }
}

async fn setup() -> Ctx {
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig::default(),
    };
    let admin = add_user(&state, "admin@example.com", Role::Admin).await;
    let deo = add_user(&state, "deo@example.com", Role::Deo).await;
    let staff = add_user(&state, "staff@example.com", Role::Staff).await;
    Ctx {
        state,
        admin,
        deo,
        staff,
    }
}

fn task_request(assignee: Uuid, reward_cents: i64) -> CreateTaskRequest {
    CreateTaskRequest {
        title: "Digitise ledger".to_string(),
        description: "Pages 1-40".to_string(),
        assigned_to: assignee,
        reward_cents,
        due_date: None,
    }
}

async fn new_task(ctx: &Ctx, assignee: &AuthUser, reward_cents: i64) -> Task {
    let (status, Json(task)) = tasks::create_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(task_request(assignee.id, reward_cents)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    task
}

async fn move_task(ctx: &Ctx, who: &AuthUser, id: Uuid, to: TaskStatus) -> Result<Task, AppError> {
    tasks::update_task_status(
        who.clone(),
        State(ctx.state.clone()),
        Path(id),
        Json(TaskStatusRequest { status: to }),
    )
    .await
    .map(|Json(task)| task)
}

/// Creates a task for `worker` and walks it all the way to approved.
async fn earn(ctx: &Ctx, worker: &AuthUser, reward_cents: i64) {
    let task = new_task(ctx, worker, reward_cents).await;
    move_task(ctx, worker, task.id, TaskStatus::InProgress).await.unwrap();
    move_task(ctx, worker, task.id, TaskStatus::Submitted).await.unwrap();
    tasks::review_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(task.id),
        Json(ReviewTaskRequest { approve: true }),
    )
    .await
    .unwrap();
}

fn withdrawal_request(amount_cents: i64) -> CreateWithdrawalRequest {
    CreateWithdrawalRequest {
        amount_cents,
        method: PayoutMethod::Bank,
        account_details: "ACC 0001 IFSC TEST0001".to_string(),
    }
}

// --- Tasks ---

#[tokio::test]
async fn test_task_lifecycle_credits_reward() {
    let ctx = setup().await;
    let task = new_task(&ctx, &ctx.staff, 1_500).await;
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.created_by, ctx.admin.id);

    let task_after = move_task(&ctx, &ctx.staff, task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(task_after.status, TaskStatus::InProgress);
    move_task(&ctx, &ctx.staff, task.id, TaskStatus::Submitted).await.unwrap();

    let Json(reviewed) = tasks::review_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(task.id),
        Json(ReviewTaskRequest { approve: true }),
    )
    .await
    .unwrap();
    assert_eq!(reviewed.status, TaskStatus::Approved);

    let Json(balance) = withdrawals::my_balance(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(balance.earned_cents, 1_500);
    assert_eq!(balance.available_cents, 1_500);
}

#[tokio::test]
async fn test_rejected_task_can_be_reworked() {
    let ctx = setup().await;
    let task = new_task(&ctx, &ctx.deo, 100).await;
    move_task(&ctx, &ctx.deo, task.id, TaskStatus::InProgress).await.unwrap();
    move_task(&ctx, &ctx.deo, task.id, TaskStatus::Submitted).await.unwrap();

    // The admin may also review through the status route.
    let rejected = move_task(&ctx, &ctx.admin, task.id, TaskStatus::Rejected).await.unwrap();
    assert_eq!(rejected.status, TaskStatus::Rejected);

    let reworked = move_task(&ctx, &ctx.deo, task.id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(reworked.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn test_invalid_transitions_conflict() {
    let ctx = setup().await;
    let task = new_task(&ctx, &ctx.staff, 100).await;

    // Skipping a step.
    let err = move_task(&ctx, &ctx.staff, task.id, TaskStatus::Submitted).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Assignees cannot approve their own work.
    move_task(&ctx, &ctx.staff, task.id, TaskStatus::InProgress).await.unwrap();
    move_task(&ctx, &ctx.staff, task.id, TaskStatus::Submitted).await.unwrap();
    let err = move_task(&ctx, &ctx.staff, task.id, TaskStatus::Approved).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Reviewing something that is not submitted.
    let other = new_task(&ctx, &ctx.staff, 100).await;
    let err = tasks::review_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(other.id),
        Json(ReviewTaskRequest { approve: false }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_non_assignee_sees_not_found() {
    let ctx = setup().await;
    let task = new_task(&ctx, &ctx.staff, 100).await;

    let err = move_task(&ctx, &ctx.deo, task.id, TaskStatus::InProgress).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = move_task(&ctx, &ctx.staff, Uuid::new_v4(), TaskStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_lost_status_race_conflicts() {
    let ctx = setup().await;
    let task = new_task(&ctx, &ctx.staff, 100).await;

    // Another request already moved the task on.
    ctx.state
        .repo
        .transition_task(task.id, TaskStatus::Pending, TaskStatus::InProgress)
        .await
        .unwrap()
        .unwrap();

    let stale = ctx
        .state
        .repo
        .transition_task(task.id, TaskStatus::Pending, TaskStatus::InProgress)
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[tokio::test]
async fn test_assignee_must_be_active_worker() {
    let ctx = setup().await;

    // Admins do not work tasks.
    let err = tasks::create_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(task_request(ctx.admin.id, 100)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = tasks::create_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(task_request(Uuid::new_v4(), 100)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    users::update_user(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(ctx.staff.id),
        Json(UpdateUserRequest {
            is_active: Some(false),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let err = tasks::create_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(task_request(ctx.staff.id, 100)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_only_admins_manage_tasks() {
    let ctx = setup().await;
    let err = tasks::create_task(
        ctx.deo.clone(),
        State(ctx.state.clone()),
        Json(task_request(ctx.staff.id, 100)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = tasks::list_tasks(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Query(TaskFilter::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_approved_task_is_frozen() {
    let ctx = setup().await;
    earn(&ctx, &ctx.staff, 900).await;
    let Json(mine) = tasks::my_tasks(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Query(MyTasksQuery {
            status: Some(TaskStatus::Approved),
        }),
    )
    .await
    .unwrap();
    assert_eq!(mine.len(), 1);
    let task_id = mine[0].id;

    let err = tasks::update_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(task_id),
        Json(UpdateTaskRequest {
            reward_cents: Some(5_000),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Cosmetic edits are still fine.
    let Json(renamed) = tasks::update_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(task_id),
        Json(UpdateTaskRequest {
            title: Some("Ledger (done)".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(renamed.title, "Ledger (done)");
    assert_eq!(renamed.reward_cents, 900);

    let err = tasks::delete_task(ctx.admin.clone(), State(ctx.state.clone()), Path(task_id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_repository_refuses_to_touch_approved_task() {
    let ctx = setup().await;
    earn(&ctx, &ctx.staff, 1_000).await;
    let task = ctx
        .state
        .repo
        .list_tasks(&TaskFilter {
            status: Some(TaskStatus::Approved),
            assigned_to: Some(ctx.staff.id),
        })
        .await
        .unwrap()
        .remove(0);
    withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(1_000)),
    )
    .await
    .unwrap();

    // Straight to the store, as if the approval landed after a handler-level check.
    let err = ctx.state.repo.delete_task(task.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    for change in [
        UpdateTaskRequest {
            reward_cents: Some(1),
            ..Default::default()
        },
        UpdateTaskRequest {
            assigned_to: Some(ctx.deo.id),
            ..Default::default()
        },
    ] {
        let err = ctx.state.repo.update_task(task.id, change).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    // Restating the current values is not a change.
    let same = ctx
        .state
        .repo
        .update_task(
            task.id,
            UpdateTaskRequest {
                reward_cents: Some(1_000),
                assigned_to: Some(ctx.staff.id),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(same.reward_cents, 1_000);

    let balance = ctx.state.repo.get_balance(ctx.staff.id).await.unwrap();
    assert_eq!(balance.earned_cents, 1_000);
    assert_eq!(balance.available_cents, 0);

    assert!(!ctx.state.repo.delete_task(Uuid::new_v4()).await.unwrap());
}

#[tokio::test]
async fn test_reward_is_capped() {
    let ctx = setup().await;

    let err = tasks::create_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(task_request(ctx.staff.id, MAX_AMOUNT_CENTS + 1)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let task = new_task(&ctx, &ctx.staff, MAX_AMOUNT_CENTS).await;
    let err = tasks::update_task(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(task.id),
        Json(UpdateTaskRequest {
            reward_cents: Some(i64::MAX),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_balance_of_large_rewards_is_exact() {
    let ctx = setup().await;
    earn(&ctx, &ctx.staff, MAX_AMOUNT_CENTS).await;
    earn(&ctx, &ctx.staff, MAX_AMOUNT_CENTS).await;

    let Json(balance) = withdrawals::my_balance(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(balance.earned_cents, 2 * MAX_AMOUNT_CENTS);
    assert_eq!(balance.available_cents, 2 * MAX_AMOUNT_CENTS);

    let err = withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(MAX_AMOUNT_CENTS + 1)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_my_tasks_only_lists_own() {
    let ctx = setup().await;
    new_task(&ctx, &ctx.staff, 100).await;
    new_task(&ctx, &ctx.staff, 100).await;
    new_task(&ctx, &ctx.deo, 100).await;

    let Json(mine) = tasks::my_tasks(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Query(MyTasksQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|t| t.assigned_to == ctx.staff.id));
}

// --- Withdrawals ---

#[tokio::test]
async fn test_withdrawal_cannot_exceed_available() {
    let ctx = setup().await;
    earn(&ctx, &ctx.staff, 1_000).await;

    let err = withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(1_001)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let (status, Json(first)) = withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(600)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first.status, WithdrawalStatus::Pending);

    // 600 is reserved; only 400 remain.
    let err = withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(500)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let Json(balance) = withdrawals::my_balance(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(balance.reserved_cents, 600);
    assert_eq!(balance.available_cents, 400);
}

#[tokio::test]
async fn test_admin_cannot_request_withdrawal() {
    let ctx = setup().await;
    let err = withdrawals::request_withdrawal(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(1)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_cancel_withdrawal_owner_only() {
    let ctx = setup().await;
    earn(&ctx, &ctx.staff, 1_000).await;
    let (_, Json(w)) = withdrawals::request_withdrawal(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(300)),
    )
    .await
    .unwrap();

    let err = withdrawals::cancel_withdrawal(ctx.deo.clone(), State(ctx.state.clone()), Path(w.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let Json(cancelled) =
        withdrawals::cancel_withdrawal(ctx.staff.clone(), State(ctx.state.clone()), Path(w.id))
            .await
            .unwrap();
    assert_eq!(cancelled.status, WithdrawalStatus::Cancelled);

    // Released back to the available balance.
    let Json(balance) = withdrawals::my_balance(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(balance.available_cents, 1_000);

    let err =
        withdrawals::cancel_withdrawal(ctx.staff.clone(), State(ctx.state.clone()), Path(w.id))
            .await
            .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_review_withdrawal() {
    let ctx = setup().await;
    earn(&ctx, &ctx.deo, 2_000).await;
    let (_, Json(w)) = withdrawals::request_withdrawal(
        ctx.deo.clone(),
        State(ctx.state.clone()),
        Json(withdrawal_request(1_200)),
    )
    .await
    .unwrap();

    let err = withdrawals::review_withdrawal(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(Uuid::new_v4()),
        Json(ReviewWithdrawalRequest {
            approve: true,
            remarks: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let Json(approved) = withdrawals::review_withdrawal(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(w.id),
        Json(ReviewWithdrawalRequest {
            approve: true,
            remarks: Some("Paid via NEFT".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(ctx.admin.id));
    assert!(approved.reviewed_at.is_some());
    assert_eq!(approved.remarks.as_deref(), Some("Paid via NEFT"));

    let err = withdrawals::review_withdrawal(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(w.id),
        Json(ReviewWithdrawalRequest {
            approve: false,
            remarks: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let Json(balance) = withdrawals::my_balance(ctx.deo.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(balance.paid_cents, 1_200);
    assert_eq!(balance.reserved_cents, 0);
    assert_eq!(balance.available_cents, 800);

    let Json(listed) = withdrawals::list_withdrawals(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Query(WithdrawalFilter {
            status: Some(WithdrawalStatus::Approved),
            user_id: Some(ctx.deo.id),
        }),
    )
    .await
    .unwrap();
    assert_eq!(listed.len(), 1);

    let Json(mine) = withdrawals::my_withdrawals(
        ctx.deo.clone(),
        State(ctx.state.clone()),
        Query(MyWithdrawalsQuery {
            status: Some(WithdrawalStatus::Pending),
        }),
    )
    .await
    .unwrap();
    assert!(mine.is_empty());
}

// --- Users ---

#[tokio::test]
async fn test_admin_cannot_lock_themselves_out() {
    let ctx = setup().await;

    for update in [
        UpdateUserRequest {
            is_active: Some(false),
            ..Default::default()
        },
        UpdateUserRequest {
            role: Some(Role::Staff),
            ..Default::default()
        },
    ] {
        let err = users::update_user(
            ctx.admin.clone(),
            State(ctx.state.clone()),
            Path(ctx.admin.id),
            Json(update),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    // Renaming yourself is fine.
    let Json(me) = users::update_user(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(ctx.admin.id),
        Json(UpdateUserRequest {
            name: Some("Head Office".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(me.name, "Head Office");
}

#[tokio::test]
async fn test_create_user_normalizes_and_rejects_duplicates() {
    let ctx = setup().await;
    let request = CreateUserRequest {
        name: "  Meera ".to_string(),
        email: "Meera@Example.COM".to_string(),
        password: "password-123".to_string(),
        role: Role::Staff,
    };

    let (status, Json(user)) =
        users::create_user(ctx.admin.clone(), State(ctx.state.clone()), Json(request.clone()))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user.email, "meera@example.com");
    assert_eq!(user.name, "Meera");
    assert!(user.is_active);

    let err = users::create_user(ctx.admin.clone(), State(ctx.state.clone()), Json(request))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = users::list_users(ctx.deo.clone(), State(ctx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn test_login_and_password_change() {
    let ctx = setup().await;
    let hash = PasswordHasher::hash("first-password".to_string()).await.unwrap();
    let user = ctx
        .state
        .repo
        .create_user(NewUser {
            name: "Kiran".to_string(),
            email: "kiran@example.com".to_string(),
            password_hash: hash,
            role: Role::Staff,
        })
        .await
        .unwrap();
    let kiran = AuthUser {
        id: user.id,
        role: Role::Staff,
    };

    let (jar, Json(login)) = session::login(
        State(ctx.state.clone()),
        CookieJar::new(),
        Json(LoginRequest {
            email: " KIRAN@example.com".to_string(),
            password: "first-password".to_string(),
            next: Some("/app/withdrawals".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(login.user.id, user.id);
    assert_eq!(login.redirect_to, "/app/withdrawals");
    assert_eq!(jar.get("session").map(|c| c.value().to_string()), Some(login.token));

    let err = users::change_my_password(
        kiran.clone(),
        State(ctx.state.clone()),
        Json(ChangePasswordRequest {
            current_password: "not-it".to_string(),
            new_password: "second-password".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let status = users::change_my_password(
        kiran,
        State(ctx.state.clone()),
        Json(ChangePasswordRequest {
            current_password: "first-password".to_string(),
            new_password: "second-password".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = session::login(
        State(ctx.state.clone()),
        CookieJar::new(),
        Json(LoginRequest {
            email: "kiran@example.com".to_string(),
            password: "first-password".to_string(),
            next: Some("https://evil.example.com".to_string()),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    let (_, Json(login)) = session::login(
        State(ctx.state.clone()),
        CookieJar::new(),
        Json(LoginRequest {
            email: "kiran@example.com".to_string(),
            password: "second-password".to_string(),
            next: Some("https://evil.example.com".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(login.redirect_to, "/app/dashboard");
}

#[tokio::test]
async fn test_inactive_account_cannot_sign_in() {
    let ctx = setup().await;
    let hash = PasswordHasher::hash("password-1".to_string()).await.unwrap();
    let user = ctx
        .state
        .repo
        .create_user(NewUser {
            name: "Gone".to_string(),
            email: "gone@example.com".to_string(),
            password_hash: hash,
            role: Role::Deo,
        })
        .await
        .unwrap();
    ctx.state
        .repo
        .update_user(
            user.id,
            UpdateUserRequest {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = session::login(
        State(ctx.state.clone()),
        CookieJar::new(),
        Json(LoginRequest {
            email: "gone@example.com".to_string(),
            password: "password-1".to_string(),
            next: None,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

// --- Clients ---

#[tokio::test]
async fn test_client_crud_and_search() {
    let ctx = setup().await;
    for (name, phone) in [("Sharma Stores", "9822000001"), ("Patil Agencies", "9822000002")] {
        clients::create_client(
            ctx.deo.clone(),
            State(ctx.state.clone()),
            Json(CreateClientRequest {
                name: name.to_string(),
                phone: phone.to_string(),
                email: None,
                address: None,
                notes: None,
            }),
        )
        .await
        .unwrap();
    }

    let Json(found) = clients::list_clients(
        ctx.deo.clone(),
        State(ctx.state.clone()),
        Query(SearchQuery {
            search: Some("PATIL".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].created_by, ctx.deo.id);

    let Json(by_phone) = clients::list_clients(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Query(SearchQuery {
            search: Some("000001".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(by_phone[0].name, "Sharma Stores");

    // Staff have no client access; DEOs cannot delete.
    let err = clients::list_clients(
        ctx.staff.clone(),
        State(ctx.state.clone()),
        Query(SearchQuery::default()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = clients::delete_client(ctx.deo.clone(), State(ctx.state.clone()), Path(found[0].id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let status =
        clients::delete_client(ctx.admin.clone(), State(ctx.state.clone()), Path(found[0].id))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let err = clients::get_client(ctx.deo.clone(), State(ctx.state.clone()), Path(found[0].id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

// --- Posts ---

fn post_request() -> CreatePostRequest {
    CreatePostRequest {
        title: "Field Surveyor".to_string(),
        organization: "Zilla Parishad".to_string(),
        location: "Satara".to_string(),
        vacancies: 4,
        qualification: "Diploma in Civil Engineering".to_string(),
        salary: None,
        last_date: NaiveDate::from_ymd_opt(2099, 12, 31).unwrap(),
        description: String::new(),
        contact: Some("0216-2233445".to_string()),
        image_key: None,
    }
}

#[tokio::test]
async fn test_posts_are_hidden_until_published() {
    let ctx = setup().await;
    let (_, Json(post)) =
        posts::create_post(ctx.deo.clone(), State(ctx.state.clone()), Json(post_request()))
            .await
            .unwrap();
    assert!(!post.is_published);

    let err = posts::get_published_post(State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    let Json(public) = posts::list_published_posts(State(ctx.state.clone()), Query(SearchQuery::default()))
        .await
        .unwrap();
    assert!(public.is_empty());

    // DEOs can preview but not publish.
    let Json(preview) = posts::preview_poster(ctx.deo.clone(), State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap();
    assert_eq!(preview.headline, "FIELD SURVEYOR");
    let err = posts::publish_post(
        ctx.deo.clone(),
        State(ctx.state.clone()),
        Path(post.id),
        Json(PublishPostRequest { is_published: true }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    posts::publish_post(
        ctx.admin.clone(),
        State(ctx.state.clone()),
        Path(post.id),
        Json(PublishPostRequest { is_published: true }),
    )
    .await
    .unwrap();

    let Json(poster) = posts::get_published_poster(State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap();
    assert!(!poster.closed);
    assert!(poster.share_text.contains("Contact: 0216-2233445"));

    let Json(public) = posts::list_published_posts(
        State(ctx.state.clone()),
        Query(SearchQuery {
            search: Some("surveyor".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(public.len(), 1);

    let status = posts::delete_post(ctx.admin.clone(), State(ctx.state.clone()), Path(post.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Dashboard ---

#[tokio::test]
async fn test_dashboard_is_role_aware() {
    let ctx = setup().await;
    earn(&ctx, &ctx.deo, 700).await;
    new_task(&ctx, &ctx.deo, 100).await;
    new_task(&ctx, &ctx.staff, 100).await;

    let Json(admin_view) = dashboard::get_dashboard(ctx.admin.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    let Dashboard::Admin(stats) = admin_view else {
        panic!("admins get the system counters");
    };
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.open_tasks, 2);

    let Json(deo_view) = dashboard::get_dashboard(ctx.deo.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    let Dashboard::Worker(deo_board) = deo_view else {
        panic!("deo gets a worker dashboard");
    };
    assert_eq!(deo_board.tasks.approved, 1);
    assert_eq!(deo_board.tasks.pending, 1);
    assert_eq!(deo_board.balance.available_cents, 700);
    assert_eq!(deo_board.total_clients, Some(0));

    let Json(staff_view) = dashboard::get_dashboard(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    let Dashboard::Worker(staff_board) = staff_view else {
        panic!("staff gets a worker dashboard");
    };
    assert_eq!(staff_board.total_clients, None);

    let err = dashboard::get_admin_stats(ctx.staff.clone(), State(ctx.state.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

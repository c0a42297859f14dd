use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    AppState,
    access::{home_page, sanitize_next},
    auth::{
        MaybeAuthUser, PasswordHasher, expired_session_cookie, issue_session_token,
        normalize_email, session_cookie,
    },
    error::{AppError, AppResult},
    models::{LoginRequest, LoginResponse},
};

/// login
///
/// [Public Route] Verifies email and password, sets the `session` cookie and returns
/// the token plus where the client should go next. Unknown email, wrong password and
/// deactivated accounts all get the same 401.
#[utoipa::path(
    post,
    path = "/login",
    tag = "session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    payload.validate()?;
    let email = normalize_email(&payload.email);

    let Some(user) = state
        .repo
        .find_user_by_email(&email)
        .await?
        .filter(|u| u.is_active)
    else {
        PasswordHasher::verify_unknown(payload.password).await?;
        tracing::warn!(email = %email, "sign-in rejected: unknown or inactive account");
        return Err(AppError::Unauthorized);
    };

    if !PasswordHasher::verify(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(user_id = %user.id, "sign-in rejected: wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = issue_session_token(user.id, &state.config)?;
    let redirect_to = payload
        .next
        .as_deref()
        .and_then(sanitize_next)
        .unwrap_or_else(|| home_page(user.role).href());

    tracing::info!(user_id = %user.id, role = %user.role, "signed in");

    let jar = jar.add(session_cookie(token.clone(), &state.config));
    Ok((
        jar,
        Json(LoginResponse {
            user,
            token,
            redirect_to,
        }),
    ))
}

/// logout
///
/// [Public Route] Clears the session cookie and sends the browser to the login page.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "session",
    responses((status = 303, description = "Redirect to /login"))
)]
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (jar.remove(expired_session_cookie()), Redirect::to("/login"))
}

/// login_page
///
/// [Public Route] Signed-in users are bounced to their home page.
#[utoipa::path(
    get,
    path = "/login",
    tag = "session",
    responses(
        (status = 200, description = "Login page descriptor"),
        (status = 303, description = "Already signed in")
    )
)]
pub async fn login_page(MaybeAuthUser(user): MaybeAuthUser) -> Response {
    match user {
        Some(user) => Redirect::to(&home_page(user.role).href()).into_response(),
        None => Json(serde_json::json!({ "page": "login" })).into_response(),
    }
}

use std::convert::Infallible;

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    access::{Capability, Role},
    config::{AppConfig, Env},
    error::{AppError, AppResult},
    models::User,
    repository::{NewUser, RepositoryState},
};

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "session";

/// Claims
///
/// Payload of a session token. Only the user id is trusted from the token; the role
/// and active flag are re-read from the repository on every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Signs a session token for `user_id`, valid for the configured session lifetime.
pub fn issue_session_token(user_id: Uuid, config: &AppConfig) -> AppResult<String> {
    let now = chrono::Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now.saturating_add(usize::try_from(config.session_ttl_secs).unwrap_or(usize::MAX)),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("failed to sign session token: {e}")))
}

/// Verifies signature and expiry; `None` for any invalid token.
pub fn decode_session_token(token: &str, config: &AppConfig) -> Option<Claims> {
    let key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "rejected session token");
            None
        }
    }
}

pub fn session_cookie(token: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(config.cookie_secure)
        .build()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// PasswordHasher
///
/// Argon2id hashing with a random salt per password. The async helpers run the
/// CPU-bound work on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn new() -> Self {
        Self
    }

    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
    }

    /// `Ok(false)` on a wrong password; `Err` only for a corrupt stored hash.
    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::internal(format!("invalid password hash format: {e}")))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::internal(format!("password verification failed: {e}"))),
        }
    }

    pub async fn hash(password: String) -> AppResult<String> {
        tokio::task::spawn_blocking(move || PasswordHasher::new().hash_password(&password))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?
    }

    pub async fn verify(password: String, hash: String) -> AppResult<bool> {
        tokio::task::spawn_blocking(move || PasswordHasher::new().verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("verification task failed: {e}")))?
    }

    /// Runs a full verification against a throwaway hash so sign-in for an unknown
    /// account costs the same as a wrong password. Always `Ok(false)`.
    pub async fn verify_unknown(password: String) -> AppResult<bool> {
        static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();
        let hash = DUMMY_HASH
            .get_or_try_init(|| PasswordHasher::hash("unknown-account-placeholder".to_string()))
            .await?
            .clone();
        PasswordHasher::verify(password, hash).await.map(|_| false)
    }
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// `Forbidden` unless the caller's role grants `capability`.
    pub fn require(&self, capability: Capability) -> AppResult<()> {
        if self.role.can(capability) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, ?capability, "capability denied");
            Err(AppError::Forbidden)
        }
    }
}

async fn load_active_user(repo: &RepositoryState, user_id: Uuid) -> Result<AuthUser, StatusCode> {
    match repo.get_user(user_id).await {
        Ok(Some(user)) if user.is_active => Ok(AuthUser {
            id: user.id,
            role: user.role,
        }),
        Ok(Some(_)) => {
            tracing::warn!(user_id = %user_id, "session for deactivated account rejected");
            Err(StatusCode::UNAUTHORIZED)
        }
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(e) => {
            tracing::error!(error = ?e, "user lookup failed during authentication");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Sources are tried in order:
/// 1. An identity already resolved by the auth middleware for this request.
/// 2. Local bypass: an `x-user-id` header naming an existing user (Env::Local only).
/// 3. The `session` cookie.
/// 4. An `Authorization: Bearer` header.
///
/// The token user must still exist and be active. Rejection: 401 on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass {
                if let Ok(user) = load_active_user(&repo, user_id).await {
                    return Ok(user);
                }
            }
        }

        // A stale cookie must not hide a valid bearer token on the same request.
        let from_cookie = CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());
        let from_bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        let claims = from_cookie
            .into_iter()
            .chain(from_bearer)
            .find_map(|token| decode_session_token(&token, &config))
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let user = load_active_user(&repo, claims.sub).await?;

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// MaybeAuthUser
///
/// Infallible variant for front-controller pages, which redirect instead of rejecting.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

/// bootstrap_admin
///
/// Creates the first administrator when the user table is empty and seed credentials
/// are configured. Returns the created account, or `None` when nothing was done.
pub async fn bootstrap_admin(repo: &RepositoryState, config: &AppConfig) -> AppResult<Option<User>> {
    let Some(seed) = &config.bootstrap_admin else {
        return Ok(None);
    };
    if repo.count_users().await? > 0 {
        return Ok(None);
    }

    let password_hash = PasswordHasher::hash(seed.password.clone()).await?;
    let user = repo
        .create_user(NewUser {
            name: seed.name.clone(),
            email: normalize_email(&seed.email),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::warn!(email = %user.email, "created bootstrap admin account; change its password");
    Ok(Some(user))
}

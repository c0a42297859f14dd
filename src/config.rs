use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState` (pulled out by handlers and extractors via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev bypass, cookie flags and log format.
    pub env: Env,
    // Postgres connection string. `None` in local mode selects the in-memory store.
    pub db_url: Option<String>,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token, in seconds.
    pub session_ttl_secs: u64,
    // Marks the session cookie `Secure`.
    pub cookie_secure: bool,
    // S3-compatible storage endpoint URL (MinIO in local).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket holding post images and attachments.
    pub s3_bucket: String,
    // Credentials for the first admin, created when the user table is empty.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Env
///
/// Runtime context: development conveniences versus hardened production settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Seed credentials for the very first administrator account.
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// ConfigError
///
/// Raised when a variable required for the current environment is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

const LOCAL_JWT_SECRET: &str = "local-development-session-secret";
const DEFAULT_SESSION_TTL_SECS: u64 = 8 * 60 * 60;
/// Sessions last at most 30 days.
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Default for AppConfig {
    /// Safe, non-panicking configuration used for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            cookie_secure: false,
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "backoffice-test".to_string(),
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Production refuses to start
    /// without its database, session secret and storage credentials.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| (1..=MAX_SESSION_TTL_SECS).contains(secs))
                .ok_or_else(|| ConfigError::Invalid {
                    name: "SESSION_TTL_SECS",
                    value: raw.clone(),
                })?,
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => Ok(Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                session_ttl_secs,
                cookie_secure: false,
                s3_endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "admin".to_string()),
                s3_secret: env::var("S3_SECRET_KEY").unwrap_or_else(|_| "password".to_string()),
                s3_bucket: env::var("S3_BUCKET_NAME")
                    .unwrap_or_else(|_| "backoffice-uploads".to_string()),
                bootstrap_admin: Some(BootstrapAdmin {
                    name: "Administrator".to_string(),
                    email: env::var("ADMIN_EMAIL")
                        .unwrap_or_else(|_| "admin@backoffice.local".to_string()),
                    password: env::var("ADMIN_PASSWORD")
                        .unwrap_or_else(|_| "change-me-now".to_string()),
                }),
            }),
            Env::Production => {
                let bootstrap_admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
                    (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                        name: "Administrator".to_string(),
                        email,
                        password,
                    }),
                    _ => None,
                };

                Ok(Self {
                    env: Env::Production,
                    db_url: Some(required("DATABASE_URL")?),
                    bind_addr,
                    jwt_secret: required("JWT_SECRET")?,
                    session_ttl_secs,
                    cookie_secure: true,
                    s3_endpoint: required("S3_ENDPOINT")?,
                    s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                    s3_key: required("S3_ACCESS_KEY")?,
                    s3_secret: required("S3_SECRET_KEY")?,
                    s3_bucket: env::var("S3_BUCKET_NAME")
                        .unwrap_or_else(|_| "backoffice-uploads".to_string()),
                    bootstrap_admin,
                })
            }
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

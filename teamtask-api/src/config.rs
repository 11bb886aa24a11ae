/// Configuration management for the API server
///
/// Loads configuration from environment variables (and a `.env` file in
/// development) into typed structs. Missing or malformed required values are
/// startup errors.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `APP_ENV`: `development` or `production` (default: development)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `REQUEST_TIMEOUT_SECS`: Per-request deadline (default: 5)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_ACCESS_SECRET`, `JWT_REFRESH_SECRET`: Signing secrets (required, at least 32 bytes, distinct)
/// - `JWT_ISSUER`: `iss` claim (default: teamtask)
/// - `JWT_AUDIENCE`: `aud` claim (default: teamtask-frontend)
/// - `SESSION_POLICY`: `single` or `concurrent` (default: single)
/// - `RUST_LOG`, `LOG_FORMAT`: Read by `main` for logging setup
///
/// # Example
///
/// ```no_run
/// use teamtask_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use teamtask_shared::auth::jwt::JwtConfig;
use teamtask_shared::auth::policy::SessionPolicy;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    pub session_policy: SessionPolicy,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// `true` when `APP_ENV=production`; marks the refresh cookie `Secure`
    pub production: bool,

    pub cors_origins: Vec<String>,
    pub request_timeout: Duration,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token signing configuration
#[derive(Clone)]
pub struct JwtSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl JwtSettings {
    /// Issuer configuration with the default token lifetimes
    pub fn to_jwt_config(&self) -> JwtConfig {
        JwtConfig {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            ..JwtConfig::new(self.access_secret.clone(), self.refresh_secret.clone())
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing, a value does not
    /// parse, or the signing secrets are too short or identical.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} environment variable is required", key))
        };

        let host = get("API_HOST", "0.0.0.0");
        let port = parse("API_PORT", &get("API_PORT", "8080"))?;
        let production = match get("APP_ENV", "development").trim().to_ascii_lowercase().as_str() {
            "production" => true,
            "development" | "test" => false,
            other => anyhow::bail!("APP_ENV must be 'development' or 'production', got '{}'", other),
        };

        let cors_origins = get("CORS_ORIGINS", "*")
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let timeout_secs: u64 = parse("REQUEST_TIMEOUT_SECS", &get("REQUEST_TIMEOUT_SECS", "5"))?;
        if timeout_secs == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            max_connections: parse("DATABASE_MAX_CONNECTIONS", &get("DATABASE_MAX_CONNECTIONS", "10"))?,
        };

        let jwt = JwtSettings {
            access_secret: required("JWT_ACCESS_SECRET")?,
            refresh_secret: required("JWT_REFRESH_SECRET")?,
            issuer: get("JWT_ISSUER", "teamtask"),
            audience: get("JWT_AUDIENCE", "teamtask-frontend"),
        };
        jwt.to_jwt_config().validate()?;

        let session_policy = SessionPolicy::from_str(&get("SESSION_POLICY", "single"))?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                production,
                cors_origins,
                request_timeout: Duration::from_secs(timeout_secs),
            },
            database,
            jwt,
            session_policy,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e))
}

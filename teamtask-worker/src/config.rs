/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `TOKEN_PURGE_INTERVAL_SECS`: How often expired refresh tokens are purged (default: 3600)
/// - `TOKEN_RETENTION_HOURS`: How long expired refresh tokens are kept (default: 24)
/// - `REMINDER_INTERVAL_SECS`: How often due tasks are checked (default: 300)
/// - `REMINDER_WINDOW_MINUTES`: How far ahead a task counts as due (default: 60)

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub token_purge_interval: Duration,
    pub token_retention: chrono::Duration,
    pub reminder_interval: Duration,
    pub reminder_window: chrono::Duration,
}

impl WorkerConfig {
    /// Loads configuration from the environment and `.env`
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let positive = |key: &str, default: u64| -> anyhow::Result<u64> {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            let value: u64 = raw
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))?;
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", key);
            }
            Ok(value)
        };

        let purge_secs = positive("TOKEN_PURGE_INTERVAL_SECS", 3600)?;
        let retention_hours = positive("TOKEN_RETENTION_HOURS", 24)?;
        let reminder_secs = positive("REMINDER_INTERVAL_SECS", 300)?;
        let window_minutes = positive("REMINDER_WINDOW_MINUTES", 60)?;

        Ok(WorkerConfig {
            database_url,
            token_purge_interval: Duration::from_secs(purge_secs),
            token_retention: chrono::Duration::hours(retention_hours as i64),
            reminder_interval: Duration::from_secs(reminder_secs),
            reminder_window: chrono::Duration::minutes(window_minutes as i64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<WorkerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_source(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/teamtask")]).unwrap();

        assert_eq!(config.token_purge_interval, Duration::from_secs(3600));
        assert_eq!(config.token_retention, chrono::Duration::hours(24));
        assert_eq!(config.reminder_interval, Duration::from_secs(300));
        assert_eq!(config.reminder_window, chrono::Duration::minutes(60));
    }

    #[test]
    fn test_overrides_and_errors() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/teamtask"),
            ("REMINDER_WINDOW_MINUTES", "15"),
        ])
        .unwrap();
        assert_eq!(config.reminder_window, chrono::Duration::minutes(15));

        assert!(load(&[]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("TOKEN_RETENTION_HOURS", "0")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("REMINDER_INTERVAL_SECS", "soon")]).is_err());
    }
}

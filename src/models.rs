//! Shared configuration and application state

use crate::{auth::JwtHandler, error::EngineError, games::GameRegistry, store::RoundStore};
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    /// Lowercased administrator principals. Must be non-empty.
    pub admin_emails: Vec<String>,
    /// Shared secret for verifying admin session tokens.
    pub jwt_secret: String,
    /// CORS origins; "*" means permissive.
    pub allowed_origins: Vec<String>,
    /// Fixed UTC offset of the game clock, in minutes (default IST, +330).
    pub tz_offset_minutes: i32,
    /// Seconds after a bucket boundary before the engine acts on it.
    pub grace_secs: i64,
    /// Interval of the internal scheduler loops.
    pub tick_secs: u64,
    /// Buckets before the target each tick re-checks.
    pub catchup_buckets: u32,
    /// Retention horizon in days; 0 disables purging.
    pub retention_days: i64,
    /// Run the internal per-game tick loops (off when an external cron
    /// drives the tick endpoint instead).
    pub scheduler_enabled: bool,
    /// Optional shared secret required by the tick endpoint.
    pub cron_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./roundhouse.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let admin_emails: Vec<String> = std::env::var("ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if admin_emails.is_empty() {
            return Err(EngineError::FatalConfig(
                "ADMIN_EMAILS must list at least one administrator".to_string(),
            ));
        }

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| EngineError::FatalConfig("JWT_SECRET is required".to_string()))?;

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let tz_offset_minutes = std::env::var("TZ_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(330);

        let grace_secs = std::env::var("GRACE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let tick_secs = std::env::var("TICK_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let catchup_buckets = std::env::var("CATCHUP_BUCKETS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);

        let retention_days = std::env::var("RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7);

        let scheduler_enabled = std::env::var("SCHEDULER_ENABLED")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(true);

        let cron_secret = std::env::var("CRON_SECRET").ok().filter(|s| !s.is_empty());

        Ok(Self {
            database_path,
            port,
            admin_emails,
            jwt_secret,
            allowed_origins,
            tz_offset_minutes,
            grace_secs,
            tick_secs,
            catchup_buckets,
            retention_days,
            scheduler_enabled,
            cron_secret,
        })
    }

    pub fn is_admin(&self, principal: &str) -> bool {
        self.admin_emails.iter().any(|e| e == principal)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RoundStore>,
    pub games: Arc<GameRegistry>,
    pub config: Arc<Config>,
    pub jwt: Arc<JwtHandler>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_path: ":memory:".to_string(),
            port: 8080,
            admin_emails: vec!["admin@example.com".to_string()],
            jwt_secret: "secret".to_string(),
            allowed_origins: vec!["*".to_string()],
            tz_offset_minutes: 330,
            grace_secs: 5,
            tick_secs: 10,
            catchup_buckets: 3,
            retention_days: 7,
            scheduler_enabled: true,
            cron_secret: None,
        }
    }

    #[test]
    fn test_is_admin_exact_match() {
        let config = test_config();
        assert!(config.is_admin("admin@example.com"));
        assert!(!config.is_admin("intruder@example.com"));
        // Callers are expected to normalize before the check
        assert!(!config.is_admin("Admin@Example.com"));
    }
}

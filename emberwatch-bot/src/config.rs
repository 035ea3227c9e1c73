use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Introspection server port
    /// Env: PORT (default: 3000)
    pub port: u16,

    /// Database file path
    /// Env: DATABASE_PATH (default: "emberwatch.db")
    pub database_path: String,

    /// Discord API token
    /// Env: DISCORD_TOKEN (required)
    pub discord_token: Option<String>,

    /// Base URL of the panel API, without trailing slash
    /// Env: PANEL_BASE_URL (required)
    pub panel_base_url: Option<String>,

    /// Bearer token for the panel API
    /// Env: PANEL_API_KEY (required)
    pub panel_api_key: Option<String>,

    /// How often the reconciler wakes up to look for due statuses
    /// Env: TICK_INTERVAL_SECS (default: 60)
    pub tick_interval: Duration,

    /// Minimum age of a status before it is refreshed again. Lower it for
    /// low-latency/test deployments.
    /// Env: REFRESH_INTERVAL_SECS (default: 300)
    pub refresh_interval: Duration,

    /// Per-request timeout for panel reads; expiry counts as the server
    /// being unavailable this cycle
    /// Env: PANEL_TIMEOUT_SECS (default: 10)
    pub panel_timeout: Duration,

    /// Request timeout for the introspection routes
    /// Env: REQUEST_TIMEOUT_SECS (default: 30)
    pub request_timeout: Duration,

    /// Drop samples older than this many days; 0 keeps history forever
    /// Env: SAMPLE_RETENTION_DAYS (default: 0)
    pub sample_retention_days: u32,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            port: env_or_default("PORT", 3000),
            database_path: env_or_default_string("DATABASE_PATH", "emberwatch.db"),
            discord_token: var("DISCORD_TOKEN")
                .expect("DISCORD_TOKEN environment variable is required")
                .into(),
            panel_base_url: var("PANEL_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .expect("PANEL_BASE_URL environment variable is required")
                .into(),
            panel_api_key: var("PANEL_API_KEY")
                .expect("PANEL_API_KEY environment variable is required")
                .into(),
            tick_interval: Duration::from_secs(env_or_default("TICK_INTERVAL_SECS", 60)),
            refresh_interval: Duration::from_secs(env_or_default("REFRESH_INTERVAL_SECS", 300)),
            panel_timeout: Duration::from_secs(env_or_default("PANEL_TIMEOUT_SECS", 10)),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 30)),
            sample_retention_days: env_or_default("SAMPLE_RETENTION_DAYS", 0),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            port: 3000,
            database_path: "emberwatch.db".to_string(),
            discord_token: None,
            panel_base_url: None,
            panel_api_key: None,
            tick_interval: Duration::from_secs(60),
            refresh_interval: Duration::from_secs(300),
            panel_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            sample_retention_days: 0,
        }
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_path, "emberwatch.db");
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.panel_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.sample_retention_days, 0);
    }
}

//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// HS256 secret shared with the auth service
    pub jwt_secret: String,
    /// Allowed client origin for CORS (comma-separated)
    pub client_origin: String,

    /// Lifecycle timings for match connections
    pub lifecycle: LifecycleConfig,

    /// Supabase backend, when configured
    pub supabase: Option<SupabaseConfig>,

    /// Friend pairs preloaded into the in-memory store (`DEV_FRIENDSHIPS=ana:bo,cy:di`)
    pub dev_friendships: Vec<(String, String)>,
}

/// Disconnect / reconnect timings
#[derive(Clone, Copy, Debug)]
pub struct LifecycleConfig {
    /// How long a match waits for a dropped player before forfeiting them
    pub reconnection_grace: Duration,
    /// Connections shorter than this are treated as transient flaps
    pub unstable_threshold: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reconnection_grace: Duration::ZERO,
            unstable_threshold: Duration::from_secs(1),
        }
    }
}

/// PostgREST credentials for the match / profile tables
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Supabase project URL
    pub url: String,
    /// Supabase service role key (bypasses RLS - server only!)
    pub service_role_key: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let lifecycle = LifecycleConfig {
            reconnection_grace: Duration::from_secs(parse_var("RECONNECTION_GRACE_SECS", 0)?),
            unstable_threshold: Duration::from_millis(parse_var("UNSTABLE_CONNECTION_MS", 1000)?),
        };

        let supabase = match (env::var("SUPABASE_URL"), env::var("SUPABASE_SERVICE_ROLE_KEY")) {
            (Ok(url), Ok(service_role_key)) => Some(SupabaseConfig {
                url,
                service_role_key,
            }),
            _ => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),

            lifecycle,
            supabase,
            dev_friendships: match env::var("DEV_FRIENDSHIPS") {
                Ok(raw) => parse_friendships(&raw)?,
                Err(_) => Vec::new(),
            },
        })
    }
}

/// Parse `a:b,c:d` into friend pairs. Blank entries are skipped.
pub fn parse_friendships(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
                Ok((a.trim().to_string(), b.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidFriendship(entry.to_string())),
        })
        .collect()
}

#[cfg(test)]
impl Config {
    /// Local settings with an in-memory store
    pub(crate) fn for_tests() -> Self {
        Self {
            server_addr: ([127, 0, 0, 1], 0).into(),
            log_level: "debug".into(),
            jwt_secret: "secret".into(),
            client_origin: "http://localhost:3000".into(),
            lifecycle: LifecycleConfig::default(),
            supabase: None,
            dev_friendships: Vec::new(),
        }
    }
}

fn parse_var(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be a non-negative integer")]
    InvalidNumber(&'static str),

    #[error("DEV_FRIENDSHIPS entry {0:?} is not of the form user:user")]
    InvalidFriendship(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grace_period_is_immediate() {
        let lifecycle = LifecycleConfig::default();
        assert_eq!(lifecycle.reconnection_grace, Duration::ZERO);
        assert_eq!(lifecycle.unstable_threshold, Duration::from_secs(1));
    }

    #[test]
    fn friendships_parse_from_pairs() {
        let pairs = parse_friendships(" ana:bo, ,cy : di ").unwrap();
        assert_eq!(
            pairs,
            vec![("ana".to_string(), "bo".to_string()), ("cy".to_string(), "di".to_string())]
        );
        assert!(parse_friendships("").unwrap().is_empty());
        assert!(matches!(
            parse_friendships("ana:bo,cy"),
            Err(ConfigError::InvalidFriendship(entry)) if entry == "cy"
        ));
        assert!(parse_friendships("ana:").is_err());
    }
}

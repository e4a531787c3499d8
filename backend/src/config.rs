use std::env;
use std::time::Duration;

use crate::services::RatingAggregation;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL; in-memory backends are used when unset
    pub database_url: Option<String>,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Leaderboard cache TTL in seconds (default: 300 = 5 minutes)
    pub cache_ttl_secs: u64,
    /// Background recompute interval in seconds (default: 3600 = 1 hour)
    pub recompute_interval_secs: u64,
    /// How ratings collapse into the rating component (default: sum)
    pub rating_aggregation: RatingAggregation,
    /// JSON fixture loaded into the in-memory backends
    pub seed_path: Option<String>,
    /// Hex SHA-256 of the admin bearer token
    pub admin_token_hash: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = optional_var("DATABASE_URL");

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let cache_ttl_secs = env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("CACHE_TTL_SECS"))?;

        let recompute_interval_secs: u64 = env::var("RECOMPUTE_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("RECOMPUTE_INTERVAL_SECS"))?;
        if recompute_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("RECOMPUTE_INTERVAL_SECS"));
        }

        let rating_aggregation = env::var("RATING_AGGREGATION")
            .unwrap_or_else(|_| "sum".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("RATING_AGGREGATION"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            cache_ttl_secs,
            recompute_interval_secs,
            rating_aggregation,
            seed_path: optional_var("TRENDING_SEED_PATH"),
            admin_token_hash: optional_var("ADMIN_TOKEN_HASH"),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn recompute_interval(&self) -> Duration {
        Duration::from_secs(self.recompute_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache_ttl_secs: 300,
            recompute_interval_secs: 3600,
            rating_aggregation: RatingAggregation::default(),
            seed_path: None,
            admin_token_hash: None,
        }
    }
}

/// Unset and blank are both treated as absent
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.recompute_interval(), Duration::from_secs(3600));
        assert_eq!(config.rating_aggregation, RatingAggregation::DecayedSum);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidValue("PORT").to_string(),
            "Invalid value for environment variable: PORT"
        );
    }
}

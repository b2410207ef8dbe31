use serde::Deserialize;
use std::env;

use crate::utils::retry::RetryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub submit_retry_attempts: usize,
}

impl EngineConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            // Fallback to current directory .env for backward compatibility
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| {
                eprintln!("WARNING: MONGO_URI not set, using local default");
                "mongodb://localhost:27017".to_string()
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizegon".to_string());

        let submit_retry_attempts = settings
            .get_int("engine.submit_retry_attempts")
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .or_else(|| {
                env::var("SUBMIT_RETRY_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .filter(|&n| n > 0)
            .unwrap_or(5);

        Ok(EngineConfig {
            mongo_uri,
            mongo_database,
            submit_retry_attempts,
        })
    }

    /// Retry policy for the result write at submission time.
    pub fn submit_retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.submit_retry_attempts,
            ..RetryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_retry_uses_configured_attempts() {
        let config = EngineConfig {
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "quizegon".to_string(),
            submit_retry_attempts: 3,
        };
        assert_eq!(config.submit_retry().max_attempts, 3);
    }
}

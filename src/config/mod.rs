//! Application configuration
//!
//! Settings are layered with figment: compiled defaults, then the TOML file,
//! then `PLAYLIST_SYNC_*` environment variables (`__` separates nested keys,
//! e.g. `PLAYLIST_SYNC_SCHEDULER__POLL_INTERVAL=30s`).

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use crate::job_scheduling::JobType;
use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay between queue polls
    #[serde(default = "default_poll_interval", with = "duration_serde::duration")]
    pub poll_interval: Duration,
    /// Ceiling applied to jobs enqueued without an attempt limit
    #[serde(default = "default_absolute_max_attempts")]
    pub absolute_max_attempts: i32,
    /// Per job type attempt limits, keyed by snake_case job type
    #[serde(default = "default_max_attempts")]
    pub max_attempts: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub timeout: Duration,
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit newline-delimited JSON instead of the human readable format
    #[serde(default = "default_log_json")]
    pub json: bool,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_poll_interval() -> Duration {
    duration_serde::parse_default(DEFAULT_POLL_INTERVAL)
}

fn default_absolute_max_attempts() -> i32 {
    DEFAULT_ABSOLUTE_MAX_ATTEMPTS
}

fn default_max_attempts() -> BTreeMap<String, i32> {
    [JobType::ProviderSync, JobType::PlaylistSync]
        .iter()
        .map(|job_type| (job_type.to_string(), DEFAULT_SYNC_MAX_ATTEMPTS))
        .collect()
}

fn default_fetch_timeout() -> Duration {
    duration_serde::parse_default(DEFAULT_FETCH_TIMEOUT)
}

fn default_max_document_size() -> usize {
    DEFAULT_MAX_DOCUMENT_SIZE
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_log_json() -> bool {
    DEFAULT_LOG_JSON
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            absolute_max_attempts: default_absolute_max_attempts(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            max_document_size: default_max_document_size(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_log_json(),
        }
    }
}

impl SchedulerConfig {
    /// Configured attempt limit for a job type; `None` means unlimited
    pub fn max_attempts_for(&self, job_type: JobType) -> Option<i32> {
        self.max_attempts.get(&job_type.to_string()).copied()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.absolute_max_attempts < 1 {
            return Err(AppError::configuration(format!(
                "scheduler.absolute_max_attempts must be at least 1, got {}",
                self.absolute_max_attempts
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(AppError::configuration(
                "scheduler.poll_interval must be greater than zero",
            ));
        }
        for (job_type, limit) in &self.max_attempts {
            if job_type.parse::<JobType>().is_err() {
                return Err(AppError::configuration(format!(
                    "scheduler.max_attempts: unknown job type '{job_type}'"
                )));
            }
            if *limit < 1 || *limit > self.absolute_max_attempts {
                return Err(AppError::configuration(format!(
                    "scheduler.max_attempts.{job_type} must be between 1 and {}, got {limit}",
                    self.absolute_max_attempts
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Build the layered figment for a config file path
    pub fn figment(config_file: &str) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
    }

    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if !Path::new(config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(config_file, contents)
                .with_context(|| format!("Failed to write default config file: {config_file}"))?;
            info!("Created default config file: {}", config_file);
        }

        let config: Config = Self::figment(config_file)
            .extract()
            .with_context(|| format!("Failed to load configuration from {config_file}"))?;
        config.scheduler.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(15));
        assert_eq!(config.scheduler.absolute_max_attempts, 100);
        assert_eq!(config.scheduler.max_attempts_for(JobType::PlaylistSync), Some(3));
        assert_eq!(config.scheduler.max_attempts_for(JobType::ProviderSync), Some(3));
        assert_eq!(config.scheduler.max_attempts_for(JobType::GuideGen), None);
        assert!(config.scheduler.validate().is_ok());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_str().unwrap();

        let config = Config::load_from_file(path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("poll_interval = \"15s\""));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[scheduler]
poll_interval = "2m"

[scheduler.max_attempts]
guide_gen = 7
"#,
        )
        .unwrap();

        let config = Config::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.scheduler.poll_interval, Duration::from_secs(120));
        assert_eq!(config.scheduler.max_attempts_for(JobType::GuideGen), Some(7));
        assert_eq!(config.scheduler.absolute_max_attempts, 100);
        assert_eq!(config.fetcher.max_document_size, DEFAULT_MAX_DOCUMENT_SIZE);
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[scheduler]
poll_interval = "2m"
"#,
            )?;
            jail.set_env("PLAYLIST_SYNC_SCHEDULER__POLL_INTERVAL", "45s");
            jail.set_env("PLAYLIST_SYNC_LOGGING__JSON", "true");

            let config = Config::load_from_file("config.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.poll_interval, Duration::from_secs(45));
            assert!(config.logging.json);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_limit_above_ceiling() {
        let mut scheduler = SchedulerConfig::default();
        scheduler
            .max_attempts
            .insert("playlist_sync".to_string(), 500);
        let err = scheduler.validate().unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert_eq!(
            err.to_string(),
            "Configuration error: scheduler.max_attempts.playlist_sync must be between 1 and 100, got 500"
        );

        let mut scheduler = SchedulerConfig::default();
        scheduler.max_attempts.insert("bogus".to_string(), 2);
        assert!(matches!(
            scheduler.validate(),
            Err(AppError::Configuration { .. })
        ));
    }

    #[test]
    fn test_invalid_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\nabsolute_max_attempts = 0\n").unwrap();

        let err = Config::load_from_file(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AppError>(),
            Some(AppError::Configuration { .. })
        ));
    }
}

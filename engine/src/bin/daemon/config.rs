// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Daemon configuration from environment variables
//!
//! All configuration is read from environment variables with sensible
//! defaults, so the daemon needs no command-line parsing.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use supervisor_engine::constants::{
    DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RESTARTS, DEFAULT_MIN_UPTIME, DEFAULT_STOP_TIMEOUT,
    RESTART_BACKOFF_BASE,
};
use supervisor_engine::{BackoffPolicy, SupervisorConfig};

const DEFAULT_APPS_FILE: &str = "/etc/supervisor/apps.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Daemon configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Apps file to load on start and on SIGHUP
    pub apps_file: PathBuf,

    /// Tracing filter directive
    pub log_level: String,

    /// Write worker output under this directory instead of the daemon log
    pub log_dir: Option<PathBuf>,

    pub min_uptime: Duration,
    pub max_restarts: u32,
    pub stop_timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            apps_file: env::var("SUPERVISOR_APPS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_APPS_FILE)),
            log_level: Self::parse_log_level(),
            log_dir: env::var("SUPERVISOR_LOG_DIR").ok().map(PathBuf::from),
            min_uptime: Self::parse_millis("SUPERVISOR_MIN_UPTIME_MS").unwrap_or(DEFAULT_MIN_UPTIME),
            max_restarts: env::var("SUPERVISOR_MAX_RESTARTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RESTARTS),
            stop_timeout: Self::parse_millis("SUPERVISOR_STOP_TIMEOUT_MS")
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
            backoff: Self::parse_backoff(),
        }
    }

    fn parse_millis(var_name: &str) -> Option<Duration> {
        env::var(var_name)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
    }

    fn parse_backoff() -> BackoffPolicy {
        let policy = env::var("SUPERVISOR_BACKOFF")
            .ok()
            .and_then(|s| BackoffPolicy::parse(&s))
            .unwrap_or_default();
        match policy {
            BackoffPolicy::Exponential { .. } => BackoffPolicy::Exponential {
                factor: RESTART_BACKOFF_BASE,
                max: Self::parse_millis("SUPERVISOR_BACKOFF_MAX_MS").unwrap_or(DEFAULT_BACKOFF_MAX),
            },
            constant => constant,
        }
    }

    fn parse_log_level() -> String {
        // Priority: SUPERVISOR_LOG_LEVEL > RUST_LOG > default
        env::var("SUPERVISOR_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            min_uptime: self.min_uptime,
            max_restarts: self.max_restarts,
            stop_timeout: self.stop_timeout,
            backoff: self.backoff,
            ..SupervisorConfig::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stop_timeout.is_zero() {
            return Err("SUPERVISOR_STOP_TIMEOUT_MS must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUPERVISOR_APPS_FILE",
        "SUPERVISOR_LOG_LEVEL",
        "SUPERVISOR_LOG_DIR",
        "SUPERVISOR_MIN_UPTIME_MS",
        "SUPERVISOR_MAX_RESTARTS",
        "SUPERVISOR_STOP_TIMEOUT_MS",
        "SUPERVISOR_BACKOFF",
        "SUPERVISOR_BACKOFF_MAX_MS",
        "RUST_LOG",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        let config = DaemonConfig::from_env();
        assert_eq!(config.apps_file, PathBuf::from(DEFAULT_APPS_FILE));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.log_dir.is_none());
        assert_eq!(config.min_uptime, DEFAULT_MIN_UPTIME);
        assert_eq!(config.max_restarts, DEFAULT_MAX_RESTARTS);
        assert_eq!(config.stop_timeout, DEFAULT_STOP_TIMEOUT);
        assert_eq!(config.backoff, BackoffPolicy::Constant);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_policy() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUPERVISOR_APPS_FILE", "/srv/apps.yaml");
        env::set_var("SUPERVISOR_LOG_DIR", "/var/log/workers");
        env::set_var("SUPERVISOR_MIN_UPTIME_MS", "2500");
        env::set_var("SUPERVISOR_MAX_RESTARTS", "3");
        env::set_var("SUPERVISOR_STOP_TIMEOUT_MS", "10000");

        let config = DaemonConfig::from_env();
        assert_eq!(config.apps_file, PathBuf::from("/srv/apps.yaml"));
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/workers")));

        let supervisor = config.supervisor_config();
        assert_eq!(supervisor.min_uptime, Duration::from_millis(2500));
        assert_eq!(supervisor.max_restarts, 3);
        assert_eq!(supervisor.stop_timeout, Duration::from_secs(10));
        assert!(supervisor.restart_window.is_none());

        clear_env();
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUPERVISOR_MAX_RESTARTS", "many");
        env::set_var("SUPERVISOR_MIN_UPTIME_MS", "-1");

        let config = DaemonConfig::from_env();
        assert_eq!(config.max_restarts, DEFAULT_MAX_RESTARTS);
        assert_eq!(config.min_uptime, DEFAULT_MIN_UPTIME);

        clear_env();
    }

    #[test]
    fn test_exponential_backoff() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUPERVISOR_BACKOFF", "exponential");
        env::set_var("SUPERVISOR_BACKOFF_MAX_MS", "30000");

        let config = DaemonConfig::from_env();
        assert_eq!(
            config.backoff,
            BackoffPolicy::Exponential {
                factor: RESTART_BACKOFF_BASE,
                max: Duration::from_secs(30),
            }
        );

        clear_env();
    }

    #[test]
    fn test_log_level_priority() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();

        env::set_var("RUST_LOG", "debug");
        assert_eq!(DaemonConfig::from_env().log_level, "debug");

        env::set_var("SUPERVISOR_LOG_LEVEL", "warn");
        assert_eq!(DaemonConfig::from_env().log_level, "warn");

        clear_env();
    }

    #[test]
    fn test_zero_stop_timeout_is_invalid() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        env::set_var("SUPERVISOR_STOP_TIMEOUT_MS", "0");

        assert!(DaemonConfig::from_env().validate().is_err());

        clear_env();
    }
}

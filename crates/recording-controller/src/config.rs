//! Recording Controller configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults. Channel credentials (app id, optional key) are per-session
//! inputs to `start`, not configuration.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Default root directory for per-session recording storage.
pub const DEFAULT_OUTPUT_ROOT: &str = "./output";

/// Default maximum concurrent recording sessions.
pub const DEFAULT_MAX_SESSIONS: u32 = 256;

/// Default controller instance id prefix.
pub const DEFAULT_RC_ID_PREFIX: &str = "rc";

/// Recording Controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory under which per-session storage is allocated.
    pub output_root: PathBuf,

    /// Maximum concurrent recording sessions.
    pub max_sessions: u32,

    /// Unique identifier for this controller instance.
    pub rc_id: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let output_root = vars
            .get("RC_OUTPUT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));

        let max_sessions = vars
            .get("RC_MAX_SESSIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        if max_sessions == 0 {
            return Err(ConfigError::InvalidValue(
                "RC_MAX_SESSIONS must be at least 1".to_string(),
            ));
        }

        // Generate instance id if not provided
        let rc_id = vars.get("RC_ID").cloned().unwrap_or_else(|| {
            let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RC_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            output_root,
            max_sessions,
            rc_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");

        assert_eq!(config.output_root, PathBuf::from(DEFAULT_OUTPUT_ROOT));
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
        assert!(config.rc_id.starts_with("rc-"));
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("RC_OUTPUT_ROOT".to_string(), "/var/recordings".to_string()),
            ("RC_MAX_SESSIONS".to_string(), "16".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load");

        assert_eq!(config.output_root, PathBuf::from("/var/recordings"));
        assert_eq!(config.max_sessions, 16);
    }

    #[test]
    fn test_rc_id_custom_value() {
        let vars = HashMap::from([("RC_ID".to_string(), "rc-custom-001".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert_eq!(config.rc_id, "rc-custom-001");
    }

    #[test]
    fn test_unparseable_max_sessions_falls_back_to_default() {
        let vars = HashMap::from([("RC_MAX_SESSIONS".to_string(), "lots".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert_eq!(config.max_sessions, DEFAULT_MAX_SESSIONS);
    }

    #[test]
    fn test_zero_max_sessions_rejected() {
        let vars = HashMap::from([("RC_MAX_SESSIONS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}

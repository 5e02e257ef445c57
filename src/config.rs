//! Configuration using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. built-in defaults
//! 2. a TOML file (`autosweep.toml` unless another path is given)
//! 3. environment variables prefixed with `AUTOSWEEP_`
//!
//! # Example
//! ```no_run
//! use autosweep::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! println!("Writing runs under {}", config.storage.output_dir.display());
//! # Ok::<(), figment::Error>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "autosweep.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "AUTOSWEEP_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Where run data goes
    #[serde(default)]
    pub storage: StorageConfig,
    /// Test execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for run folders
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Emulated acquisition latency of virtual tests in milliseconds
    #[serde(default = "default_acquire_delay")]
    pub acquire_delay_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            acquire_delay_ms: default_acquire_delay(),
        }
    }
}

impl ExecutionConfig {
    /// Acquisition delay as a `Duration`.
    pub fn acquire_delay(&self) -> Duration {
        Duration::from_millis(self.acquire_delay_ms)
    }
}

// Default value functions
fn default_name() -> String {
    "autosweep".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_acquire_delay() -> u64 {
    2000
}

impl AppConfig {
    /// Load configuration from `autosweep.toml` and environment variables
    ///
    /// Environment variables override the file, e.g.
    /// `AUTOSWEEP_APPLICATION__LOG_LEVEL=debug`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path; a missing file leaves the
    /// defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    /// The provider stack used by [`AppConfig::load_from`].
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.storage.output_dir.as_os_str().is_empty() {
            return Err("storage.output_dir cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_when_file_missing() {
        Jail::expect_with(|jail| {
            let config = AppConfig::load_from(jail.directory().join("missing.toml"))?;
            assert_eq!(config, AppConfig::default());
            assert_eq!(config.execution.acquire_delay(), Duration::from_secs(2));
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "autosweep.toml",
                r#"
                [application]
                log_level = "debug"

                [storage]
                output_dir = "runs"

                [execution]
                acquire_delay_ms = 10
                "#,
            )?;
            jail.set_env("AUTOSWEEP_EXECUTION__ACQUIRE_DELAY_MS", "0");

            let config = AppConfig::load()?;
            assert_eq!(config.application.log_level, "debug");
            assert_eq!(config.application.log_format, "pretty");
            assert_eq!(config.storage.output_dir, PathBuf::from("runs"));
            assert_eq!(config.execution.acquire_delay_ms, 0);
            Ok(())
        });
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.application.log_level = "WARN".to_string();
        config.application.log_format = "xml".to_string();
        assert!(config.validate().is_err());

        config.application.log_format = "json".to_string();
        config.storage.output_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }
}

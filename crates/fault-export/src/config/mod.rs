use crate::sources::CrustalLimits;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration for an export run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub export: ExportConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Loads `.env` from the working directory when present, then reads the
    /// process environment.
    pub fn load() -> Result<Self, ConfigError> {
        load_env_file(None)?;
        Self::from_env()
    }

    /// Loads an explicit env-style file before reading the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        load_env_file(Some(path.as_ref()))?;
        Self::from_env()
    }

    fn from_env() -> Result<Self, ConfigError> {
        let name = required("FAULTS_DB_NAME")?;
        let table = required("FAULTS_TABLE")?;
        let url = env::var("FAULTS_DB_URL").unwrap_or_default();
        let username = optional("FAULTS_DB_USERNAME");
        let password = optional("FAULTS_DB_PASSWORD");

        let output_dir = optional("FAULTS_OUTPUT_DIR").unwrap_or_else(|| "output".to_string());
        let max_magnitude_table = optional("FAULTS_MMAX_TABLE").map(PathBuf::from);
        let defaults = CrustalLimits::default();
        let limits = CrustalLimits {
            max_depth: kilometres("FAULTS_MAX_DEPTH_KM", defaults.max_depth)?,
            max_width: kilometres("FAULTS_MAX_WIDTH_KM", defaults.max_width)?,
        };

        Ok(Self {
            database: DatabaseConfig {
                name,
                url,
                username,
                password,
                table,
            },
            export: ExportConfig {
                output_dir: PathBuf::from(output_dir),
                max_magnitude_table,
                limits,
            },
            telemetry: TelemetryConfig::from_env(),
        })
    }
}

/// Where fault rows live.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub table: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("table", &self.table)
            .finish()
    }
}

/// Output location and record validation limits.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub max_magnitude_table: Option<PathBuf>,
    pub limits: CrustalLimits,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: optional("FAULTS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

/// Loads an env-style file into the process environment. Without a path,
/// `./.env` is loaded when it exists. Variables already set are kept.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map(|_| ())
            .map_err(|source| ConfigError::EnvFile {
                path: path.to_path_buf(),
                source,
            }),
        None => {
            dotenvy::dotenv().ok();
            Ok(())
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    InvalidNumber { key: &'static str, value: String },
    EnvFile { path: PathBuf, source: dotenvy::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} must be set"),
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a positive number of kilometres, found '{value}'")
            }
            ConfigError::EnvFile { path, .. } => {
                write!(f, "unable to load config file {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::EnvFile { source, .. } => Some(source),
            ConfigError::Missing(_) | ConfigError::InvalidNumber { .. } => None,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn kilometres(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match optional(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber { key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "FAULTS_DB_NAME",
            "FAULTS_DB_URL",
            "FAULTS_DB_USERNAME",
            "FAULTS_DB_PASSWORD",
            "FAULTS_TABLE",
            "FAULTS_OUTPUT_DIR",
            "FAULTS_MMAX_TABLE",
            "FAULTS_MAX_DEPTH_KM",
            "FAULTS_MAX_WIDTH_KM",
            "FAULTS_LOG_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_for_optional_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FAULTS_DB_NAME", "faults.db");
        env::set_var("FAULTS_TABLE", "hazfaults2014");

        let config = AppConfig::from_env().expect("config loads");
        assert_eq!(config.database.name, "faults.db");
        assert_eq!(config.database.url, "");
        assert_eq!(config.export.output_dir, PathBuf::from("output"));
        assert!(config.export.max_magnitude_table.is_none());
        assert_eq!(config.export.limits, CrustalLimits::default());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn missing_table_is_reported() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FAULTS_DB_NAME", "faults.db");

        match AppConfig::from_env() {
            Err(ConfigError::Missing("FAULTS_TABLE")) => {}
            other => panic!("expected missing table, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FAULTS_DB_NAME", "faults.db");
        env::set_var("FAULTS_TABLE", "faults");
        env::set_var("FAULTS_MAX_WIDTH_KM", "-5");

        match AppConfig::from_env() {
            Err(ConfigError::InvalidNumber { key, value }) => {
                assert_eq!(key, "FAULTS_MAX_WIDTH_KM");
                assert_eq!(value, "-5");
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
    }

    #[test]
    fn load_from_reads_env_file() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.env");
        std::fs::write(
            &path,
            "FAULTS_DB_NAME=faults.db\nFAULTS_DB_URL=/data\nFAULTS_TABLE=hazfaults2008\nFAULTS_DB_PASSWORD=secret\nFAULTS_MAX_DEPTH_KM=25\n",
        )
        .expect("write env file");

        let config = AppConfig::load_from(&path).expect("config loads");
        assert_eq!(config.database.url, "/data");
        assert_eq!(config.database.table, "hazfaults2008");
        assert_eq!(config.export.limits.max_depth, 25.0);
        assert!(!format!("{:?}", config.database).contains("secret"));
        reset_env();
    }

    #[test]
    fn missing_env_file_is_reported() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.env");

        match load_env_file(Some(&path)) {
            Err(ConfigError::EnvFile { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected env file error, got {other:?}"),
        }
    }

    #[test]
    fn telemetry_reads_log_level_without_database_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FAULTS_LOG_LEVEL", "fault_export=debug");

        assert_eq!(TelemetryConfig::from_env().log_level, "fault_export=debug");
        reset_env();
    }
}

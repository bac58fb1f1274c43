//! Layered settings
//!
//! Built-in defaults, then a TOML file (explicit `--config`, else the platform
//! config dir, optional), then `FANOUT__SECTION__KEY` environment variables.
//! Command-line flags are applied on top by `main`.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use fanout_core::DriverConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_WORKLOAD_PATH: &str = "./client/search_history.txt";
const DEFAULT_MAX_QUERIES: usize = 10;
const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "FANOUT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub driver: DriverConfig,
    pub workload: WorkloadSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSettings {
    pub path: String,
    pub max_queries: usize,
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_WORKLOAD_PATH.to_string(),
            max_queries: DEFAULT_MAX_QUERIES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Daily rolling log files go here when set
    pub directory: Option<String>,
}

/// Platform config file, e.g. `~/.config/fanout/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("dev", "fanout", "fanout").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load settings; an explicit `config_path` must exist, the default one may not
pub fn load(config_path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder().add_source(
        Config::try_from(&Settings::default()).context("Failed to encode default settings")?,
    );

    match config_path {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            builder = builder.add_source(File::from(path).required(true));
        }
        None => {
            if let Some(path) = default_config_file() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let settings: Settings = builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    settings.driver.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::domain::QueueOrder;
    use std::io::Write;
    use tempfile::Builder;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.driver.workers, 10);
        assert_eq!(settings.driver.endpoint.port, 32209);
        assert_eq!(settings.workload.path, "./client/search_history.txt");
        assert_eq!(settings.workload.max_queries, 10);
        assert_eq!(settings.log.format, LogFormat::Pretty);
    }

    #[test]
    fn test_file_overrides_defaults_partially() {
        let file = toml_file(
            r#"
            [driver]
            workers = 3
            queue_order = "fifo"

            [driver.endpoint]
            port = 4000

            [log]
            format = "json"
            "#,
        );

        let settings = load(Some(file.path())).unwrap();

        assert_eq!(settings.driver.workers, 3);
        assert_eq!(settings.driver.queue_order, QueueOrder::Fifo);
        assert_eq!(settings.driver.endpoint.port, 4000);
        assert_eq!(settings.driver.endpoint.host, "127.0.0.1");
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.workload.max_queries, 10);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_invalid_driver_config_is_rejected() {
        let file = toml_file("[driver]\nworkers = 0\n");
        assert!(load(Some(file.path())).is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_path("~/history.txt");
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }
}

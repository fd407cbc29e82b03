use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.yaml";
pub const SESSION_FILE: &str = "session.json";

type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't determine the application directory, set CF_MANAGER_HOME")]
    NoAppDir,
    #[error("failed to access {0}")]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("malformed config file {0}")]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("failed to serialize config")]
    SerializeError(#[from] serde_yaml::Error),
}

/// Persistent settings of the tool.
///
/// Every field has a default so that a partially written file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub group_id: Option<String>,
    pub min_lines: u32,
    pub min_percent: u32,
    pub output_dir: Option<PathBuf>,
    pub moss_user_id: Option<u64>,
    pub transformer: String,
    pub new_score: f64,
    pub request_interval_ms: u64,
    pub base_url: String,
    pub moss_host: String,
    pub moss_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_id: None,
            min_lines: 10,
            min_percent: 90,
            output_dir: None,
            moss_user_id: None,
            transformer: String::from("[^/]+$"),
            new_score: -1.0,
            request_interval_ms: 1000,
            base_url: String::from("https://codeforces.com"),
            moss_host: String::from(crate::moss::client::DEFAULT_HOST),
            moss_port: crate::moss::client::DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Loads the config stored in `dir`; a missing file gives the defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!("{} not found, using the default config", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).map_err(|e| ConfigError::IoError(path.clone(), e))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text).map_err(|e| ConfigError::ParseError(path, e))
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| ConfigError::IoError(dir.to_path_buf(), e))?;

        let path = dir.join(CONFIG_FILE);
        let text = serde_yaml::to_string(self)?;
        fs::write(&path, text).map_err(|e| ConfigError::IoError(path.clone(), e))?;
        tracing::info!("config saved to {}", path.display());
        Ok(())
    }

    /// Overwrites the stored config with the defaults.
    pub fn reset(dir: &Path) -> Result<Self> {
        let config = Self::default();
        config.save(dir)?;
        Ok(config)
    }
}

/// Directory holding the config and the saved session.
pub fn app_dir() -> Result<PathBuf> {
    if let Ok(home) = env::var("CF_MANAGER_HOME") {
        return Ok(PathBuf::from(home));
    }
    directories::ProjectDirs::from("", "", "cf-manager")
        .map(|project| project.config_dir().to_owned())
        .ok_or(ConfigError::NoAppDir)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.min_lines, 10);
        assert_eq!(config.min_percent, 90);
        assert_eq!(config.new_score, -1.0);
        assert_eq!(config.transformer, "[^/]+$");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            group_id: Some(String::from("AbCdEf1234")),
            min_lines: 20,
            output_dir: Some(PathBuf::from("/tmp/out")),
            moss_user_id: Some(987654),
            ..Config::default()
        };
        config.save(dir.path()).unwrap();

        assert_eq!(Config::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "group_id: xyz\nmin_percent: 75\n").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.group_id.as_deref(), Some("xyz"));
        assert_eq!(config.min_percent, 75);
        assert_eq!(config.min_lines, 10);
        assert_eq!(config.base_url, "https://codeforces.com");
    }

    #[test]
    fn reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        Config {
            min_lines: 3,
            ..Config::default()
        }
        .save(dir.path())
        .unwrap();

        Config::reset(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "min_lines: [1, 2\n").unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ConfigError::ParseError(_, _))
        ));
    }
}

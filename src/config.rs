//! Configuration loader and validator for the takedown tracker.
use crate::model::{PlatformPolicy, DEFAULT_PLATFORMS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub platforms: Platforms,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// How many batches `batches` shows when no limit is given.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for App {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
            recent_limit: default_recent_limit(),
        }
    }
}

fn default_recent_limit() -> usize {
    5
}

/// Target platform labels offered to users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platforms {
    pub suggested: Vec<String>,
    /// Accept labels outside `suggested`.
    #[serde(default = "default_allow_custom")]
    pub allow_custom: bool,
}

impl Default for Platforms {
    fn default() -> Self {
        Self {
            suggested: DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect(),
            allow_custom: default_allow_custom(),
        }
    }
}

fn default_allow_custom() -> bool {
    true
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `sqlite://<data_dir>/takedown.db`, unless `DATABASE_URL` is set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/takedown.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }

    pub fn platform_policy(&self) -> PlatformPolicy {
        PlatformPolicy {
            suggested: self.platforms.suggested.clone(),
            allow_custom: self.platforms.allow_custom,
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A missing file yields the defaults.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let cfg = match fs::read_to_string(path) {
        Ok(content) => serde_yaml::from_str(&content)?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(err) => return Err(err.into()),
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.recent_limit == 0 {
        return Err(ConfigError::Invalid("app.recent_limit must be > 0"));
    }

    let suggested = &cfg.platforms.suggested;
    if suggested.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Invalid(
            "platforms.suggested entries must be non-empty",
        ));
    }
    for (i, p) in suggested.iter().enumerate() {
        if suggested[..i].iter().any(|q| q.trim().eq_ignore_ascii_case(p.trim())) {
            return Err(ConfigError::Invalid(
                "platforms.suggested must not contain duplicates",
            ));
        }
    }
    if suggested.is_empty() && !cfg.platforms.allow_custom {
        return Err(ConfigError::Invalid(
            "platforms.suggested must be non-empty when allow_custom is false",
        ));
    }

    Ok(())
}

/// Example YAML accepted by `load`.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  recent_limit: 5

platforms:
  suggested:
    - Stripchat
    - Google
    - XVideos
    - Pornhub
    - Other
  allow_custom: true
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn invalid_app_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = " ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("data_dir")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.recent_limit = 0;
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("recent_limit")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_platform_lists() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.platforms.suggested.push("  ".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.platforms.suggested.push("google".into());
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("duplicates")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.platforms.suggested.clear();
        cfg.platforms.allow_custom = false;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("app:\n  data_dir: /var/lib/takedown\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.recent_limit, 5);
        assert!(cfg.platforms.allow_custom);
        assert_eq!(cfg.platform_policy().suggested.len(), DEFAULT_PLATFORMS.len());
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.platforms.suggested[0], "Stripchat");
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let td = tempdir().unwrap();
        let cfg = load(Some(&td.path().join("absent.yaml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }
}

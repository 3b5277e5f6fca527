//! Builder configuration
//!
//! Every setting has a default matching the PocketMine-MP host, so the tool
//! runs without any configuration file. Values are layered in this order:
//! defaults, then a YAML file, then environment overrides.

use crate::error::{DevToolsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "DEVTOOLS_CONFIG";
/// Environment variable overriding the plugins directory
pub const PLUGINS_DIR_ENV: &str = "DEVTOOLS_PLUGINS_DIR";
/// Environment variable overriding both repository endpoints
pub const REPOSITORY_URL_ENV: &str = "DEVTOOLS_REPOSITORY_URL";

/// Upper bound for `repository.backoff_ms`
pub const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Host application name printed by the default stub
    pub host_name: String,

    /// Builder identification printed by the default stub
    pub builder_banner: String,

    /// Namespace prefix plugin main classes may not use
    pub reserved_namespace: String,

    /// Descriptor file name inside the source directory
    pub descriptor_file: String,

    /// Where fetched dependencies are written
    pub plugins_dir: PathBuf,

    pub repository: RepositoryConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            host_name: "PocketMine-MP".to_string(),
            builder_banner: "PocketDock Builder".to_string(),
            reserved_namespace: "pocketmine\\".to_string(),
            descriptor_file: "plugin.yml".to_string(),
            plugins_dir: PathBuf::from("/pocketmine/plugins"),
            repository: RepositoryConfig::default(),
        }
    }
}

/// Remote plugin repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Base URL of the name search service (`/autocomplete?q=` is appended)
    pub search_url: String,

    /// Base URL of the download service (`/plugins/<id>/download` is appended)
    pub download_url: String,

    pub timeout_secs: u64,

    /// Total attempts per request, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt; grows linearly afterwards
    pub backoff_ms: u64,

    pub user_agent: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            search_url: "http://sleepy-wave-2826.herokuapp.com".to_string(),
            download_url: "http://forums.pocketmine.net".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_ms: 500,
            user_agent: format!("pocketmine-devtools/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl BuilderConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// An explicit path must exist. Without one, `DEVTOOLS_CONFIG` and then the
    /// per-user `devtools/config.yaml` are tried, and a missing file there is
    /// not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::discover_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DevToolsError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml(&content)
            .map_err(|e| DevToolsError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml_ng::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(content)
    }

    fn discover_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("devtools").join("config.yaml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(PLUGINS_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.plugins_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var(REPOSITORY_URL_ENV) {
            let url = url.trim_end_matches('/').to_string();
            if !url.is_empty() {
                self.repository.search_url = url.clone();
                self.repository.download_url = url;
            }
        }
    }

    /// Reject settings that would make the pipeline misbehave silently
    pub fn validate(&self) -> Result<()> {
        if self.descriptor_file.trim().is_empty() {
            return Err(DevToolsError::Config(
                "descriptor_file cannot be empty".to_string(),
            ));
        }
        if self.repository.max_attempts == 0 {
            return Err(DevToolsError::Config(
                "repository.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.repository.timeout_secs == 0 {
            return Err(DevToolsError::Config(
                "repository.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.repository.backoff_ms > MAX_BACKOFF_MS {
            return Err(DevToolsError::Config(format!(
                "repository.backoff_ms must be at most {}",
                MAX_BACKOFF_MS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_target_pocketmine() {
        let config = BuilderConfig::default();
        assert_eq!(config.reserved_namespace, "pocketmine\\");
        assert_eq!(config.descriptor_file, "plugin.yml");
        assert_eq!(config.plugins_dir, PathBuf::from("/pocketmine/plugins"));
        assert_eq!(config.repository.max_attempts, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
reserved_namespace: "examplehost\\"
repository:
  timeout_secs: 5
"#;
        let config = BuilderConfig::from_yaml(yaml).expect("should parse partial config");
        assert_eq!(config.reserved_namespace, "examplehost\\");
        assert_eq!(config.repository.timeout_secs, 5);
        assert_eq!(config.repository.max_attempts, 3);
        assert_eq!(config.host_name, "PocketMine-MP");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = BuilderConfig::from_yaml("  \n").expect("empty config is valid");
        assert_eq!(config, BuilderConfig::default());
    }

    #[test]
    fn test_from_file_missing_is_config_error() {
        let temp_dir = TempDir::new().expect("temp dir");
        let err = BuilderConfig::from_file(&temp_dir.path().join("absent.yaml"))
            .expect_err("missing explicit file should fail");
        assert!(matches!(err, DevToolsError::Config(_)));
    }

    #[test]
    fn test_from_file_reads_plugins_dir() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "plugins_dir: /srv/plugins\n").expect("write config");
        let config = BuilderConfig::from_file(&path).expect("should load");
        assert_eq!(config.plugins_dir, PathBuf::from("/srv/plugins"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = BuilderConfig::default();
        config.repository.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_backoff() {
        let mut config = BuilderConfig::default();
        config.repository.backoff_ms = MAX_BACKOFF_MS;
        assert!(config.validate().is_ok());

        config.repository.backoff_ms = u64::MAX;
        let err = config.validate().expect_err("backoff too large");
        assert!(err.to_string().contains("backoff_ms"));
    }
}

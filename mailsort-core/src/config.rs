//! Configuration management for mailsort.

use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::{self, AppPaths};

const APP_NAME: &str = "mailsort";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Mailbox document backing the store. Empty means the default under
    /// the data directory.
    pub store: String,
    /// Timezone for display (e.g., "Europe/Berlin").
    pub timezone: String,
    /// Default number of messages per listing.
    pub page_size: usize,
    /// Classification service settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: String::new(),
            timezone: "UTC".to_string(),
            page_size: 25,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Classification service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the service.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Verdicts below this confidence are reported but not applied.
    pub min_confidence: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8790".to_string(),
            timeout_secs: 30,
            min_confidence: 0.6,
        }
    }
}

impl AppConfig {
    /// Load configuration from paths with environment overlay.
    pub fn load(paths: &AppPaths) -> Result<Self> {
        let env_prefix = env_prefix();
        let defaults = AppConfig::default();
        let mut builder = Config::builder()
            .add_source(
                File::from(paths.global_config.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(paths.local_config.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix(&env_prefix).separator("__"));

        if let Some(cli_cfg) = &paths.cli_config {
            builder = builder.add_source(
                File::from(cli_cfg.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder
            .set_default("store", defaults.store)?
            .set_default("timezone", defaults.timezone)?
            .set_default("page_size", defaults.page_size as u64)?
            .set_default("classifier.url", defaults.classifier.url)?
            .set_default("classifier.timeout_secs", defaults.classifier.timeout_secs)?
            .set_default("classifier.min_confidence", defaults.classifier.min_confidence)?;

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.classifier.min_confidence) {
            return Err(Error::Config(format!(
                "classifier.min_confidence must be between 0 and 1, got {}",
                self.classifier.min_confidence
            )));
        }
        Ok(())
    }

    /// Mailbox document path, shell-expanded. Falls back to the default
    /// location under the data directory.
    pub fn store_path(&self, paths: &AppPaths) -> Result<PathBuf> {
        if self.store.trim().is_empty() {
            return Ok(paths.default_store());
        }
        paths::expand_str_path(&self.store)
    }

    /// Write default config to a path.
    pub fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("creating config directory {parent:?}: {e}")))?;
        }
        let cfg = AppConfig::default();
        let toml = toml::to_string_pretty(&cfg)
            .map_err(|e| Error::Config(format!("serializing default config: {e}")))?;
        let mut content = String::new();
        content.push_str("# mailsort configuration\n");
        content.push_str(
            "# Place this file at $XDG_CONFIG_HOME/mailsort/config.toml (or ~/.config/mailsort/config.toml)\n",
        );
        content.push_str("# An empty `store` uses $XDG_DATA_HOME/mailsort/mailbox.json\n\n");
        content.push_str(&toml);
        content.push('\n');
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("writing config file to {}: {e}", path.display())))
    }

    /// Ensure default config exists, creating it if necessary.
    pub fn ensure_default(path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        Self::write_default(path)
    }
}

/// Generate environment variable prefix from app name.
fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(temp: &TempDir, cli_config: Option<PathBuf>) -> AppPaths {
        AppPaths {
            global_config: temp.path().join("global").join("config.toml"),
            local_config: temp.path().join("local").join("config.toml"),
            cli_config,
            data_dir: temp.path().join("data"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.classifier.url, "http://127.0.0.1:8790");
        assert_eq!(config.classifier.timeout_secs, 30);
        assert!(config.store.is_empty());
    }

    #[test]
    fn test_load_defaults_without_files() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load(&paths_in(&temp, None)).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.classifier.min_confidence, 0.6);
    }

    #[test]
    fn test_load_cli_config_overrides() {
        let temp = TempDir::new().unwrap();
        let cli = temp.path().join("custom.toml");
        fs::write(
            &cli,
            "page_size = 10\nstore = \"/tmp/box.json\"\n\n[classifier]\nurl = \"http://classifier:9000\"\n",
        )
        .unwrap();
        let config = AppConfig::load(&paths_in(&temp, Some(cli))).unwrap();
        assert_eq!(config.page_size, 10);
        assert_eq!(config.classifier.url, "http://classifier:9000");
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.store, "/tmp/box.json");
    }

    #[test]
    fn test_missing_cli_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let paths = paths_in(&temp, Some(temp.path().join("absent.toml")));
        assert!(matches!(AppConfig::load(&paths), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let cli = temp.path().join("bad.toml");
        fs::write(&cli, "[classifier]\nmin_confidence = 1.5\n").unwrap();
        assert!(matches!(
            AppConfig::load(&paths_in(&temp, Some(cli))),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_store_path() {
        let temp = TempDir::new().unwrap();
        let paths = paths_in(&temp, None);
        let mut config = AppConfig::default();
        assert_eq!(
            config.store_path(&paths).unwrap(),
            temp.path().join("data").join("mailbox.json")
        );

        config.store = "~/mail/box.json".to_string();
        let expanded = config.store_path(&paths).unwrap();
        assert!(!expanded.to_string_lossy().contains('~'));
        assert!(expanded.ends_with("mail/box.json"));
    }

    #[test]
    fn test_write_default_config() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("nested").join("config.toml");
        AppConfig::write_default(&config_path).unwrap();
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("page_size"));
        assert!(content.contains("[classifier]"));

        let mut paths = paths_in(&temp, None);
        paths.global_config = config_path;
        let loaded = AppConfig::load(&paths).unwrap();
        assert_eq!(loaded.timezone, "UTC");
    }

    #[test]
    fn test_ensure_default_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "page_size = 5\n").unwrap();
        AppConfig::ensure_default(&config_path).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "page_size = 5\n");
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(), "MAILSORT");
    }
}

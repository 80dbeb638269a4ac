//! Path discovery for mailsort.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

const APP_NAME: &str = "mailsort";
const STORE_FILE: &str = "mailbox.json";

/// Application paths for config files and the data directory.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Global config file path (e.g., ~/.config/mailsort/config.toml)
    pub global_config: PathBuf,
    /// Local config file path (current directory config.toml)
    pub local_config: PathBuf,
    /// CLI-specified config file path
    pub cli_config: Option<PathBuf>,
    /// Data directory for persistent data (e.g., ~/.local/share/mailsort)
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Discover application paths based on XDG conventions and CLI options.
    pub fn discover(cli_config: Option<PathBuf>) -> Result<Self> {
        let global_config = xdg_dir("XDG_CONFIG_HOME", dirs::config_dir, &[".config"])?
            .join("config.toml");
        let local_config = env::current_dir()
            .map_err(|e| Error::Path(format!("determining current directory: {e}")))?
            .join("config.toml");
        let cli_config = cli_config.map(expand_path).transpose()?;

        Ok(Self {
            global_config,
            local_config,
            cli_config,
            data_dir: xdg_dir("XDG_DATA_HOME", dirs::data_dir, &[".local", "share"])?,
        })
    }

    /// Config file that `init` and `config reset` write: the `--config`
    /// file when given, the global one otherwise.
    pub fn writable_config(&self) -> &PathBuf {
        self.cli_config.as_ref().unwrap_or(&self.global_config)
    }

    /// Default mailbox document location.
    pub fn default_store(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }
}

/// Expand shell variables and tilde in a path.
pub fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

/// Expand shell variables and tilde in a path string.
pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded =
        shellexpand::full(text).map_err(|e| Error::Path(format!("expanding path: {e}")))?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// `$<var>/mailsort`, else the platform directory, else `~/<fallback>/mailsort`.
fn xdg_dir(var: &str, platform: fn() -> Option<PathBuf>, fallback: &[&str]) -> Result<PathBuf> {
    if let Some(dir) = env::var_os(var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }
    if let Some(dir) = platform() {
        return Ok(dir.join(APP_NAME));
    }
    dirs::home_dir()
        .map(|home| fallback.iter().fold(home, |path, part| path.join(part)).join(APP_NAME))
        .ok_or_else(|| Error::Path(format!("unable to determine directory for {var}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_discover() {
        let paths = AppPaths::discover(None).unwrap();
        assert!(paths.global_config.ends_with("mailsort/config.toml"));
        assert!(paths.local_config.ends_with("config.toml"));
        assert!(paths.data_dir.ends_with("mailsort"));
    }

    #[test]
    fn test_default_store() {
        let paths = AppPaths::discover(None).unwrap();
        assert_eq!(paths.default_store(), paths.data_dir.join("mailbox.json"));
    }

    #[test]
    fn test_writable_config_prefers_cli() {
        let mut paths = AppPaths::discover(None).unwrap();
        assert_eq!(paths.writable_config(), &paths.global_config);
        paths.cli_config = Some(PathBuf::from("/tmp/other.toml"));
        assert_eq!(paths.writable_config(), &PathBuf::from("/tmp/other.toml"));
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_str_path("~/test").unwrap();
        assert!(!expanded.to_string_lossy().contains('~'));
    }
}

//! Application configuration management.
//!
//! Configuration is stored at `~/.config/patientlist/config.json` (or the
//! platform equivalent). A missing file yields defaults. Selected values can
//! be overridden from the environment:
//!
//! - `PATIENTLIST_API_URL`: base URL of the patient API
//! - `PATIENTLIST_TOKEN`: bearer token for the patient API
//! - `PATIENTLIST_PER_PAGE`: page size for the list

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "patientlist";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Page size used when none is configured
pub const DEFAULT_PER_PAGE: usize = 10;

const ENV_API_URL: &str = "PATIENTLIST_API_URL";
const ENV_TOKEN: &str = "PATIENTLIST_TOKEN";
const ENV_PER_PAGE: &str = "PATIENTLIST_PER_PAGE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Never persisted; only read from the environment
    #[serde(skip)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default = "default_true")]
    pub prune_stale_selection: bool,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// First delay when the API rate limits us; doubles per retry
    #[serde(default)]
    pub retry_backoff_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            per_page: None,
            prune_stale_selection: true,
            offline_mode: false,
            log_dir: None,
            retry_backoff_ms: None,
        }
    }
}

/// Construction-time settings for `PatientListController`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Always positive
    pub per_page: usize,
    /// Drop selected ids that are absent from a freshly loaded record set
    pub prune_stale_selection: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            prune_stale_selection: true,
        }
    }
}

impl ControllerOptions {
    /// Page size of 0 falls back to the default
    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        self
    }

    pub fn with_prune_stale_selection(mut self, prune: bool) -> Self {
        self.prune_stale_selection = prune;
        self
    }
}

impl Config {
    /// Load from the default path and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save to the default path. Returns the path written.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// The token is never written
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.api_token = Some(token.trim().to_string());
        }
        if let Some(raw) = lookup(ENV_PER_PAGE) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.per_page = Some(n),
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", ENV_PER_PAGE),
            }
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions::default()
            .with_per_page(self.per_page.unwrap_or(DEFAULT_PER_PAGE))
            .with_prune_stale_selection(self.prune_stale_selection)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.prune_stale_selection);
        assert!(!config.offline_mode);
        assert_eq!(config.controller_options(), ControllerOptions::default());
        assert_eq!(config.controller_options().per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"per_page": 25}"#).unwrap();
        assert_eq!(config.per_page, Some(25));
        assert!(config.prune_stale_selection);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_zero_per_page_falls_back() {
        let config = Config { per_page: Some(0), ..Config::default() };
        assert_eq!(config.controller_options().per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            (ENV_API_URL, " http://localhost:3000/api "),
            (ENV_TOKEN, "secret"),
            (ENV_PER_PAGE, "20"),
        ]));
        assert_eq!(config.api_base_url.as_deref(), Some("http://localhost:3000/api"));
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.controller_options().per_page, 20);
    }

    #[test]
    fn test_invalid_per_page_env_is_ignored() {
        let mut config = Config { per_page: Some(15), ..Config::default() };
        config.apply_env_overrides(env(&[(ENV_PER_PAGE, "lots")]));
        assert_eq!(config.per_page, Some(15));
    }

    #[test]
    fn test_save_and_load_round_trip_skips_token() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("https://ehr.example.mil".to_string()),
            api_token: Some("do-not-persist".to_string()),
            per_page: Some(5),
            prune_stale_selection: false,
            offline_mode: true,
            log_dir: None,
            retry_backoff_ms: Some(250),
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url, config.api_base_url);
        assert_eq!(loaded.per_page, Some(5));
        assert!(!loaded.prune_stale_selection);
        assert!(loaded.offline_mode);
        assert_eq!(loaded.retry_backoff_ms, Some(250));
        assert!(loaded.api_token.is_none());
    }

    #[test]
    fn test_save_to_unwritable_path_has_context() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = Config::default().save_to(&blocker.join(CONFIG_FILE)).unwrap_err();
        assert!(err.to_string().contains("Failed to create config directory"));
    }

    #[test]
    fn test_load_from_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(config.api_base_url.is_none());
    }
}

//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WIKISWEEP_*)
//! 2. TOML config file (if WIKISWEEP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WIKISWEEP_*)
/// 2. TOML config file (if WIKISWEEP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// MediaWiki Action API endpoint, e.g. `https://example.org/w/api.php`.
    ///
    /// Set via WIKISWEEP_API_URL environment variable.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bot account name (`User@BotName` for bot passwords).
    ///
    /// Set via WIKISWEEP_USERNAME environment variable.
    #[serde(default)]
    pub username: Option<String>,

    /// Bot password.
    ///
    /// Set via WIKISWEEP_PASSWORD environment variable.
    #[serde(default)]
    pub password: Option<String>,

    /// User-Agent string for API requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path of the `title -> text` content cache.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Age after which the content cache must be rebuilt.
    #[serde(default = "default_max_age_secs")]
    pub cache_max_age_secs: u64,

    /// Path of the title directory (one main-namespace title per line).
    #[serde(default = "default_directory_path")]
    pub directory_path: PathBuf,

    /// Age after which the title directory must be rebuilt.
    #[serde(default = "default_max_age_secs")]
    pub directory_max_age_secs: u64,

    /// Titles per batched read during cache rebuild.
    #[serde(default = "default_cache_batch_size")]
    pub cache_batch_size: usize,

    /// Concurrent batch reads during cache rebuild.
    #[serde(default = "default_cache_concurrency")]
    pub cache_concurrency: usize,

    /// Width of the scan pool for store-bound predicates.
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,

    /// Fixed pause after every issued mutation call.
    ///
    /// Set via WIKISWEEP_COMMIT_DELAY_MS environment variable.
    #[serde(default = "default_commit_delay_ms")]
    pub commit_delay_ms: u64,

    /// Retries for transient commit failures. 0 disables retrying.
    #[serde(default)]
    pub max_retries: u32,

    /// First retry delay; doubles per attempt.
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    /// Editors whose pages may be deleted in bulk.
    ///
    /// Set via WIKISWEEP_ALLOWED_EDITORS environment variable (comma-separated).
    #[serde(default, deserialize_with = "string_or_list")]
    pub allowed_editors: Vec<String>,

    /// Change tags attached to every edit.
    #[serde(default = "default_edit_tags", deserialize_with = "string_or_list")]
    pub edit_tags: Vec<String>,
}

fn default_api_url() -> String {
    "http://localhost/w/api.php".into()
}

fn default_user_agent() -> String {
    "wikisweep/0.1".into()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("wiki_cache.json")
}

fn default_directory_path() -> PathBuf {
    PathBuf::from("wiki_directory.txt")
}

fn default_max_age_secs() -> u64 {
    86_400
}

fn default_cache_batch_size() -> usize {
    500
}

fn default_cache_concurrency() -> usize {
    8
}

fn default_scan_concurrency() -> usize {
    50
}

fn default_commit_delay_ms() -> u64 {
    6_000
}

fn default_retry_initial_delay_ms() -> u64 {
    2_000
}

fn default_edit_tags() -> Vec<String> {
    vec!["bot".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            password: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            cache_path: default_cache_path(),
            cache_max_age_secs: default_max_age_secs(),
            directory_path: default_directory_path(),
            directory_max_age_secs: default_max_age_secs(),
            cache_batch_size: default_cache_batch_size(),
            cache_concurrency: default_cache_concurrency(),
            scan_concurrency: default_scan_concurrency(),
            commit_delay_ms: default_commit_delay_ms(),
            max_retries: 0,
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            allowed_editors: Vec::new(),
            edit_tags: default_edit_tags(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }

    pub fn directory_max_age(&self) -> Duration {
        Duration::from_secs(self.directory_max_age_secs)
    }

    pub fn retry_initial_delay(&self) -> Duration {
        Duration::from_millis(self.retry_initial_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WIKISWEEP_`
    /// 2. TOML file from `WIKISWEEP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = std::env::var_os("WIKISWEEP_CONFIG_FILE").map(PathBuf::from);
        Self::load_from(config_file.as_deref())
    }

    /// Like [`load`](Self::load), with an explicit TOML file in place of
    /// `WIKISWEEP_CONFIG_FILE`.
    pub fn load_from(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::LoadFailed(format!("config file not found: {}", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("WIKISWEEP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Credentials for login (deferred validation; reads need none).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the username or password is not set.
    pub fn require_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let username = self.username.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "username".into(),
            hint: "Set WIKISWEEP_USERNAME environment variable".into(),
        })?;
        let password = self.password.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "password".into(),
            hint: "Set WIKISWEEP_PASSWORD environment variable".into(),
        })?;
        Ok((username, password))
    }
}

/// Accepts a TOML array or a comma-separated environment value.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let values = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(value) => vec![value],
        StringOrList::Many(values) => values,
    };
    Ok(split_list(&values))
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_path, PathBuf::from("wiki_cache.json"));
        assert_eq!(config.directory_path, PathBuf::from("wiki_directory.txt"));
        assert_eq!(config.user_agent, "wikisweep/0.1");
        assert_eq!(config.cache_batch_size, 500);
        assert_eq!(config.cache_concurrency, 8);
        assert_eq!(config.scan_concurrency, 50);
        assert_eq!(config.commit_delay_ms, 6_000);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.edit_tags, vec!["bot".to_string()]);
        assert!(config.allowed_editors.is_empty());
        assert!(config.username.is_none());
    }

    #[test]
    fn test_durations() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
        assert_eq!(config.commit_delay(), Duration::from_secs(6));
        assert_eq!(config.cache_max_age(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_require_credentials_missing() {
        let config = AppConfig { username: Some("Bot".into()), ..Default::default() };
        let result = config.require_credentials();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "password"));
    }

    #[test]
    fn test_require_credentials_present() {
        let config = AppConfig { username: Some("Bot".into()), password: Some("secret".into()), ..Default::default() };
        assert_eq!(config.require_credentials().unwrap(), ("Bot", "secret"));
    }

    #[test]
    fn test_list_fields_accept_comma_separated_string() {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(r#"allowed_editors = "Calvy, CalvyBot""#))
            .extract()
            .unwrap();
        assert_eq!(config.allowed_editors, vec!["Calvy", "CalvyBot"]);
        assert_eq!(config.edit_tags, vec!["bot"]);
    }

    #[test]
    fn test_split_list() {
        let values = vec!["Calvy, CalvyBot".to_string(), " ".to_string(), "Other".to_string()];
        assert_eq!(split_list(&values), vec!["Calvy", "CalvyBot", "Other"]);
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wikisweep.toml");
        std::fs::write(
            &path,
            "api_url = \"https://wiki.example.org/w/api.php\"\nscan_concurrency = 25\nallowed_editors = [\"Calvy\", \"CalvyBot\"]\n",
        )
        .unwrap();

        let config = AppConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.api_url, "https://wiki.example.org/w/api.php");
        assert_eq!(config.scan_concurrency, 25);
        assert_eq!(config.allowed_editors, vec!["Calvy", "CalvyBot"]);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = AppConfig::load_from(Some(Path::new("/nonexistent/wikisweep.toml")));
        assert!(matches!(result, Err(ConfigError::LoadFailed(msg)) if msg.contains("not found")));
    }
}

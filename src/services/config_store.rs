// Configuration Storage Service
// Handles config file read/write and version backup

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Approach, FallbackPolicy, HumanizationOptions};
use crate::services::error::{HumanizeError, HumanizeResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub humanization: HumanizationConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            humanization: HumanizationConfig::default(),
            remote: RemoteConfig::default(),
            cache: CacheConfig::default(),
            proxy: None,
            api_keys: HashMap::new(),
        }
    }
}

/// Defaults applied to every humanize request that does not override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizationConfig {
    #[serde(default = "default_target_score")]
    pub target_score: i32,
    #[serde(default)]
    pub approach: Approach,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_true")]
    pub auto_optimize: bool,
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
}

impl Default for HumanizationConfig {
    fn default() -> Self {
        Self {
            target_score: default_target_score(),
            approach: Approach::Standard,
            style: default_style(),
            iterations: default_iterations(),
            auto_optimize: true,
            fallback_policy: FallbackPolicy::Propagate,
        }
    }
}

impl HumanizationConfig {
    pub fn options(&self) -> HumanizationOptions {
        HumanizationOptions {
            target_score: self.target_score,
            approach: self.approach,
            style: self.style.clone(),
            iterations: self.iterations,
            iteration_count: 1,
            auto_optimize: self.auto_optimize,
            fallback_policy: self.fallback_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Provider name, optionally with a model: `openai` or `deepseek:deepseek-chat`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_detection_spacing_ms")]
    pub detection_spacing_ms: u64,
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            detection_spacing_ms: default_detection_spacing_ms(),
            max_input_chars: default_max_input_chars(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn detection_spacing(&self) -> Duration {
        Duration::from_millis(self.detection_spacing_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub enabled: bool,
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    /// Proxy URL to route provider traffic through, if enabled.
    pub fn url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.https
            .as_deref()
            .or(self.http.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

fn default_version() -> String { "1.0.0".to_string() }
fn default_true() -> bool { true }
fn default_target_score() -> i32 { 95 }
fn default_style() -> String { "general".to_string() }
fn default_iterations() -> u32 { 3 }
fn default_provider() -> String { "openai".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_detection_spacing_ms() -> u64 { 1000 }
fn default_max_input_chars() -> usize { 100_000 }
fn default_ttl_secs() -> u64 { 900 }
fn default_excerpt_chars() -> usize { 100 }

pub struct ConfigStore {
    config_dir: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_file = config_dir.join("config.json");
        Self { config_dir, config_file }
    }

    /// Get default config directory
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("humanizer"))
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Ensure config directory exists
    pub fn ensure_dir(&self) -> HumanizeResult<()> {
        fs::create_dir_all(&self.config_dir)
            .map_err(|e| HumanizeError::Config(format!("Failed to create config dir: {}", e)))
    }

    /// Load configuration from file; a missing file yields defaults.
    pub fn load(&self) -> HumanizeResult<AppConfig> {
        if !self.config_file.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_file)
            .map_err(|e| HumanizeError::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| HumanizeError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig) -> HumanizeResult<()> {
        self.ensure_dir()?;

        // Create backup if file exists
        if self.config_file.exists() {
            self.create_backup()?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| HumanizeError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_file, content)
            .map_err(|e| HumanizeError::Config(format!("Failed to write config: {}", e)))
    }

    fn backup_dir(&self) -> PathBuf {
        self.config_dir.join("backups")
    }

    /// Create a backup of current config
    fn create_backup(&self) -> HumanizeResult<()> {
        let backup_dir = self.backup_dir();
        fs::create_dir_all(&backup_dir)
            .map_err(|e| HumanizeError::Config(format!("Failed to create backup dir: {}", e)))?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S%3f");
        let backup_file = backup_dir.join(format!("config_{}.json", timestamp));

        fs::copy(&self.config_file, &backup_file)
            .map_err(|e| HumanizeError::Config(format!("Failed to create backup: {}", e)))?;

        // Keep only last 10 backups
        self.cleanup_old_backups(&backup_dir, 10)?;

        Ok(())
    }

    /// Remove old backups, keeping only the most recent N
    fn cleanup_old_backups(&self, backup_dir: &Path, keep: usize) -> HumanizeResult<()> {
        let mut entries: Vec<_> = fs::read_dir(backup_dir)
            .map_err(|e| HumanizeError::Config(format!("Failed to read backup dir: {}", e)))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
            .collect();

        if entries.len() <= keep {
            return Ok(());
        }

        // Oldest first; names carry the timestamp, so they break mtime ties.
        entries.sort_by_key(|e| {
            (
                e.metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                e.file_name(),
            )
        });

        let remove_count = entries.len() - keep;
        for entry in entries.iter().take(remove_count) {
            let _ = fs::remove_file(entry.path());
        }

        Ok(())
    }

    /// Get provider API key from config file
    pub fn get_api_key(&self, provider: &str) -> HumanizeResult<Option<String>> {
        let config = self.load()?;
        Ok(config
            .api_keys
            .get(provider)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    /// Store provider API key in config file
    pub fn set_api_key(&self, provider: &str, key: &str) -> HumanizeResult<()> {
        let mut config = self.load()?;
        config.api_keys.insert(provider.to_string(), key.to_string());
        self.save(&config)
    }

    /// Delete provider API key from config file
    pub fn delete_api_key(&self, provider: &str) -> HumanizeResult<()> {
        let mut config = self.load()?;
        config.api_keys.remove(provider);
        self.save(&config)
    }

    /// Set the remote base URL in config file
    pub fn set_base_url(&self, url: &str) -> HumanizeResult<()> {
        let mut config = self.load()?;
        config.remote.base_url = Some(url.to_string());
        self.save(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.humanization.target_score, 95);
        assert_eq!(config.humanization.iterations, 3);
        assert!(config.humanization.auto_optimize);
        assert_eq!(config.remote.provider, "openai");
        assert_eq!(config.remote.timeout(), Duration::from_secs(60));
        assert_eq!(config.cache.ttl(), Duration::from_secs(900));
        assert_eq!(config.cache.excerpt_chars, 100);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"humanization": {"approach": "ultra"}, "remote": {"timeoutSecs": 5}}"#).unwrap();
        assert_eq!(config.humanization.approach, Approach::Ultra);
        assert_eq!(config.humanization.target_score, 95);
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(config.remote.detection_spacing_ms, 1000);

        let options = config.humanization.options();
        assert_eq!(options.approach, Approach::Ultra);
        assert_eq!(options.iteration_count, 1);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        assert_eq!(store.load().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_load_and_api_keys() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("humanizer"));

        store.set_api_key("openai", "  sk-test  ").unwrap();
        assert_eq!(store.get_api_key("openai").unwrap().as_deref(), Some("sk-test"));
        assert_eq!(store.get_api_key("deepseek").unwrap(), None);

        store.set_base_url("http://localhost:9999/v1").unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.remote.base_url.as_deref(), Some("http://localhost:9999/v1"));

        store.delete_api_key("openai").unwrap();
        assert_eq!(store.get_api_key("openai").unwrap(), None);
    }

    #[test]
    fn test_backups_are_capped() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        let mut config = AppConfig::default();
        for i in 0..15 {
            config.humanization.iterations = i;
            store.save(&config).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let backups = fs::read_dir(store.backup_dir()).unwrap().count();
        assert!(backups <= 10, "kept {} backups", backups);
        assert_eq!(store.load().unwrap().humanization.iterations, 14);
    }

    #[test]
    fn test_corrupt_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().to_path_buf());
        fs::write(store.config_file(), "{ not json").unwrap();
        assert!(matches!(store.load(), Err(HumanizeError::Config(_))));
    }

    #[test]
    fn test_proxy_url_only_when_enabled() {
        let mut proxy = ProxyConfig {
            enabled: false,
            http: Some("http://proxy:8080".to_string()),
            https: None,
        };
        assert_eq!(proxy.url(), None);
        proxy.enabled = true;
        assert_eq!(proxy.url(), Some("http://proxy:8080"));
    }
}

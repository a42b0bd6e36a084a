use crate::error::{CoachError, Result};
use crate::memory::MemorySettings;
use crate::tools::ToolSettings;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoachConfig {
    /// Storage directory; the platform data dir when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_max_plans")]
    pub max_plans: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_portion")]
    pub default_portion_g: f64,
    #[serde(default = "default_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Tool round-trips allowed per chat turn
    #[serde(default = "default_max_tool_turns")]
    pub max_tool_turns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_max_messages() -> usize {
    100
}

fn default_retention_days() -> i64 {
    90
}

fn default_max_plans() -> usize {
    50
}

fn default_search_limit() -> usize {
    10
}

fn default_excerpt_chars() -> usize {
    200
}

fn default_max_results() -> usize {
    5
}

fn default_portion() -> f64 {
    100.0
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_max_tool_turns() -> usize {
    3
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "openrouter/auto".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            retention_days: default_retention_days(),
            max_plans: default_max_plans(),
            search_limit: default_search_limit(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            default_portion_g: default_portion(),
            search_debounce_ms: default_debounce_ms(),
            max_tool_turns: default_max_tool_turns(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            temperature: None,
        }
    }
}

impl MemoryConfig {
    pub fn settings(&self) -> MemorySettings {
        MemorySettings {
            max_messages: self.max_messages,
            retention_days: self.retention_days,
            max_plans: self.max_plans,
            search_limit: self.search_limit,
            excerpt_chars: self.excerpt_chars,
            ..MemorySettings::default()
        }
    }
}

impl ToolsConfig {
    pub fn settings(&self) -> ToolSettings {
        ToolSettings {
            max_results: self.max_results,
            default_portion_g: self.default_portion_g,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

pub struct ConfigManager {
    config: CoachConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path_internal()?;
        Self::with_path(config_path)
    }

    /// Load from an explicit file, which need not exist
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = Self::load_or_default(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn load() -> Result<CoachConfig> {
        let config_path = Self::get_config_path_internal()?;
        Self::load_or_default(&config_path)
    }

    pub fn save(&self) -> Result<()> {
        let toml = toml::to_string_pretty(&self.config)
            .map_err(|e| CoachError::Configuration(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.config_path, toml)
            .map_err(|e| CoachError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> &CoachConfig {
        &self.config
    }

    pub fn get_mut(&mut self) -> &mut CoachConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Configured data dir, else the platform default
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.config.data_dir {
            return Ok(dir.clone());
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "mymacro", "macrocoach").ok_or_else(|| {
            CoachError::Configuration("Could not determine config directory".to_string())
        })
    }

    fn get_config_path_internal() -> Result<PathBuf> {
        let project_dirs = Self::project_dirs()?;
        let config_dir = project_dirs.config_dir();
        fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// File (optional) overlaid with `MACROCOACH_*` variables, e.g.
    /// `MACROCOACH_PROVIDER__API_KEY`
    fn load_or_default(path: &Path) -> Result<CoachConfig> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix("MACROCOACH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CoachError::Configuration(format!("Failed to build config: {}", e)))?;

        let config: CoachConfig = s.try_deserialize().map_err(|e| {
            CoachError::Configuration(format!("Failed to deserialize config: {}", e))
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("config.toml")).unwrap();
        let config = manager.get();

        assert_eq!(config.memory.max_messages, 100);
        assert_eq!(config.memory.retention_days, 90);
        assert_eq!(config.tools.max_results, 5);
        assert_eq!(config.provider.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[memory]\nmax_messages = 40\n\n[provider]\nmodel = \"openai/gpt-4o-mini\"\n").unwrap();

        let manager = ConfigManager::with_path(path).unwrap();
        assert_eq!(manager.get().memory.max_messages, 40);
        assert_eq!(manager.get().memory.max_plans, 50);
        assert_eq!(manager.get().provider.model, "openai/gpt-4o-mini");
        assert_eq!(manager.get().memory.settings().max_messages, 40);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut manager = ConfigManager::with_path(path.clone()).unwrap();
        manager.get_mut().data_dir = Some(dir.path().join("data"));
        manager.get_mut().tools.search_debounce_ms = 150;
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.data_dir().unwrap(), dir.path().join("data"));
        assert_eq!(reloaded.get().tools.debounce(), Duration::from_millis(150));
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
}

/// General configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Maximum number of clipboard entries to keep
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Override for the data directory (history file, images, logs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Log level for the log file (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            max_history: default_max_history(),
            data_dir: None,
            log_level: default_log_level(),
        }
    }
}

/// What happens when a clip is selected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Simulate a paste keystroke after writing the clipboard
    #[serde(default = "default_auto_paste")]
    pub auto_paste: bool,

    /// Delay before the paste keystroke, giving the target window time to focus
    #[serde(default = "default_paste_delay_ms")]
    pub paste_delay_ms: u64,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        ActivationConfig {
            auto_paste: default_auto_paste(),
            paste_delay_ms: default_paste_delay_ms(),
        }
    }
}

// Default value functions for serde
fn default_max_history() -> usize {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_auto_paste() -> bool {
    true
}

fn default_paste_delay_ms() -> u64 {
    80
}

/// Trait for configuration storage
pub trait ConfigStorage: Send + Sync {
    /// Load configuration from file
    fn load(&self) -> Result<Config>;

    /// Save configuration to file
    fn save(&self, config: &Config) -> Result<()>;

    /// Get the config file path
    fn path(&self) -> &PathBuf;

    /// Create default configuration file if it doesn't exist
    fn create_default(&self) -> Result<()>;
}

/// TOML-based implementation of ConfigStorage
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    /// Create a new TomlConfigStorage with the given path
    pub fn new(path: PathBuf) -> Self {
        TomlConfigStorage { path }
    }
}

impl ConfigStorage for TomlConfigStorage {
    fn load(&self) -> Result<Config> {
        // If file doesn't exist, create default and return it
        if !self.path.exists() {
            log::info!(
                "Config file not found at {:?}, creating default configuration",
                self.path
            );
            self.create_default()?;
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {:?}", self.path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", self.path))?;

        log::info!("Loaded configuration from {:?}", self.path);
        log::debug!(
            "Config: max_history={}, auto_paste={}",
            config.general.max_history,
            config.activation.auto_paste
        );

        Ok(config)
    }

    fn save(&self, config: &Config) -> Result<()> {
        let toml_str = toml::to_string_pretty(config)
            .with_context(|| "Failed to serialize configuration")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(&self.path, toml_str)
            .with_context(|| format!("Failed to write config to {:?}", self.path))?;

        log::debug!("Saved configuration to {:?}", self.path);

        Ok(())
    }

    fn path(&self) -> &PathBuf {
        &self.path
    }

    fn create_default(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        // Use the example config compiled into the binary
        let example_config = include_str!("../../clipstash.toml.example");

        fs::write(&self.path, example_config)
            .with_context(|| format!("Failed to create default config at {:?}", self.path))?;

        log::info!("Created default configuration at {:?}", self.path);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.general.max_history, 200);
        assert_eq!(config.general.data_dir, None);
        assert_eq!(config.general.log_level, "info");
        assert!(config.activation.auto_paste);
        assert_eq!(config.activation.paste_delay_ms, 80);
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let example: Config = toml::from_str(include_str!("../../clipstash.toml.example")).unwrap();
        assert_eq!(example.general.max_history, 200);
        assert!(example.activation.auto_paste);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [general]
            max_history = 50
            data_dir = "/tmp/clips"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.max_history, 50);
        assert_eq!(config.general.data_dir, Some(PathBuf::from("/tmp/clips")));
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.activation.paste_delay_ms, 80);
    }

    #[test]
    fn test_missing_file_writes_default() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlConfigStorage::new(dir.path().join("clipstash.toml"));

        let config = storage.load().unwrap();
        assert_eq!(config.general.max_history, 200);
        assert!(storage.path().exists());

        // Second load parses the written file
        let reloaded = storage.load().unwrap();
        assert_eq!(reloaded.general.max_history, 200);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TomlConfigStorage::new(dir.path().join("clipstash.toml"));
        let mut config = Config::default();
        config.general.max_history = 25;
        config.activation.auto_paste = false;

        storage.save(&config).unwrap();
        let reloaded = storage.load().unwrap();

        assert_eq!(reloaded.general.max_history, 25);
        assert!(!reloaded.activation.auto_paste);
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
#[cfg(feature = "yaml-config")]
use serde_yaml;
#[cfg(feature = "toml-config")]
use toml;

use crate::kernel::constants;
use crate::storage::error::{Result, StorageError};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Formats probed when looking for a file, in lookup order.
    pub const ALL: &'static [ConfigFormat] = &[
        ConfigFormat::Json,
        #[cfg(feature = "yaml-config")]
        ConfigFormat::Yaml,
        #[cfg(feature = "toml-config")]
        ConfigFormat::Toml,
    ];

    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// In-memory representation of configuration data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigData {
    /// Raw configuration values
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

impl ConfigData {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Create a configuration from a HashMap
    pub fn from_hashmap(values: HashMap<String, serde_json::Value>) -> Self {
        Self { values }
    }

    /// Get a configuration value, `None` when absent or of the wrong shape
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.values.get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Get a configuration value, reporting values of the wrong shape
    pub fn try_get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StorageError::InvalidValue { key: key.to_string(), source }),
        }
    }

    /// Get a configuration value with default
    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Nested table stored under `key`, empty when absent or not a table
    pub fn section(&self, key: &str) -> ConfigData {
        self.get::<HashMap<String, serde_json::Value>>(key)
            .map(ConfigData::from_hashmap)
            .unwrap_or_default()
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|source| StorageError::InvalidValue { key: key.to_string(), source })?;
        self.values.insert(key.to_string(), json_value);
        Ok(())
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Get all keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge with another config, overriding existing values
    pub fn merge(&mut self, other: &ConfigData) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        let failed = |source: Box<dyn std::error::Error + Send + Sync>| StorageError::SerializationError {
            format: format.extension().to_string(),
            source,
        };
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&self).map_err(|e| failed(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(&self).map_err(|e| failed(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(&self).map_err(|e| failed(Box::new(e))),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let failed = |source: Box<dyn std::error::Error + Send + Sync>| StorageError::DeserializationError {
            format: format.extension().to_string(),
            source,
        };
        match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| failed(Box::new(e))),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| failed(Box::new(e))),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| failed(Box::new(e))),
        }
    }
}

/// Plugin configuration scope determines which plugin configuration to access
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PluginConfigScope {
    /// Shipped defaults
    Default,
    /// User overrides (take priority over defaults)
    User,
}

impl PluginConfigScope {
    fn dir_name(&self) -> &'static str {
        match self {
            PluginConfigScope::Default => "default",
            PluginConfigScope::User => "user",
        }
    }
}

/// Reads and writes configuration files below a root directory.
///
/// Layout:
/// ```text
/// <root>/talkie.<ext>                      application config
/// <root>/plugins/default/<plugin>.<ext>    plugin defaults
/// <root>/plugins/user/<plugin>.<ext>       plugin user overrides
/// ```
/// Missing files read as empty configuration.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    default_format: ConfigFormat,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_format: ConfigFormat::Json,
        }
    }

    pub fn with_default_format(mut self, format: ConfigFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn default_format(&self) -> ConfigFormat {
        self.default_format
    }

    fn plugin_dir(&self, scope: PluginConfigScope) -> PathBuf {
        self.root.join(constants::PLUGIN_CONFIG_DIR).join(scope.dir_name())
    }

    /// First existing `<dir>/<stem>.<ext>` over every supported format.
    fn find(&self, dir: &Path, stem: &str) -> Option<PathBuf> {
        ConfigFormat::ALL
            .iter()
            .map(|format| dir.join(format!("{}.{}", stem, format.extension())))
            .chain(std::iter::once(dir.join(format!("{}.yml", stem))))
            .find(|path| path.is_file())
    }

    /// Load a single file, format taken from its extension.
    pub fn load_file(&self, path: &Path) -> Result<ConfigData> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StorageError::UnsupportedConfigFormat(path.to_path_buf()))?;
        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::io(e, "read config", path.to_path_buf()))?;
        log::debug!("Loaded configuration from {}", path.display());
        ConfigData::deserialize(&content, format)
    }

    fn load_optional(&self, dir: &Path, stem: &str) -> Result<ConfigData> {
        match self.find(dir, stem) {
            Some(path) => self.load_file(&path),
            None => Ok(ConfigData::new()),
        }
    }

    /// Application configuration.
    pub fn load_app_config(&self) -> Result<ConfigData> {
        self.load_optional(&self.root, constants::APP_CONFIG_STEM)
    }

    /// Plugin configuration in one scope only.
    pub fn load_plugin_scope(&self, plugin_name: &str, scope: PluginConfigScope) -> Result<ConfigData> {
        self.load_optional(&self.plugin_dir(scope), plugin_name)
    }

    /// Plugin defaults with user overrides applied on top.
    pub fn load_plugin_config(&self, plugin_name: &str) -> Result<ConfigData> {
        let mut merged = self.load_plugin_scope(plugin_name, PluginConfigScope::Default)?;
        let user = self.load_plugin_scope(plugin_name, PluginConfigScope::User)?;
        merged.merge(&user);
        Ok(merged)
    }

    /// Write plugin configuration in the default format.
    pub fn save_plugin_config(
        &self,
        plugin_name: &str,
        config: &ConfigData,
        scope: PluginConfigScope,
    ) -> Result<PathBuf> {
        let dir = self.plugin_dir(scope);
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io(e, "create config directory", dir.clone()))?;
        let path = dir.join(format!("{}.{}", plugin_name, self.default_format.extension()));
        let content = config.serialize(self.default_format)?;
        fs::write(&path, content)
            .map_err(|e| StorageError::io(e, "write config", path.clone()))?;
        Ok(path)
    }

    /// Names of plugins that have a configuration file in `scope`.
    pub fn list_plugin_configs(&self, scope: PluginConfigScope) -> Result<Vec<String>> {
        let dir = self.plugin_dir(scope);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir)
            .map_err(|e| StorageError::io(e, "list config directory", dir.clone()))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && ConfigFormat::from_path(path).is_some())
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str().map(String::from)))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

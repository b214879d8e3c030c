use std::collections::HashMap;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::config::{ConfigData, ConfigLoader};

/// Shared, read-only application state handed to every plugin once.
#[derive(Debug, Clone)]
pub struct AppContext {
    name: String,
    version: String,
    config: ConfigData,
    plugin_configs: HashMap<String, ConfigData>,
}

impl AppContext {
    /// Creates a context with empty configuration.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            config: ConfigData::new(),
            plugin_configs: HashMap::new(),
        }
    }

    /// Loads the application config and the config of every named plugin.
    pub fn load<'a>(loader: &ConfigLoader, plugin_names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        log::info!("Using config directory: {}", loader.root().display());

        let mut context = Self::new(constants::APP_NAME, constants::APP_VERSION)
            .with_config(loader.load_app_config()?);
        for name in plugin_names {
            let plugin_config = loader.load_plugin_config(name)?;
            if !plugin_config.is_empty() {
                log::debug!("Loaded configuration for plugin '{}'", name);
            }
            context = context.with_plugin_config(name, plugin_config);
        }
        Ok(context)
    }

    pub fn with_config(mut self, config: ConfigData) -> Self {
        self.config = config;
        self
    }

    pub fn with_plugin_config(mut self, plugin_name: impl Into<String>, config: ConfigData) -> Self {
        self.plugin_configs.insert(plugin_name.into(), config);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Application configuration.
    pub fn config(&self) -> &ConfigData {
        &self.config
    }

    /// Configuration of one plugin, empty when it has none.
    pub fn plugin_config(&self, plugin_name: &str) -> ConfigData {
        self.plugin_configs.get(plugin_name).cloned().unwrap_or_default()
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(constants::APP_NAME, constants::APP_VERSION)
    }
}

//! Installs the process-wide log subscriber.
//!
//! Library code logs through the `log` facade; this plugin bridges those records
//! into a `tracing-subscriber` formatter on stderr. The filter comes from the
//! plugin's `level` option unless `RUST_LOG` is set.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use talkie_core::kernel::context::AppContext;
use talkie_core::plugin_system::traits::{Plugin, PluginError};
use talkie_core::storage::config::ConfigData;
use talkie_core::storage::error::StorageError;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

pub const PLUGIN_NAME: &str = "core-logging";
pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

impl LoggingSettings {
    /// Reads `level`, `format` and `with_target`; absent keys keep their defaults.
    pub fn from_config(config: &ConfigData) -> Result<Self, StorageError> {
        let defaults = Self::default();
        Ok(Self {
            level: config.try_get("level")?.unwrap_or(defaults.level),
            format: config.try_get("format")?.unwrap_or(defaults.format),
            with_target: config.try_get("with_target")?.unwrap_or(defaults.with_target),
        })
    }

    pub fn to_config(&self) -> ConfigData {
        let mut config = ConfigData::new();
        // Plain strings, bools and unit enums always serialize.
        let _ = config.set("level", &self.level);
        let _ = config.set("format", self.format);
        let _ = config.set("with_target", self.with_target);
        config
    }

    /// `RUST_LOG` when set, the configured level otherwise.
    pub fn filter(&self) -> Result<EnvFilter, PluginError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level).map_err(|e| {
                PluginError::InitError(format!("Invalid log level '{}': {}", self.level, e))
            }),
        }
    }
}

#[derive(Default)]
pub struct LoggingPlugin {
    settings: OnceLock<Result<LoggingSettings, String>>,
    installed: AtomicBool,
}

impl LoggingPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings taken from the attached context, defaults before that.
    pub fn settings(&self) -> Result<LoggingSettings, PluginError> {
        match self.settings.get() {
            None => Ok(LoggingSettings::default()),
            Some(Ok(settings)) => Ok(settings.clone()),
            Some(Err(message)) => Err(PluginError::InitError(message.clone())),
        }
    }

    /// True once `initialize` ran successfully.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }
}

/// Installs the subscriber and the `log` bridge. Returns `false` when the
/// process already had a global subscriber, which is then left in place.
fn install(settings: &LoggingSettings) -> Result<bool, PluginError> {
    let filter = settings.filter()?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(settings.with_target)
        .with_writer(std::io::stderr);
    let installed = match settings.format {
        LogFormat::Text => tracing::subscriber::set_global_default(subscriber.finish()).is_ok(),
        LogFormat::Json => tracing::subscriber::set_global_default(subscriber.json().finish()).is_ok(),
    };
    if !installed {
        return Ok(false);
    }
    if let Err(e) = LogTracer::init() {
        // Another `log` backend owns the facade; tracing events still go out.
        warn!("Could not bridge log records into tracing: {}", e);
    }
    Ok(true)
}

impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn attach_context(&self, context: Arc<AppContext>) {
        let parsed = LoggingSettings::from_config(&context.plugin_config(PLUGIN_NAME))
            .map_err(|e| format!("Invalid {} configuration: {}", PLUGIN_NAME, e));
        let _ = self.settings.set(parsed);
    }

    fn customization_options(&self) -> ConfigData {
        self.settings().unwrap_or_default().to_config()
    }

    fn initialize(&self) -> Result<(), PluginError> {
        if self.is_installed() {
            return Ok(());
        }
        let settings = self.settings()?;
        if install(&settings)? {
            info!("Initializing Core Logging Plugin (level '{}', {:?} output)", settings.level, settings.format);
        } else {
            debug!("A global log subscriber is already installed, keeping it");
        }
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

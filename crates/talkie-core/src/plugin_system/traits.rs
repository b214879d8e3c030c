use std::sync::Arc;

use crate::kernel::context::AppContext;
use crate::plugin_system::dependency::Dependency;
use crate::plugin_system::feature::{FeatureKey, FeatureWrapper};
use crate::storage::config::ConfigData;

/// Error type for plugin operations
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin initialization error: {0}")]
    InitError(String),

    /// The feature exists but its owner has not built it yet.
    #[error("Feature '{feature}' is not ready yet")]
    FeatureNotReady { feature: FeatureKey },

    /// A dependency slot was read before the manager injected it.
    #[error("Dependency '{0}' was accessed before it was injected")]
    NotInjected(&'static str),

    #[error("Plugin execution error: {0}")]
    ExecutionError(String),

    /// A native library or platform service is absent from the running host.
    #[error("Platform linkage error: {0}")]
    PlatformLinkage(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Core trait that all plugins must implement
///
/// Lifecycle, driven by [`PluginManager::configure`](crate::plugin_system::PluginManager::configure):
/// context attached, `api` collected, `dependency` resolved and injected,
/// `initialize` attempted (possibly several times), then `do_after_initialize`
/// once every plugin has initialized.
pub trait Plugin: Send + Sync + 'static {
    /// The name of the plugin
    fn name(&self) -> &str;

    /// Features this plugin publishes.
    fn api(&self) -> Vec<FeatureWrapper> {
        Vec::new()
    }

    /// Features this plugin needs, with the callbacks that receive them.
    fn dependency(&self) -> Dependency {
        Dependency::EMPTY
    }

    /// Receives the shared application context. Called once by the manager
    /// before any dependency is resolved.
    fn attach_context(&self, _context: Arc<AppContext>) {}

    /// Plugin specific options. Opaque to the manager.
    fn customization_options(&self) -> ConfigData {
        ConfigData::new()
    }

    /// Initialize the plugin. May fail while injected features are not usable
    /// yet; the manager retries until no further progress is possible.
    fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Runs once after every registered plugin has initialized.
    fn do_after_initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

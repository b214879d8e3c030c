pub mod kernel;
pub mod plugin_system;
pub mod storage;

// Re-export key public types/traits for the host binary and plugins
pub use kernel::error::Error as KernelError;
pub use kernel::AppContext;
pub use plugin_system::{
    Dependency, Feature, FeatureKey, FeatureProvider, FeatureWrapper, Plugin, PluginError, PluginManager,
    PluginSystemError,
};
pub use storage::{ConfigData, ConfigLoader};

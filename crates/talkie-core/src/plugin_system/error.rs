//! # Talkie Plugin System Errors
//!
//! Defines error types specific to plugin wiring.
//!
//! [`PluginSystemError`] is what [`PluginManager::configure`](crate::plugin_system::PluginManager::configure)
//! fails with: missing or ambiguous dependencies found while resolving, stalled or
//! slow initialization detected by the retry loop, and failures raised from
//! `do_after_initialize`. Every variant is fatal to the `configure` call.
use crate::plugin_system::feature::{FeatureKey, Record};
use crate::plugin_system::report::InitializationReport;
use crate::plugin_system::traits::PluginError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin '{plugin}' requires feature '{feature}' but no plugin provides it")]
    RequiredDependencyMissing {
        feature: FeatureKey,
        plugin: String,
    },

    #[error("Plugin '{plugin}' requires a set of feature '{feature}' but no plugin provides it")]
    RequiredDependencySetMissing {
        feature: FeatureKey,
        plugin: String,
    },

    #[error(
        "Plugin '{plugin}' depends on feature '{feature}' which is provided by several plugins: [{}]",
        supplier_list(candidates)
    )]
    AmbiguousDependency {
        feature: FeatureKey,
        plugin: String,
        /// Every record published for `feature`, in registration order.
        candidates: Vec<Record>,
    },

    /// A resolver was handed an empty candidate list for a single dependency.
    #[error("Resolver asked to pick feature '{feature}' for plugin '{plugin}' without candidates")]
    NoCandidates {
        feature: FeatureKey,
        plugin: String,
    },

    #[error("Provider registered for feature '{feature}' does not match the type requested by plugin '{plugin}'")]
    FeatureTypeMismatch {
        feature: FeatureKey,
        plugin: String,
    },

    #[error("Plugin initialization made no progress, probably a circular dependency:\n{report}")]
    InfiniteInitialization {
        report: InitializationReport,
    },

    #[error("Plugin initialization converges too slowly, check the registration order:\n{report}")]
    BadInitializationPerformance {
        report: InitializationReport,
    },

    #[error("Plugin '{plugin}' failed after initialization: {source}")]
    PostInitialization {
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("Failed to dispatch post-initialization work: {message}")]
    BackgroundDispatch {
        message: String,
    },
}

fn supplier_list(records: &[Record]) -> String {
    records.iter().map(Record::supplier_name).collect::<Vec<_>>().join(", ")
}

/// Shorthand for results produced by the plugin system.
pub type Result<T> = std::result::Result<T, PluginSystemError>;

use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::sync::Arc;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::kernel::constants;
use crate::kernel::context::AppContext;
use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::executor::{ErrorSink, LogErrorSink, PostInitExecutor, PostInitHandle, ThreadExecutor};
use crate::plugin_system::registry::{FeatureRegistry, PluginSet};
use crate::plugin_system::report::InitializationReport;
use crate::plugin_system::resolver::{FeatureResolver, SimpleFeatureResolver};
use crate::plugin_system::traits::{Plugin, PluginError};
use crate::plugin_system::wiring::WiringPlan;
use crate::storage::config::ConfigData;
use crate::storage::error::Result as StorageResult;

/// Switches controlling how [`PluginManager::configure`] behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Swallow platform linkage failures raised by `do_after_initialize`.
    pub under_test: bool,
    /// Fail when a pass initializes fewer than half of the pending plugins.
    pub detect_slow_init_process: bool,
    /// Run `do_after_initialize` off the calling thread.
    pub do_after_initialize_on_background: bool,
}

impl ManagerSettings {
    /// Reads the `plugin_manager` section of the application config.
    /// Missing keys keep their defaults.
    pub fn from_config(config: &ConfigData) -> StorageResult<Self> {
        Ok(config
            .try_get::<ManagerSettings>(constants::MANAGER_SETTINGS_KEY)?
            .unwrap_or_default())
    }
}

/// Wires plugins together and brings them up.
///
/// Register every plugin, then call [`configure`](Self::configure) once at
/// startup. `configure` either returns with every plugin initialized or fails
/// with the first fatal [`PluginSystemError`].
pub struct PluginManager {
    plugins: PluginSet,
    resolver: Box<dyn FeatureResolver>,
    settings: ManagerSettings,
    executor: Arc<dyn PostInitExecutor>,
    error_sink: Arc<dyn ErrorSink>,
    post_init: Option<PostInitHandle>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: PluginSet::new(),
            resolver: Box::new(SimpleFeatureResolver),
            settings: ManagerSettings::default(),
            executor: Arc::new(ThreadExecutor),
            error_sink: Arc::new(LogErrorSink),
            post_init: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl FeatureResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn under_test(mut self, enabled: bool) -> Self {
        self.settings.under_test = enabled;
        self
    }

    pub fn detect_slow_init_process(mut self, enabled: bool) -> Self {
        self.settings.detect_slow_init_process = enabled;
        self
    }

    pub fn do_after_initialize_on_background(mut self, enabled: bool) -> Self {
        self.settings.do_after_initialize_on_background = enabled;
        self
    }

    pub fn with_executor(mut self, executor: impl PostInitExecutor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    pub fn settings(&self) -> ManagerSettings {
        self.settings
    }

    /// Registers a plugin. Registering the same instance again has no effect.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        let name = plugin.name().to_string();
        if self.plugins.insert(plugin) {
            debug!("Registered plugin '{}'", name);
        } else {
            debug!("Plugin '{}' already registered, skipping", name);
        }
        self
    }

    pub fn register_plugins<I>(&mut self, plugins: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        for plugin in plugins {
            self.register_plugin(plugin);
        }
        self
    }

    /// Registered plugins, in registration order.
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Collects every plugin's features, injects every declared dependency,
    /// initializes all plugins and runs their post-initialization hook.
    pub fn configure(&mut self, context: Arc<AppContext>) -> Result<()> {
        if self.plugins.is_empty() {
            debug!("No plugins registered, nothing to configure");
            return Ok(());
        }
        let plugins = self.plugins.snapshot();
        info!("Configuring {} plugins", plugins.len());

        let registry = self.collect(&plugins, &context);
        self.resolve_all(&plugins, &registry)?;
        self.initialize_all(&plugins)?;
        self.after_initialize(plugins)
    }

    /// Evaluates every declared dependency against the registered plugins
    /// without injecting anything or touching plugin lifecycles.
    pub fn plan(&self) -> WiringPlan {
        let plugins = self.plugins.snapshot();
        let registry: FeatureRegistry = plugins.iter().cloned().collect();
        WiringPlan::evaluate(&plugins, &registry, self.resolver.as_ref())
    }

    /// Completion handle of the background post-initialization batch started
    /// by the last `configure`, if any.
    pub fn take_post_init_handle(&mut self) -> Option<PostInitHandle> {
        self.post_init.take()
    }

    /// Blocks until background post-initialization is over. Returns immediately
    /// when nothing runs in the background.
    pub fn wait_post_initialize(&mut self) {
        if let Some(handle) = self.post_init.take() {
            handle.wait();
        }
    }

    fn collect(&self, plugins: &[Arc<dyn Plugin>], context: &Arc<AppContext>) -> FeatureRegistry {
        let mut registry = FeatureRegistry::new();
        for plugin in plugins {
            plugin.attach_context(Arc::clone(context));
            registry.publish(plugin);
        }
        debug!(
            "Collected {} providers for {} features",
            registry.len(),
            registry.features().len()
        );
        registry
    }

    fn resolve_all(&self, plugins: &[Arc<dyn Plugin>], registry: &FeatureRegistry) -> Result<()> {
        for plugin in plugins {
            self.resolve_plugin(plugin.as_ref(), registry)?;
        }
        Ok(())
    }

    fn resolve_plugin(&self, plugin: &dyn Plugin, registry: &FeatureRegistry) -> Result<()> {
        let dependency = plugin.dependency();
        trace!("Resolving dependencies of '{}': {:?}", plugin.name(), dependency);

        for entry in dependency.required() {
            let records = registry.records_for(entry.key());
            if records.is_empty() {
                return Err(PluginSystemError::RequiredDependencyMissing {
                    feature: entry.key(),
                    plugin: plugin.name().to_string(),
                });
            }
            let provider = self.resolver.resolve_required_single(entry.key(), plugin, records)?;
            entry.inject(plugin, &provider)?;
        }

        for entry in dependency.optional() {
            let records = registry.records_for(entry.key());
            if records.is_empty() {
                trace!("Optional feature '{}' of '{}' has no provider", entry.key(), plugin.name());
                continue;
            }
            if let Some(provider) = self.resolver.resolve_optional_single(entry.key(), plugin, records)? {
                entry.inject(plugin, &provider)?;
            }
        }

        for entry in dependency.required_sets() {
            let records = registry.records_for(entry.key());
            let missing = || PluginSystemError::RequiredDependencySetMissing {
                feature: entry.key(),
                plugin: plugin.name().to_string(),
            };
            if records.is_empty() {
                return Err(missing());
            }
            let providers = self.resolver.resolve_required_multi(entry.key(), plugin, records)?;
            if providers.is_empty() {
                return Err(missing());
            }
            entry.inject(plugin, &providers)?;
        }

        for entry in dependency.optional_sets() {
            let records = registry.records_for(entry.key());
            if records.is_empty() {
                continue;
            }
            match self.resolver.resolve_optional_multi(entry.key(), plugin, records)? {
                Some(providers) if !providers.is_empty() => entry.inject(plugin, &providers)?,
                _ => trace!("No selection for optional set '{}' of '{}'", entry.key(), plugin.name()),
            }
        }
        Ok(())
    }

    /// Retries `initialize` pass after pass until every plugin succeeded.
    ///
    /// A pass that initializes nobody means the remaining plugins wait on each
    /// other forever. With slow-init detection on, a pass leaving more than
    /// half of its plugins pending is also fatal.
    fn initialize_all(&self, plugins: &[Arc<dyn Plugin>]) -> Result<()> {
        let mut non_initialized: VecDeque<Arc<dyn Plugin>> = plugins.iter().cloned().collect();
        let mut errors = InitializationReport::new();
        let mut pass = 0;

        while !non_initialized.is_empty() {
            pass += 1;
            let initial_size = non_initialized.len();
            let mut pending = VecDeque::with_capacity(initial_size);
            debug!("Initialization pass {} with {} pending plugins", pass, initial_size);

            while let Some(plugin) = non_initialized.pop_front() {
                match plugin.initialize() {
                    Ok(()) => debug!("Plugin '{}' initialized", plugin.name()),
                    Err(error) => {
                        trace!("Plugin '{}' not ready on pass {}: {}", plugin.name(), pass, error);
                        errors.record(plugin.name(), pass, error);
                        pending.push_back(plugin);
                    }
                }
            }

            if pending.len() == initial_size {
                return Err(PluginSystemError::InfiniteInitialization { report: errors });
            }
            if self.settings.detect_slow_init_process && pending.len() > initial_size / 2 {
                return Err(PluginSystemError::BadInitializationPerformance { report: errors });
            }
            errors.clear();
            non_initialized = pending;
        }

        info!("All {} plugins initialized after {} passes", plugins.len(), pass);
        Ok(())
    }

    fn after_initialize(&mut self, plugins: Vec<Arc<dyn Plugin>>) -> Result<()> {
        let under_test = self.settings.under_test;
        if !self.settings.do_after_initialize_on_background {
            return run_after_initialize(&plugins, under_test);
        }

        let sink = Arc::clone(&self.error_sink);
        let (done, handle) = PostInitHandle::channel();
        self.executor.spawn(Box::new(move || {
            if let Err(error) = run_after_initialize(&plugins, under_test) {
                sink.report(error);
            }
            let _ = done.send(());
        }))?;
        debug!("Post-initialization dispatched to background");
        self.post_init = Some(handle);
        Ok(())
    }
}

/// Calls `do_after_initialize` on each plugin in order, stopping at the first failure.
fn run_after_initialize(plugins: &[Arc<dyn Plugin>], under_test: bool) -> Result<()> {
    for plugin in plugins {
        match plugin.do_after_initialize() {
            Ok(()) => trace!("Plugin '{}' finished post-initialization", plugin.name()),
            Err(PluginError::PlatformLinkage(message)) if under_test => {
                warn!("Ignoring platform linkage failure of '{}' under test: {}", plugin.name(), message);
            }
            Err(source) => {
                return Err(PluginSystemError::PostInitialization {
                    plugin: plugin.name().to_string(),
                    source,
                });
            }
        }
    }
    Ok(())
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|plugin| plugin.name()).collect();
        f.debug_struct("PluginManager")
            .field("plugins", &names)
            .field("settings", &self.settings)
            .field("post_init_pending", &self.post_init.is_some())
            .finish_non_exhaustive()
    }
}

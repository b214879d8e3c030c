use std::collections::HashMap;
use std::sync::Arc;

use crate::plugin_system::feature::{FeatureKey, FeatureWrapper, Record};
use crate::plugin_system::traits::Plugin;

/// Registered plugins, unique by instance, in registration order.
#[derive(Default, Clone)]
pub struct PluginSet {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin. Returns `false` if this exact instance is already present.
    pub fn insert(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        if self.contains(&plugin) {
            return false;
        }
        self.plugins.push(plugin);
        true
    }

    pub fn contains(&self, plugin: &Arc<dyn Plugin>) -> bool {
        self.plugins.iter().any(|existing| same_instance(existing, plugin))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.iter()
    }

    /// Owned copy of the plugin list, for handing to another phase or thread.
    pub fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins.clone()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn same_instance(a: &Arc<dyn Plugin>, b: &Arc<dyn Plugin>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Published features, keyed by feature.
///
/// Built fresh for every `configure` call and only read once collection is over.
#[derive(Default)]
pub struct FeatureRegistry {
    records: HashMap<FeatureKey, Vec<Record>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers everything `plugin` declares in its `api`.
    pub fn publish(&mut self, plugin: &Arc<dyn Plugin>) {
        for wrapper in plugin.api() {
            self.add(plugin, wrapper);
        }
    }

    /// Adds one record. The same plugin publishing the same provider twice is
    /// recorded once.
    pub fn add(&mut self, plugin: &Arc<dyn Plugin>, wrapper: FeatureWrapper) {
        let records = self.records.entry(wrapper.key()).or_default();
        let duplicate = records.iter().any(|record| {
            same_instance(record.plugin(), plugin) && record.provider().ptr_eq(wrapper.provider())
        });
        if duplicate {
            log::debug!(
                "Plugin '{}' published feature '{}' twice, ignoring the repeat",
                plugin.name(),
                wrapper.key()
            );
            return;
        }
        log::trace!("Plugin '{}' provides feature '{}'", plugin.name(), wrapper.key());
        records.push(Record::new(Arc::clone(plugin), wrapper.provider().clone()));
    }

    /// Candidates for `feature`, in registration order. Empty when nobody publishes it.
    pub fn records_for(&self, feature: FeatureKey) -> &[Record] {
        self.records.get(&feature).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn features(&self) -> Vec<FeatureKey> {
        let mut keys: Vec<FeatureKey> = self.records.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }
}

impl FromIterator<Arc<dyn Plugin>> for FeatureRegistry {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Plugin>>>(plugins: I) -> Self {
        let mut registry = FeatureRegistry::new();
        for plugin in plugins {
            registry.publish(&plugin);
        }
        registry
    }
}

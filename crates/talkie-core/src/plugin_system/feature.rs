//! Capability model: the features plugins publish and the providers that
//! hand them out.
use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::plugin_system::traits::{Plugin, PluginError};

/// Stable identity of a feature type.
///
/// Keys are plain names chosen by whoever declares the feature, e.g.
/// `"talkie.transport"`. Two different feature types must never share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey(&'static str);

impl FeatureKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// A unit of publicly exposed functionality.
///
/// Usually implemented for a trait object so consumers never see the concrete
/// type:
///
/// ```
/// use talkie_core::plugin_system::{Feature, FeatureKey};
///
/// pub trait Clock: Send + Sync {
///     fn now_ms(&self) -> u64;
/// }
///
/// impl Feature for dyn Clock {
///     const KEY: FeatureKey = FeatureKey::new("example.clock");
/// }
/// ```
pub trait Feature: Send + Sync + 'static {
    const KEY: FeatureKey;
}

type Supplier<F> = dyn Fn() -> Result<Arc<F>, PluginError> + Send + Sync;

/// Lazy supplier of a feature instance.
///
/// Every call to [`get`](FeatureProvider::get) runs the supplier again; caching,
/// if any, is the supplier's own business. A supplier may fail until the plugin
/// that owns it has finished initializing.
pub struct FeatureProvider<F: Feature + ?Sized> {
    supplier: Arc<Supplier<F>>,
}

impl<F: Feature + ?Sized> FeatureProvider<F> {
    pub fn new<S>(supplier: S) -> Self
    where
        S: Fn() -> Result<Arc<F>, PluginError> + Send + Sync + 'static,
    {
        Self { supplier: Arc::new(supplier) }
    }

    /// Provider for an instance that already exists.
    pub fn ready(value: Arc<F>) -> Self {
        Self::new(move || Ok(Arc::clone(&value)))
    }

    /// Provider backed by a slot the owning plugin fills during `initialize`.
    pub fn from_slot(slot: FeatureSlot<F>) -> Self {
        Self::new(move || slot.get())
    }

    pub fn get(&self) -> Result<Arc<F>, PluginError> {
        (self.supplier)()
    }

    pub fn key(&self) -> FeatureKey {
        F::KEY
    }

    /// True when both handles share the same underlying supplier.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.supplier, &other.supplier)
    }
}

impl<F: Feature + ?Sized> Clone for FeatureProvider<F> {
    fn clone(&self) -> Self {
        Self { supplier: Arc::clone(&self.supplier) }
    }
}

impl<F: Feature + ?Sized> fmt::Debug for FeatureProvider<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureProvider")
            .field("feature", &F::KEY)
            .finish_non_exhaustive()
    }
}

/// Set-once cell a plugin fills with the feature it builds in `initialize`.
///
/// Clones share the same cell.
pub struct FeatureSlot<F: Feature + ?Sized> {
    cell: Arc<OnceLock<Arc<F>>>,
}

impl<F: Feature + ?Sized> FeatureSlot<F> {
    pub fn new() -> Self {
        Self { cell: Arc::new(OnceLock::new()) }
    }

    /// Stores the feature. Returns `false` if the slot was already filled.
    pub fn fill(&self, value: Arc<F>) -> bool {
        self.cell.set(value).is_ok()
    }

    pub fn is_filled(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get(&self) -> Result<Arc<F>, PluginError> {
        self.cell
            .get()
            .cloned()
            .ok_or(PluginError::FeatureNotReady { feature: F::KEY })
    }

    pub fn provider(&self) -> FeatureProvider<F> {
        FeatureProvider::from_slot(self.clone())
    }
}

impl<F: Feature + ?Sized> Default for FeatureSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Feature + ?Sized> Clone for FeatureSlot<F> {
    fn clone(&self) -> Self {
        Self { cell: Arc::clone(&self.cell) }
    }
}

/// Type-erased [`FeatureProvider`], tagged with its feature key.
#[derive(Clone)]
pub struct AnyProvider {
    key: FeatureKey,
    inner: Arc<dyn Any + Send + Sync>,
}

impl AnyProvider {
    pub fn new<F: Feature + ?Sized>(provider: FeatureProvider<F>) -> Self {
        Self {
            key: F::KEY,
            inner: Arc::new(provider),
        }
    }

    pub fn key(&self) -> FeatureKey {
        self.key
    }

    /// Recovers the typed provider, or `None` if it was published for another type.
    pub fn downcast<F: Feature + ?Sized>(&self) -> Option<FeatureProvider<F>> {
        self.inner.downcast_ref::<FeatureProvider<F>>().cloned()
    }

    pub fn ptr_eq(&self, other: &AnyProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyProvider").field("feature", &self.key).finish_non_exhaustive()
    }
}

/// A feature published by a plugin's `api`.
#[derive(Debug, Clone)]
pub struct FeatureWrapper {
    provider: AnyProvider,
}

impl FeatureWrapper {
    pub fn new<F: Feature + ?Sized>(provider: FeatureProvider<F>) -> Self {
        Self { provider: AnyProvider::new(provider) }
    }

    pub fn key(&self) -> FeatureKey {
        self.provider.key()
    }

    pub fn provider(&self) -> &AnyProvider {
        &self.provider
    }
}

/// A provider together with the plugin that published it.
#[derive(Clone)]
pub struct Record {
    plugin: Arc<dyn Plugin>,
    provider: AnyProvider,
}

impl Record {
    pub fn new(plugin: Arc<dyn Plugin>, provider: AnyProvider) -> Self {
        Self { plugin, provider }
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    pub fn supplier_name(&self) -> &str {
        self.plugin.name()
    }

    pub fn provider(&self) -> &AnyProvider {
        &self.provider
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("supplier", &self.plugin.name())
            .field("feature", &self.provider.key())
            .finish()
    }
}

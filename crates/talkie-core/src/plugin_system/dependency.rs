use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::feature::{AnyProvider, Feature, FeatureKey, FeatureProvider};
use crate::plugin_system::traits::{Plugin, PluginError};

/// Raised by an erased injector when the provider belongs to another type.
struct TypeMismatch;

type SingleInjector = Arc<dyn Fn(&AnyProvider) -> std::result::Result<(), TypeMismatch> + Send + Sync>;
type SetInjector = Arc<dyn Fn(&[AnyProvider]) -> std::result::Result<(), TypeMismatch> + Send + Sync>;

/// Declared dependency on exactly one provider of a feature.
#[derive(Clone)]
pub struct SingleEntry {
    key: FeatureKey,
    inject: SingleInjector,
}

impl SingleEntry {
    fn new<F, C>(callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(FeatureProvider<F>) + Send + Sync + 'static,
    {
        let inject: SingleInjector = Arc::new(move |provider: &AnyProvider| {
            let typed = provider.downcast::<F>().ok_or(TypeMismatch)?;
            callback(typed);
            Ok(())
        });
        Self { key: F::KEY, inject }
    }

    pub fn key(&self) -> FeatureKey {
        self.key
    }

    pub(crate) fn inject(&self, caller: &dyn Plugin, provider: &AnyProvider) -> Result<()> {
        (self.inject)(provider).map_err(|TypeMismatch| PluginSystemError::FeatureTypeMismatch {
            feature: self.key,
            plugin: caller.name().to_string(),
        })
    }
}

/// Declared dependency on every provider of a feature.
#[derive(Clone)]
pub struct SetEntry {
    key: FeatureKey,
    inject: SetInjector,
}

impl SetEntry {
    fn new<F, C>(callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(Vec<FeatureProvider<F>>) + Send + Sync + 'static,
    {
        let inject: SetInjector = Arc::new(move |providers: &[AnyProvider]| {
            let typed = providers
                .iter()
                .map(|provider| provider.downcast::<F>().ok_or(TypeMismatch))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            callback(typed);
            Ok(())
        });
        Self { key: F::KEY, inject }
    }

    pub fn key(&self) -> FeatureKey {
        self.key
    }

    pub(crate) fn inject(&self, caller: &dyn Plugin, providers: &[AnyProvider]) -> Result<()> {
        (self.inject)(providers).map_err(|TypeMismatch| PluginSystemError::FeatureTypeMismatch {
            feature: self.key,
            plugin: caller.name().to_string(),
        })
    }
}

/// Immutable declaration of what a plugin needs.
///
/// Built with [`Dependency::builder`]. Entries keep declaration order; declaring
/// the same feature twice in the same group keeps the last callback.
#[derive(Clone)]
pub struct Dependency {
    required: Vec<SingleEntry>,
    optional: Vec<SingleEntry>,
    required_sets: Vec<SetEntry>,
    optional_sets: Vec<SetEntry>,
}

impl Dependency {
    /// Declaration with no dependencies at all.
    pub const EMPTY: Dependency = Dependency {
        required: Vec::new(),
        optional: Vec::new(),
        required_sets: Vec::new(),
        optional_sets: Vec::new(),
    };

    pub fn empty() -> Self {
        Self::EMPTY
    }

    pub fn builder() -> DependencyBuilder {
        DependencyBuilder::default()
    }

    pub fn required(&self) -> &[SingleEntry] {
        &self.required
    }

    pub fn optional(&self) -> &[SingleEntry] {
        &self.optional
    }

    pub fn required_sets(&self) -> &[SetEntry] {
        &self.required_sets
    }

    pub fn optional_sets(&self) -> &[SetEntry] {
        &self.optional_sets
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
            && self.optional.is_empty()
            && self.required_sets.is_empty()
            && self.optional_sets.is_empty()
    }
}

impl Default for Dependency {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let single = |entries: &[SingleEntry]| entries.iter().map(SingleEntry::key).collect::<Vec<_>>();
        let sets = |entries: &[SetEntry]| entries.iter().map(SetEntry::key).collect::<Vec<_>>();
        f.debug_struct("Dependency")
            .field("required", &single(&self.required))
            .field("optional", &single(&self.optional))
            .field("required_sets", &sets(&self.required_sets))
            .field("optional_sets", &sets(&self.optional_sets))
            .finish()
    }
}

/// Fluent builder for [`Dependency`].
#[derive(Default)]
pub struct DependencyBuilder {
    dependency: Dependency,
}

impl DependencyBuilder {
    /// Exactly one provider of `F` must exist.
    pub fn require<F, C>(mut self, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(FeatureProvider<F>) + Send + Sync + 'static,
    {
        upsert(&mut self.dependency.required, SingleEntry::new::<F, C>(callback), SingleEntry::key);
        self
    }

    /// Inject `F` when a provider exists; the callback is skipped otherwise.
    pub fn optional<F, C>(mut self, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(FeatureProvider<F>) + Send + Sync + 'static,
    {
        upsert(&mut self.dependency.optional, SingleEntry::new::<F, C>(callback), SingleEntry::key);
        self
    }

    /// Every provider of `F`; at least one must exist.
    pub fn require_set<F, C>(mut self, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(Vec<FeatureProvider<F>>) + Send + Sync + 'static,
    {
        upsert(&mut self.dependency.required_sets, SetEntry::new::<F, C>(callback), SetEntry::key);
        self
    }

    /// Every provider of `F`, when there is any.
    pub fn optional_set<F, C>(mut self, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(Vec<FeatureProvider<F>>) + Send + Sync + 'static,
    {
        upsert(&mut self.dependency.optional_sets, SetEntry::new::<F, C>(callback), SetEntry::key);
        self
    }

    /// [`require`](Self::require) only when `condition` holds. The flag is read
    /// now, so plugins whose flags change must rebuild their declaration.
    pub fn require_if<F, C>(self, condition: bool, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(FeatureProvider<F>) + Send + Sync + 'static,
    {
        if condition { self.require::<F, C>(callback) } else { self }
    }

    /// [`require`](Self::require) only when `condition` does not hold.
    pub fn require_not_if<F, C>(self, condition: bool, callback: C) -> Self
    where
        F: Feature + ?Sized,
        C: Fn(FeatureProvider<F>) + Send + Sync + 'static,
    {
        self.require_if::<F, C>(!condition, callback)
    }

    pub fn build(self) -> Dependency {
        self.dependency
    }
}

fn upsert<E>(entries: &mut Vec<E>, entry: E, key: fn(&E) -> FeatureKey) {
    let new_key = key(&entry);
    match entries.iter().position(|existing| key(existing) == new_key) {
        Some(index) => entries[index] = entry,
        None => entries.push(entry),
    }
}

/// Set-once slot a plugin keeps for something the manager hands it.
///
/// Clones share the slot, so a clone can be moved into a dependency callback
/// while the plugin keeps reading from the original.
pub struct Injected<T> {
    name: &'static str,
    cell: Arc<OnceLock<T>>,
}

impl<T: Send + Sync + 'static> Injected<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Stores the value. Returns `false` if a value was already injected.
    pub fn set(&self, value: T) -> bool {
        let stored = self.cell.set(value).is_ok();
        if !stored {
            log::debug!("Dependency '{}' already injected, keeping the first value", self.name);
        }
        stored
    }

    pub fn get(&self) -> std::result::Result<&T, PluginError> {
        self.cell.get().ok_or(PluginError::NotInjected(self.name))
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Callback storing whatever the manager injects into this slot.
    pub fn setter(&self) -> impl Fn(T) + Send + Sync + use<T> {
        let slot = self.clone();
        move |value| {
            slot.set(value);
        }
    }
}

impl<F: Feature + ?Sized> Injected<FeatureProvider<F>> {
    /// Shortcut for `get()?.get()`.
    pub fn feature(&self) -> std::result::Result<Arc<F>, PluginError> {
        self.get()?.get()
    }
}

impl<T> Clone for Injected<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Injected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injected")
            .field("name", &self.name)
            .field("set", &self.cell.get().is_some())
            .finish()
    }
}

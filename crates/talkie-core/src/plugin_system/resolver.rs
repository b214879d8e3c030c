//! Strategies for choosing which published providers a plugin receives.
//!
//! The manager only calls a resolver once it knows candidates exist for a
//! required dependency, and only with a non-empty candidate list for optional
//! ones. Resolvers hold no state between calls.
use std::collections::HashMap;

use crate::plugin_system::error::{PluginSystemError, Result};
use crate::plugin_system::feature::{AnyProvider, FeatureKey, Record};
use crate::plugin_system::traits::Plugin;

pub trait FeatureResolver: Send + Sync {
    /// Picks the single provider a required dependency receives.
    fn resolve_required_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<AnyProvider>;

    /// Picks the provider an optional dependency receives, if any.
    fn resolve_optional_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<AnyProvider>>;

    fn resolve_required_multi(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Vec<AnyProvider>>;

    fn resolve_optional_multi(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<Vec<AnyProvider>>>;
}

/// Default resolver: one candidate is used, several are an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleFeatureResolver;

impl SimpleFeatureResolver {
    pub fn new() -> Self {
        Self
    }
}

fn ambiguous(feature: FeatureKey, caller: &dyn Plugin, records: &[Record]) -> PluginSystemError {
    PluginSystemError::AmbiguousDependency {
        feature,
        plugin: caller.name().to_string(),
        candidates: records.to_vec(),
    }
}

fn all_providers(records: &[Record]) -> Vec<AnyProvider> {
    records.iter().map(|record| record.provider().clone()).collect()
}

impl FeatureResolver for SimpleFeatureResolver {
    fn resolve_required_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<AnyProvider> {
        match records {
            [] => Err(PluginSystemError::NoCandidates {
                feature,
                plugin: caller.name().to_string(),
            }),
            [only] => Ok(only.provider().clone()),
            _ => Err(ambiguous(feature, caller, records)),
        }
    }

    fn resolve_optional_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<AnyProvider>> {
        match records {
            [] => Ok(None),
            [only] => Ok(Some(only.provider().clone())),
            _ => Err(ambiguous(feature, caller, records)),
        }
    }

    fn resolve_required_multi(
        &self,
        _feature: FeatureKey,
        _caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Vec<AnyProvider>> {
        Ok(all_providers(records))
    }

    fn resolve_optional_multi(
        &self,
        _feature: FeatureKey,
        _caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<Vec<AnyProvider>>> {
        Ok(Some(all_providers(records)))
    }
}

pub type RequiredSingleFn = Box<
    dyn Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<AnyProvider> + Send + Sync,
>;
pub type OptionalSingleFn = Box<
    dyn Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Option<AnyProvider>>
        + Send
        + Sync,
>;
pub type RequiredMultiFn = Box<
    dyn Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Vec<AnyProvider>>
        + Send
        + Sync,
>;
pub type OptionalMultiFn = Box<
    dyn Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Option<Vec<AnyProvider>>>
        + Send
        + Sync,
>;

/// Resolver with caller supplied decisions.
///
/// Each operation can be overridden with a closure that receives the fallback
/// resolver, so it can decide a few cases itself and hand the rest back.
/// Supplier preferences registered with [`prefer_supplier`](Self::prefer_supplier)
/// apply to single dependencies that have no closure.
pub struct FlexibleFeatureResolver {
    fallback: Box<dyn FeatureResolver>,
    required_single: Option<RequiredSingleFn>,
    optional_single: Option<OptionalSingleFn>,
    required_multi: Option<RequiredMultiFn>,
    optional_multi: Option<OptionalMultiFn>,
    preferred: HashMap<FeatureKey, String>,
}

impl FlexibleFeatureResolver {
    pub fn new() -> Self {
        Self::with_fallback(SimpleFeatureResolver)
    }

    pub fn with_fallback(fallback: impl FeatureResolver + 'static) -> Self {
        Self {
            fallback: Box::new(fallback),
            required_single: None,
            optional_single: None,
            required_multi: None,
            optional_multi: None,
            preferred: HashMap::new(),
        }
    }

    pub fn on_required_single<C>(mut self, resolve: C) -> Self
    where
        C: Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<AnyProvider>
            + Send
            + Sync
            + 'static,
    {
        self.required_single = Some(Box::new(resolve));
        self
    }

    pub fn on_optional_single<C>(mut self, resolve: C) -> Self
    where
        C: Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Option<AnyProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.optional_single = Some(Box::new(resolve));
        self
    }

    pub fn on_required_multi<C>(mut self, resolve: C) -> Self
    where
        C: Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Vec<AnyProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.required_multi = Some(Box::new(resolve));
        self
    }

    pub fn on_optional_multi<C>(mut self, resolve: C) -> Self
    where
        C: Fn(FeatureKey, &dyn Plugin, &[Record], &dyn FeatureResolver) -> Result<Option<Vec<AnyProvider>>>
            + Send
            + Sync
            + 'static,
    {
        self.optional_multi = Some(Box::new(resolve));
        self
    }

    /// Break ties for `feature` in favour of the plugin called `supplier`.
    pub fn prefer_supplier(mut self, feature: FeatureKey, supplier: impl Into<String>) -> Self {
        self.preferred.insert(feature, supplier.into());
        self
    }

    fn preferred_record(&self, feature: FeatureKey, records: &[Record]) -> Option<AnyProvider> {
        let supplier = self.preferred.get(&feature)?;
        records
            .iter()
            .find(|record| record.supplier_name() == supplier)
            .map(|record| record.provider().clone())
    }
}

impl Default for FlexibleFeatureResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureResolver for FlexibleFeatureResolver {
    fn resolve_required_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<AnyProvider> {
        if let Some(resolve) = &self.required_single {
            return resolve(feature, caller, records, self.fallback.as_ref());
        }
        match self.preferred_record(feature, records) {
            Some(provider) => Ok(provider),
            None => self.fallback.resolve_required_single(feature, caller, records),
        }
    }

    fn resolve_optional_single(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<AnyProvider>> {
        if let Some(resolve) = &self.optional_single {
            return resolve(feature, caller, records, self.fallback.as_ref());
        }
        match self.preferred_record(feature, records) {
            Some(provider) => Ok(Some(provider)),
            None => self.fallback.resolve_optional_single(feature, caller, records),
        }
    }

    fn resolve_required_multi(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Vec<AnyProvider>> {
        match &self.required_multi {
            Some(resolve) => resolve(feature, caller, records, self.fallback.as_ref()),
            None => self.fallback.resolve_required_multi(feature, caller, records),
        }
    }

    fn resolve_optional_multi(
        &self,
        feature: FeatureKey,
        caller: &dyn Plugin,
        records: &[Record],
    ) -> Result<Option<Vec<AnyProvider>>> {
        match &self.optional_multi {
            Some(resolve) => resolve(feature, caller, records, self.fallback.as_ref()),
            None => self.fallback.resolve_optional_multi(feature, caller, records),
        }
    }
}

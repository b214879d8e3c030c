//! # Talkie Core Plugin System
//!
//! Wires statically registered plugins together and brings them up in a
//! dependency-respecting order.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`feature`]**: The capability model. Plugins publish [`Feature`]s through
//!   lazy [`FeatureProvider`]s wrapped in [`FeatureWrapper`]s.
//! - **[`dependency`]**: What a plugin needs ([`Dependency`]), declared with a
//!   builder, plus the [`Injected`] slot plugins keep injected providers in.
//! - **[`traits`]**: The [`Plugin`] lifecycle trait and [`PluginError`].
//! - **[`resolver`]**: Strategies choosing providers when several plugins publish
//!   the same feature ([`SimpleFeatureResolver`], [`FlexibleFeatureResolver`]).
//! - **[`registry`]**: Registered plugins and the per-run feature registry.
//! - **[`manager`]**: The [`PluginManager`] orchestrating collection, resolution,
//!   multi-pass initialization and post-initialization.
//! - **[`report`]**: Per-plugin failures attached to initialization errors.
//! - **[`executor`]**: Where background post-initialization runs and where its
//!   failures are reported.
//! - **[`wiring`]**: Dry-run resolution for diagnostics.
//! - **[`error`]**: [`PluginSystemError`], the failures `configure` can raise.
pub mod dependency;
pub mod error;
pub mod executor;
pub mod feature;
pub mod manager;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod traits;
pub mod wiring;

pub use dependency::{Dependency, DependencyBuilder, Injected};
pub use error::PluginSystemError;
pub use executor::{ErrorSink, LogErrorSink, PostInitExecutor, PostInitHandle, ThreadExecutor, TokioExecutor};
pub use feature::{AnyProvider, Feature, FeatureKey, FeatureProvider, FeatureSlot, FeatureWrapper, Record};
pub use manager::{ManagerSettings, PluginManager};
pub use report::{InitFailure, InitializationReport};
pub use resolver::{FeatureResolver, FlexibleFeatureResolver, SimpleFeatureResolver};
pub use traits::{Plugin, PluginError};
pub use wiring::{Outcome, Requirement, WiringEntry, WiringPlan};

// Test module declaration
#[cfg(test)]
mod tests;

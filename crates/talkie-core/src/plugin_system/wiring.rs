//! Dry run of dependency resolution.
//!
//! A [`WiringPlan`] reports how every declared dependency would be resolved
//! without injecting anything, attaching contexts or initializing plugins.
use std::fmt;
use std::sync::Arc;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::feature::{AnyProvider, FeatureKey, Record};
use crate::plugin_system::registry::FeatureRegistry;
use crate::plugin_system::resolver::FeatureResolver;
use crate::plugin_system::traits::Plugin;

/// Which group of a [`Dependency`](crate::plugin_system::Dependency) an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    RequiredSingle,
    OptionalSingle,
    RequiredSet,
    OptionalSet,
}

impl Requirement {
    pub fn is_required(&self) -> bool {
        matches!(self, Requirement::RequiredSingle | Requirement::RequiredSet)
    }

    fn label(&self) -> &'static str {
        match self {
            Requirement::RequiredSingle => "requires",
            Requirement::OptionalSingle => "optionally uses",
            Requirement::RequiredSet => "requires all of",
            Requirement::OptionalSet => "optionally uses all of",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The callback would receive providers from these suppliers.
    Resolved { suppliers: Vec<String> },
    /// Required, but nobody publishes the feature.
    Missing,
    /// Several suppliers and the resolver refused to choose.
    Ambiguous { candidates: Vec<String> },
    /// Optional and nothing selected; the callback would not run.
    Skipped,
    /// The resolver failed for another reason.
    Failed { reason: String },
}

impl Outcome {
    /// True when `configure` would stop on this entry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Outcome::Missing | Outcome::Ambiguous { .. } | Outcome::Failed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Resolved { suppliers } => write!(f, "resolved by [{}]", suppliers.join(", ")),
            Outcome::Missing => f.write_str("MISSING"),
            Outcome::Ambiguous { candidates } => write!(f, "AMBIGUOUS between [{}]", candidates.join(", ")),
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::Failed { reason } => write!(f, "FAILED: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WiringEntry {
    pub plugin: String,
    pub feature: FeatureKey,
    pub requirement: Requirement,
    pub outcome: Outcome,
}

/// Resolution outcome of every declared dependency, in registration then
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiringPlan {
    entries: Vec<WiringEntry>,
}

impl WiringPlan {
    pub(crate) fn evaluate(
        plugins: &[Arc<dyn Plugin>],
        registry: &FeatureRegistry,
        resolver: &dyn FeatureResolver,
    ) -> Self {
        let mut entries = Vec::new();
        for plugin in plugins {
            let caller = plugin.as_ref();
            let dependency = caller.dependency();
            let mut push = |feature: FeatureKey, requirement: Requirement, outcome: Outcome| {
                entries.push(WiringEntry {
                    plugin: caller.name().to_string(),
                    feature,
                    requirement,
                    outcome,
                });
            };

            for entry in dependency.required() {
                let records = registry.records_for(entry.key());
                let outcome = if records.is_empty() {
                    Outcome::Missing
                } else {
                    outcome_of(
                        resolver
                            .resolve_required_single(entry.key(), caller, records)
                            .map(|provider| vec![provider]),
                        records,
                        Outcome::Missing,
                    )
                };
                push(entry.key(), Requirement::RequiredSingle, outcome);
            }

            for entry in dependency.optional() {
                let records = registry.records_for(entry.key());
                let outcome = if records.is_empty() {
                    Outcome::Skipped
                } else {
                    outcome_of(
                        resolver
                            .resolve_optional_single(entry.key(), caller, records)
                            .map(|selection| selection.into_iter().collect()),
                        records,
                        Outcome::Skipped,
                    )
                };
                push(entry.key(), Requirement::OptionalSingle, outcome);
            }

            for entry in dependency.required_sets() {
                let records = registry.records_for(entry.key());
                let outcome = if records.is_empty() {
                    Outcome::Missing
                } else {
                    outcome_of(
                        resolver.resolve_required_multi(entry.key(), caller, records),
                        records,
                        Outcome::Missing,
                    )
                };
                push(entry.key(), Requirement::RequiredSet, outcome);
            }

            for entry in dependency.optional_sets() {
                let records = registry.records_for(entry.key());
                let outcome = if records.is_empty() {
                    Outcome::Skipped
                } else {
                    outcome_of(
                        resolver
                            .resolve_optional_multi(entry.key(), caller, records)
                            .map(Option::unwrap_or_default),
                        records,
                        Outcome::Skipped,
                    )
                };
                push(entry.key(), Requirement::OptionalSet, outcome);
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[WiringEntry] {
        &self.entries
    }

    /// Entries declared by one plugin.
    pub fn entries_for<'a>(&'a self, plugin: &'a str) -> impl Iterator<Item = &'a WiringEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.plugin == plugin)
    }

    /// Entries that would make `configure` fail during resolution.
    pub fn problems(&self) -> impl Iterator<Item = &WiringEntry> {
        self.entries.iter().filter(|entry| entry.outcome.is_fatal())
    }

    pub fn is_satisfiable(&self) -> bool {
        self.problems().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for WiringPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("No dependencies declared");
        }
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{} {} '{}': {}",
                entry.plugin,
                entry.requirement.label(),
                entry.feature,
                entry.outcome
            )?;
        }
        Ok(())
    }
}

/// Maps a resolver answer to an outcome. An empty selection becomes `empty`.
fn outcome_of(
    selection: Result<Vec<AnyProvider>, PluginSystemError>,
    records: &[Record],
    empty: Outcome,
) -> Outcome {
    match selection {
        Ok(providers) if providers.is_empty() => empty,
        Ok(providers) => Outcome::Resolved {
            suppliers: providers.iter().map(|provider| supplier_of(provider, records)).collect(),
        },
        Err(PluginSystemError::AmbiguousDependency { candidates, .. }) => Outcome::Ambiguous {
            candidates: candidates.iter().map(|record| record.supplier_name().to_string()).collect(),
        },
        Err(error) => Outcome::Failed { reason: error.to_string() },
    }
}

fn supplier_of(provider: &AnyProvider, records: &[Record]) -> String {
    records
        .iter()
        .find(|record| record.provider().ptr_eq(provider))
        .map(|record| record.supplier_name().to_string())
        .unwrap_or_else(|| String::from("<resolver>"))
}

//! Diagnostics collected by the initialization retry loop.
use std::error::Error as StdError;
use std::fmt;

use crate::plugin_system::traits::PluginError;

/// Last failure of one plugin during an initialization pass.
#[derive(Debug)]
pub struct InitFailure {
    pub plugin: String,
    pub pass: usize,
    pub error: PluginError,
}

impl InitFailure {
    /// The error followed by its chain of sources, outermost first.
    pub fn trace(&self) -> Vec<String> {
        let mut lines = vec![self.error.to_string()];
        let mut source = self.error.source();
        while let Some(cause) = source {
            lines.push(cause.to_string());
            source = cause.source();
        }
        lines
    }
}

/// Every plugin still pending at the end of a pass, with its last error.
#[derive(Debug, Default)]
pub struct InitializationReport {
    failures: Vec<InitFailure>,
}

impl InitializationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, plugin: impl Into<String>, pass: usize, error: PluginError) {
        self.failures.push(InitFailure {
            plugin: plugin.into(),
            pass,
            error,
        });
    }

    pub fn clear(&mut self) {
        self.failures.clear();
    }

    pub fn failures(&self) -> &[InitFailure] {
        &self.failures
    }

    pub fn plugins(&self) -> Vec<&str> {
        self.failures.iter().map(|failure| failure.plugin.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for InitializationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, failure) in self.failures.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "  - Plugin '{}' (pass {}):", failure.plugin, failure.pass)?;
            for (depth, line) in failure.trace().iter().enumerate() {
                if depth == 0 {
                    write!(f, " {}", line)?;
                } else {
                    write!(f, "\n      caused by: {}", line)?;
                }
            }
        }
        Ok(())
    }
}

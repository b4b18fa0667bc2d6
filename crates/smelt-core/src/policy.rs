//! Strict/lenient error policy
//!
//! Source-level failures (bad cmdline tokens, unparseable files, failed
//! fetches) are collected as diagnostics and handed to the policy in one
//! batch. Strict mode turns any diagnostic into a terminal error before
//! stage execution begins; lenient mode logs and continues with whatever
//! parsed cleanly.

use crate::error::{Error, Result};
use crate::fragment::ParseDiagnostic;
use tracing::{debug, info};

/// Log detail level carried explicitly through the run, instead of being
/// read back from global subscriber state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Normal,
    Debug,
}

/// Decision function for source-level failures.
#[derive(Debug, Clone, Copy)]
pub struct ErrorPolicy {
    strict: bool,
    verbosity: Verbosity,
}

impl ErrorPolicy {
    pub fn new(strict: bool, verbosity: Verbosity) -> Self {
        Self { strict, verbosity }
    }

    /// Abort the run on any source-level failure
    pub fn strict(verbosity: Verbosity) -> Self {
        Self::new(true, verbosity)
    }

    /// Skip failed sources and continue with the rest
    pub fn lenient(verbosity: Verbosity) -> Self {
        Self::new(false, verbosity)
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Decide what the collected diagnostics mean for the run.
    ///
    /// Strict policy rejects if any diagnostic exists. Lenient policy logs
    /// exactly one of: the full diagnostics at debug verbosity, or a single
    /// suppression summary at normal verbosity, never both.
    pub fn evaluate(&self, diagnostics: &[ParseDiagnostic]) -> Result<()> {
        if diagnostics.is_empty() {
            return Ok(());
        }

        if self.strict {
            return Err(Error::strict_policy(diagnostics.len()));
        }

        match self.verbosity {
            Verbosity::Debug => {
                for diagnostic in diagnostics {
                    debug!("parsing returned errors: {}", diagnostic);
                }
            }
            Verbosity::Normal => {
                info!(
                    "Some errors found but were ignored. Enable strict mode to fail on those, \
                     or verbose logging to see them"
                );
            }
        }

        Ok(())
    }
}

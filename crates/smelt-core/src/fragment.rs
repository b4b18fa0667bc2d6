//! Configuration fragments and their provenance
//!
//! A fragment is one source's parsed contribution to the overall
//! configuration tree: the kernel command line, a file discovered in an
//! extra search directory, a fetched setup source, or the base
//! configuration. Fragments are produced atomically: a source that fails
//! to parse contributes nothing.

use camino::Utf8PathBuf;
use serde_yaml_ng::Value;

/// Where a configuration fragment came from.
///
/// Ordering of application is decided by the merger, not by this label;
/// the label exists for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// The base configuration tree supplied by the caller
    Base,
    /// A file discovered in a caller-supplied extra directory
    ExtraPath(Utf8PathBuf),
    /// A source designated by a `cos.setup=<uri>` boot argument
    Setup(String),
    /// Inline assignments on the kernel command line
    Cmdline,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Base => write!(f, "base"),
            Provenance::ExtraPath(path) => write!(f, "extra-path:{}", path),
            Provenance::Setup(uri) => write!(f, "setup:{}", uri),
            Provenance::Cmdline => write!(f, "cmdline"),
        }
    }
}

/// One source's parsed contribution to the configuration tree
#[derive(Debug, Clone)]
pub struct ConfigFragment {
    /// Source label for logging and diagnostics
    pub provenance: Provenance,
    /// The parsed tree (scalar | sequence | mapping)
    pub tree: Value,
}

impl ConfigFragment {
    /// Create a fragment from a parsed tree
    pub fn new(provenance: Provenance, tree: Value) -> Self {
        Self { provenance, tree }
    }

    /// An empty fragment contributes nothing to the merge
    pub fn is_empty(&self) -> bool {
        match &self.tree {
            Value::Null => true,
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// A recoverable, source-local malformation.
///
/// Diagnostics are collected, never raised mid-scan; the error policy
/// decides later whether their presence aborts the run.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    /// Which source produced the malformation
    pub provenance: Provenance,
    /// Human-readable description of what was wrong
    pub detail: String,
}

impl ParseDiagnostic {
    pub fn new(provenance: Provenance, detail: impl Into<String>) -> Self {
        Self {
            provenance,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provenance, self.detail)
    }
}

/// Parse one configuration source into a fragment tree.
///
/// The root must be a mapping, or the source empty; anything else cannot
/// merge into the configuration tree and is rejected with a description
/// suitable for a diagnostic.
pub fn parse_tree(content: &str) -> std::result::Result<Value, String> {
    let tree: Value =
        serde_yaml_ng::from_str(content).map_err(|e| format!("failed to parse: {}", e))?;

    match tree {
        Value::Null => Ok(Value::Mapping(Default::default())),
        Value::Mapping(_) => Ok(tree),
        other => Err(format!(
            "root of configuration source must be a mapping, got {}",
            value_kind(&other)
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

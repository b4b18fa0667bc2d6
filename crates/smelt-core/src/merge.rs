//! Deep configuration merging with fixed precedence
//!
//! Merging is a deep structural union over YAML values: mapping keys from a
//! higher-precedence fragment win, sequences are merged element-wise so an
//! index-addressed assignment overwrites only the index it names, and
//! scalars replace outright. Fragments are applied in ascending precedence
//! order; the caller is responsible for that ordering
//! (base < extra-paths < setup sources < cmdline).

use crate::error::Result;
use crate::fragment::{ConfigFragment, ParseDiagnostic};
use crate::policy::ErrorPolicy;
use serde_yaml_ng::Value;
use tracing::debug;

/// One step of a dotted configuration path: a mapping key or sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Key(String),
    Index(usize),
}

/// Merge `overlay` into `dest`, with `overlay` taking precedence.
///
/// Sequence elements merge index-wise; a `Null` overlay element is padding
/// left by an index-addressed assignment and leaves the destination element
/// untouched. Destination elements beyond the overlay's length are kept.
pub fn deep_merge(dest: &mut Value, overlay: Value) {
    match (dest, overlay) {
        (Value::Mapping(dest_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = dest_map.get_mut(&key) {
                    deep_merge(existing, value);
                } else {
                    dest_map.insert(key, value);
                }
            }
        }
        (Value::Sequence(dest_seq), Value::Sequence(overlay_seq)) => {
            for (i, value) in overlay_seq.into_iter().enumerate() {
                if i < dest_seq.len() {
                    if value.is_null() {
                        continue;
                    }
                    deep_merge(&mut dest_seq[i], value);
                } else {
                    dest_seq.push(value);
                }
            }
        }
        (dest_value, overlay_value) => *dest_value = overlay_value,
    }
}

/// Set `value` at the nested `path` inside `root`, creating intermediate
/// mappings and sequence slots as needed. A sequence is padded with `Null`
/// up to an addressed index so other indices are not disturbed.
pub fn set_path(root: &mut Value, path: &[PathSeg], value: Value) {
    match path.split_first() {
        None => *root = value,
        Some((PathSeg::Key(key), rest)) => {
            if !matches!(root, Value::Mapping(_)) {
                *root = Value::Mapping(Default::default());
            }
            if let Value::Mapping(map) = root {
                let slot = map
                    .entry(Value::String(key.clone()))
                    .or_insert(Value::Null);
                set_path(slot, rest, value);
            }
        }
        Some((PathSeg::Index(index), rest)) => {
            if !matches!(root, Value::Sequence(_)) {
                *root = Value::Sequence(Vec::new());
            }
            if let Value::Sequence(seq) = root {
                while seq.len() <= *index {
                    seq.push(Value::Null);
                }
                set_path(&mut seq[*index], rest, value);
            }
        }
    }
}

/// The effective configuration tree for one stage run.
///
/// Built once per run and read-only afterwards; only accessors are exposed.
#[derive(Debug)]
pub struct MergedConfig {
    tree: Value,
}

static NULL: Value = Value::Null;

impl MergedConfig {
    /// The full merged tree
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// The step list for one hook phase (`stages.<phase>`), or `Null` if
    /// the configuration defines nothing for it.
    pub fn stage_steps(&self, phase: &str) -> &Value {
        self.tree
            .get("stages")
            .and_then(|stages| stages.get(phase))
            .unwrap_or(&NULL)
    }
}

/// What the merge decided about the diagnostics it was handed.
#[derive(Debug)]
pub struct MergeReport {
    /// Every diagnostic collected from the sources, in collection order
    pub diagnostics: Vec<ParseDiagnostic>,
    /// True when lenient policy swallowed at least one diagnostic
    pub suppressed: bool,
}

/// Merge fragments into one effective configuration tree.
///
/// `fragments` must already be in ascending precedence order. The policy is
/// evaluated first: under strict policy any diagnostic aborts the merge
/// before a single fragment is applied.
pub fn merge(
    base: Option<Value>,
    fragments: Vec<ConfigFragment>,
    diagnostics: Vec<ParseDiagnostic>,
    policy: &ErrorPolicy,
) -> Result<(MergedConfig, MergeReport)> {
    policy.evaluate(&diagnostics)?;

    let mut tree = match base {
        Some(value) if !value.is_null() => value,
        _ => Value::Mapping(Default::default()),
    };

    for fragment in fragments {
        if fragment.is_empty() {
            debug!("Nothing to merge from {}", fragment.provenance);
            continue;
        }
        debug!("Merging configuration from {}", fragment.provenance);
        deep_merge(&mut tree, fragment.tree);
    }

    let suppressed = !policy.is_strict() && !diagnostics.is_empty();
    Ok((
        MergedConfig { tree },
        MergeReport {
            diagnostics,
            suppressed,
        },
    ))
}

//! Kernel command line parsing
//!
//! The boot command line is a single space-separated string read once per
//! stage run. Two token forms are recognized:
//!
//! - `stages.<name>[<index>].<dotted.path>=<value>`: an inline assignment
//!   into the stage namespace
//! - `cos.setup=<uri>`: a pointer to an additional configuration source
//!   to fetch and merge
//!
//! Everything else is an unrelated kernel argument and is ignored without
//! error. Tokens that claim a recognized form but fail structural parsing
//! produce a diagnostic and do not stop tokenization of the rest.

use crate::fragment::{ConfigFragment, ParseDiagnostic, Provenance};
use crate::merge::{set_path, PathSeg};
use serde_yaml_ng::Value;
use tracing::debug;

/// Boot argument designating an additional configuration source
pub const SETUP_KEY: &str = "cos.setup";

/// Namespace root for inline stage assignments
const STAGES_KEY: &str = "stages";

/// Result of parsing one raw command line.
#[derive(Debug)]
pub struct CmdlineParse {
    /// Fragment built from the inline stage assignments
    pub fragment: ConfigFragment,
    /// URIs named by `cos.setup` arguments, in appearance order
    pub setup_uris: Vec<String>,
    /// Malformations found in recognized tokens
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl CmdlineParse {
    /// True when at least one recognized token failed to parse
    pub fn had_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Parse a raw kernel command line into a configuration fragment.
pub fn parse(raw: &str) -> CmdlineParse {
    let mut root = Value::Mapping(Default::default());
    let mut setup_uris = Vec::new();
    let mut diagnostics = Vec::new();

    for token in tokenize(raw) {
        if let Some(rest) = token.strip_prefix(SETUP_KEY) {
            if let Some(value) = rest.strip_prefix('=') {
                let (uri, _) = strip_quotes(value);
                if uri.is_empty() {
                    diagnostics.push(ParseDiagnostic::new(
                        Provenance::Cmdline,
                        format!("empty URI in `{}`", token),
                    ));
                } else {
                    setup_uris.push(uri.to_string());
                }
                continue;
            }
            if rest.is_empty() {
                diagnostics.push(ParseDiagnostic::new(
                    Provenance::Cmdline,
                    format!("`{}` is missing a URI", SETUP_KEY),
                ));
                continue;
            }
            // e.g. `cos.setupfoo=...`, some other argument entirely
        }

        if is_stage_token(&token) {
            match parse_assignment(&token) {
                Ok((path, value)) => set_path(&mut root, &path, value),
                Err(detail) => {
                    diagnostics.push(ParseDiagnostic::new(Provenance::Cmdline, detail))
                }
            }
            continue;
        }

        debug!("Ignoring unrelated kernel argument `{}`", token);
    }

    CmdlineParse {
        fragment: ConfigFragment::new(Provenance::Cmdline, root),
        setup_uris,
        diagnostics,
    }
}

/// Split on whitespace, keeping quoted substrings (single or double) as
/// part of one token even when they contain spaces.
fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Does this token claim the stage namespace?
fn is_stage_token(token: &str) -> bool {
    token
        .strip_prefix(STAGES_KEY)
        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

fn parse_assignment(token: &str) -> std::result::Result<(Vec<PathSeg>, Value), String> {
    let (lhs, rhs) = token
        .split_once('=')
        .ok_or_else(|| format!("missing `=` in stage assignment `{}`", token))?;

    let path = parse_path(lhs)?;

    // The stage namespace is a mapping of stage names; an assignment must
    // address a named stage before any index.
    if !matches!(path.get(1), Some(PathSeg::Key(_))) {
        return Err(format!(
            "stage assignment `{}` does not address a named stage",
            lhs
        ));
    }

    let value = parse_scalar(rhs)?;
    Ok((path, value))
}

fn parse_path(lhs: &str) -> std::result::Result<Vec<PathSeg>, String> {
    let mut segments = Vec::new();
    for part in lhs.split('.') {
        if part.is_empty() {
            return Err(format!("empty path segment in `{}`", lhs));
        }
        parse_part(part, &mut segments)?;
    }
    Ok(segments)
}

/// Parse one dot-separated part: a key optionally followed by one or more
/// `[<index>]` groups.
fn parse_part(part: &str, segments: &mut Vec<PathSeg>) -> std::result::Result<(), String> {
    let (name, mut rest) = match part.find('[') {
        Some(pos) => part.split_at(pos),
        None => (part, ""),
    };

    if !name.is_empty() {
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("illegal characters in key `{}`", name));
        }
        segments.push(PathSeg::Key(name.to_string()));
    }

    while !rest.is_empty() {
        let Some(end) = rest.find(']') else {
            return Err(format!("unbalanced bracket in `{}`", part));
        };
        let raw_index = &rest[1..end];
        let index: usize = raw_index
            .parse()
            .map_err(|_| format!("invalid sequence index `{}` in `{}`", raw_index, part))?;
        segments.push(PathSeg::Index(index));
        rest = &rest[end + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(format!("unexpected characters after `]` in `{}`", part));
        }
    }

    Ok(())
}

/// Interpret the right-hand side of an assignment as a scalar.
fn parse_scalar(rhs: &str) -> std::result::Result<Value, String> {
    let (inner, quoted) = strip_quotes(rhs);
    if quoted {
        return Ok(Value::String(inner.to_string()));
    }

    let value: Value = serde_yaml_ng::from_str(inner)
        .map_err(|e| format!("invalid value `{}`: {}", inner, e))?;
    match value {
        Value::Mapping(_) | Value::Sequence(_) => Err(format!(
            "non-scalar value `{}` in stage assignment",
            inner
        )),
        scalar => Ok(scalar),
    }
}

/// Strip one matching pair of surrounding quotes, reporting whether the
/// value was quoted.
fn strip_quotes(s: &str) -> (&str, bool) {
    let s = s.trim();
    let bytes = s.as_bytes();
    if s.len() >= 2
        && ((bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[s.len() - 1] == b'"'))
    {
        (&s[1..s.len() - 1], true)
    } else {
        (s, false)
    }
}

//! Extra-directory configuration discovery
//!
//! Each caller-supplied directory is enumerated non-recursively, in the
//! order the directories were given; files within a directory are taken in
//! lexicographic filename order so discovery is deterministic. Every
//! parseable file yields one fragment; a file that fails to parse is
//! recorded as a diagnostic and skipped; the strict/lenient decision about
//! the aggregate is the merger's, not the scanner's.

use crate::fragment::{parse_tree, ConfigFragment, ParseDiagnostic, Provenance};
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::Value;
use std::fs;
use tracing::{debug, info};

/// Fragments and diagnostics produced by one scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub fragments: Vec<ConfigFragment>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Discover configuration files in the given directories.
pub fn scan(dirs: &[Utf8PathBuf]) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for dir in dirs {
        if !dir.is_dir() {
            debug!("Skipping missing configuration directory {}", dir);
            continue;
        }

        let entries = match dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(e) => {
                outcome.diagnostics.push(ParseDiagnostic::new(
                    Provenance::ExtraPath(dir.clone()),
                    format!("failed to read directory: {}", e),
                ));
                continue;
            }
        };

        let mut files: Vec<Utf8PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        files.sort();

        for path in files {
            match parse_file(&path) {
                Ok(tree) => {
                    info!("Executing {}", path);
                    outcome
                        .fragments
                        .push(ConfigFragment::new(Provenance::ExtraPath(path), tree));
                }
                Err(detail) => {
                    debug!("Skipping {}: {}", path, detail);
                    outcome
                        .diagnostics
                        .push(ParseDiagnostic::new(Provenance::ExtraPath(path), detail));
                }
            }
        }
    }

    outcome
}

fn parse_file(path: &Utf8Path) -> std::result::Result<Value, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("failed to read file: {}", e))?;
    parse_tree(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid UTF-8 path")
    }

    fn write(dir: &Utf8Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_scan_lexicographic_order() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);
        write(&dir, "20-second.yaml", "b: 2");
        write(&dir, "10-first.yaml", "a: 1");

        let outcome = scan(&[dir.clone()]);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.fragments.len(), 2);
        assert_eq!(
            outcome.fragments[0].provenance,
            Provenance::ExtraPath(dir.join("10-first.yaml"))
        );
        assert_eq!(
            outcome.fragments[1].provenance,
            Provenance::ExtraPath(dir.join("20-second.yaml"))
        );
    }

    #[test]
    fn test_scan_directory_argument_order() {
        let temp_a = TempDir::new().unwrap();
        let temp_b = TempDir::new().unwrap();
        let dir_a = utf8(&temp_a);
        let dir_b = utf8(&temp_b);
        write(&dir_a, "zz.yaml", "a: 1");
        write(&dir_b, "aa.yaml", "b: 2");

        // Directory order wins over filename order across directories
        let outcome = scan(&[dir_a.clone(), dir_b.clone()]);
        assert_eq!(
            outcome.fragments[0].provenance,
            Provenance::ExtraPath(dir_a.join("zz.yaml"))
        );
        assert_eq!(
            outcome.fragments[1].provenance,
            Provenance::ExtraPath(dir_b.join("aa.yaml"))
        );
    }

    #[test]
    fn test_scan_skips_bad_file_and_continues() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);
        write(&dir, "10-bad.yaml", "stages: [unclosed");
        write(&dir, "20-good.yaml", "key: value");

        let outcome = scan(&[dir]);
        assert_eq!(outcome.fragments.len(), 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].detail.contains("failed to parse"));
    }

    #[test]
    fn test_scan_rejects_non_mapping_root() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);
        write(&dir, "list.yaml", "- not\n- a\n- mapping");

        let outcome = scan(&[dir]);
        assert!(outcome.fragments.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].detail.contains("must be a mapping"));
    }

    #[test]
    fn test_scan_empty_file_yields_empty_fragment() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);
        write(&dir, "extra.yaml", "");

        let outcome = scan(&[dir]);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(outcome.fragments.len(), 1);
        assert!(outcome.fragments[0].is_empty());
    }

    #[test]
    fn test_scan_missing_directory_is_silent() {
        let outcome = scan(&[Utf8PathBuf::from("/nonexistent/smelt-test-dir")]);
        assert!(outcome.fragments.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }
}

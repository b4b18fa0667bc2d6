//! Stage run orchestration
//!
//! `run_stage` is the composed operation: read the boot command line, scan
//! the extra directories, fetch any setup sources the command line names,
//! merge everything under the active policy, then drive the executor
//! through the stage's three phases. Fragments apply in ascending
//! precedence: base < extra-paths (scan order) < setup sources < cmdline.

use crate::engine::StageEngine;
use crate::executor::{StageExecutor, StageResult};
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::Value;
use smelt_core::fragment::parse_tree;
use smelt_core::{
    cmdline, merge, scanner, ConfigFragment, ErrorPolicy, ParseDiagnostic, Provenance,
    SourceFetcher, SourceReference,
};
use thiserror::Error;
use tracing::{debug, info};

/// Collaborators and settings for one stage run.
///
/// The merged configuration built from this context is owned by the run
/// and discarded when it completes.
pub struct StageContext {
    cmdline_path: Utf8PathBuf,
    extra_dirs: Vec<Utf8PathBuf>,
    base: Option<Value>,
    policy: ErrorPolicy,
    fetcher: SourceFetcher,
}

impl StageContext {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            cmdline_path: Utf8PathBuf::from("/proc/cmdline"),
            extra_dirs: Vec::new(),
            base: None,
            policy,
            fetcher: SourceFetcher::new(),
        }
    }

    /// Override the boot command line pseudo-file
    pub fn with_cmdline_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.cmdline_path = path.into();
        self
    }

    /// Extra directories to scan, processed in the order given
    pub fn with_extra_dirs(mut self, dirs: Vec<Utf8PathBuf>) -> Self {
        self.extra_dirs = dirs;
        self
    }

    /// Base configuration tree (lowest precedence)
    pub fn with_base(mut self, base: Value) -> Self {
        self.base = Some(base);
        self
    }

    pub fn policy(&self) -> &ErrorPolicy {
        &self.policy
    }

    pub fn fetcher(&self) -> &SourceFetcher {
        &self.fetcher
    }
}

/// Error from one stage run.
#[derive(Error, Debug)]
pub enum StageError {
    /// The merge was rejected (strict policy) or configuration failed
    #[error(transparent)]
    Config(#[from] smelt_core::Error),

    /// The engine reported a phase could not proceed
    #[error("stage `{stage}` failed in phase `{phase}`")]
    Fatal { stage: String, phase: String },
}

/// Run one named stage.
///
/// Returns an error only when the merge failed under strict policy or the
/// executor reached `Failed`; source-level problems under lenient policy
/// are logged per the policy's verbosity and the run proceeds with the
/// data that parsed cleanly.
pub async fn run_stage(
    ctx: &StageContext,
    engine: &dyn StageEngine,
    stage: &str,
) -> Result<StageResult, StageError> {
    info!("Running stage `{}`", stage);

    let raw_cmdline = read_cmdline(&ctx.cmdline_path);
    let parsed = cmdline::parse(&raw_cmdline);
    let mut diagnostics = parsed.diagnostics;

    let scan = scanner::scan(&ctx.extra_dirs);
    let mut fragments = scan.fragments;
    diagnostics.extend(scan.diagnostics);

    for uri in &parsed.setup_uris {
        match fetch_setup(&ctx.fetcher, uri).await {
            Ok(fragment) => {
                info!("Executing {}", uri);
                fragments.push(fragment);
            }
            Err(detail) => {
                debug!("Skipping setup source {}: {}", uri, detail);
                diagnostics.push(ParseDiagnostic::new(Provenance::Setup(uri.clone()), detail));
            }
        }
    }

    // Cmdline assignments always apply last
    fragments.push(parsed.fragment);

    let (merged, _report) = merge(ctx.base.clone(), fragments, diagnostics, &ctx.policy)?;

    let mut executor = StageExecutor::new(engine);
    let result = executor.run(stage, &merged).await;
    if result.fatal {
        let phase = result
            .hooks
            .last()
            .map(|hook| hook.hook.clone())
            .unwrap_or_default();
        return Err(StageError::Fatal {
            stage: stage.to_string(),
            phase,
        });
    }

    Ok(result)
}

/// Read the boot command line. A missing pseudo-file is an empty command
/// line, not a source failure.
fn read_cmdline(path: &Utf8Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("Could not read {}: {}", path, e);
            String::new()
        }
    }
}

async fn fetch_setup(
    fetcher: &SourceFetcher,
    uri: &str,
) -> std::result::Result<ConfigFragment, String> {
    let reference = SourceReference::parse(uri);
    let bytes = fetcher
        .fetch(&reference)
        .await
        .map_err(|e| e.to_string())?;
    let content =
        String::from_utf8(bytes).map_err(|_| "source is not valid UTF-8".to_string())?;
    let tree = parse_tree(&content)?;
    Ok(ConfigFragment::new(Provenance::Setup(uri.to_string()), tree))
}

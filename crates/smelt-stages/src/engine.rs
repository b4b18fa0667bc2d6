//! Stage-execution engine boundary
//!
//! The engine is the collaborator that interprets one hook phase's
//! configuration subtree. The executor treats it as opaque: it hands over a
//! phase identifier and the step list, and gets back per-action outcomes or
//! an engine-fatal error. `ShellEngine` is the shipped implementation;
//! tests substitute recording mocks.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde_yaml_ng::Value;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Outcome of one action executed inside a phase.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// What was attempted
    pub action: String,
    /// Failure detail when the action did not succeed
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            error: None,
        }
    }

    pub fn failed(action: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            error: Some(error.into()),
        }
    }
}

/// The phase itself could not proceed.
///
/// Distinct from an individual action failing: an action failure is
/// recorded and the phase continues, an engine-fatal error stops the stage.
#[derive(Error, Debug)]
#[error("engine failure in phase `{phase}`: {reason}")]
pub struct EngineFatal {
    pub phase: String,
    pub reason: String,
}

/// External stage-execution engine contract.
#[async_trait]
pub trait StageEngine: Send + Sync {
    /// Execute one phase's step list, returning per-action outcomes.
    async fn apply(&self, phase: &str, steps: &Value) -> Result<Vec<ActionResult>, EngineFatal>;
}

/// Engine that interprets steps as shell commands and file writes.
///
/// Each step is a mapping with any of: `name` (logged), `commands` (a
/// sequence of shell command strings run via `sh -c`), `files` (a sequence
/// of mappings with `path`, `content`, and optional octal-string
/// `permissions`).
pub struct ShellEngine {
    work_dir: Utf8PathBuf,
}

impl ShellEngine {
    pub fn new(work_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    async fn run_command(&self, command: &str) -> ActionResult {
        let action = format!("command `{}`", command);
        info!("running command `{}`", command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.work_dir)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if !stdout.trim().is_empty() {
                    debug!("command output: {}", stdout.trim());
                }
                ActionResult::ok(action)
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!("command `{}` failed: {}", command, stderr.trim());
                ActionResult::failed(
                    action,
                    format!("{}: {}", output.status, stderr.trim()),
                )
            }
            Err(e) => {
                warn!("could not spawn `{}`: {}", command, e);
                ActionResult::failed(action, e.to_string())
            }
        }
    }

    async fn write_file(&self, entry: &Value) -> ActionResult {
        let Some(path) = entry.get("path").and_then(Value::as_str) else {
            return ActionResult::failed("file write", "file entry is missing `path`");
        };
        let action = format!("write {}", path);

        let destination = if path.starts_with('/') {
            Utf8PathBuf::from(path)
        } else {
            self.work_dir.join(path)
        };

        let content = entry.get("content").and_then(Value::as_str).unwrap_or("");

        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("could not create {}: {}", parent, e);
                return ActionResult::failed(action, e.to_string());
            }
        }
        if let Err(e) = tokio::fs::write(&destination, content).await {
            warn!("could not write {}: {}", destination, e);
            return ActionResult::failed(action, e.to_string());
        }

        // Permissions are octal strings, e.g. "0600"
        #[cfg(unix)]
        if let Some(mode) = entry.get("permissions").and_then(Value::as_str) {
            use std::os::unix::fs::PermissionsExt;
            match u32::from_str_radix(mode.trim_start_matches("0o"), 8) {
                Ok(mode) => {
                    let perms = std::fs::Permissions::from_mode(mode);
                    if let Err(e) = tokio::fs::set_permissions(&destination, perms).await {
                        return ActionResult::failed(action, e.to_string());
                    }
                }
                Err(_) => {
                    return ActionResult::failed(
                        action,
                        format!("invalid permissions `{}`", mode),
                    );
                }
            }
        }

        debug!("wrote {}", destination);
        ActionResult::ok(action)
    }
}

#[async_trait]
impl StageEngine for ShellEngine {
    async fn apply(&self, phase: &str, steps: &Value) -> Result<Vec<ActionResult>, EngineFatal> {
        let steps = match steps {
            Value::Null => return Ok(Vec::new()),
            Value::Sequence(seq) => seq,
            _ => {
                return Err(EngineFatal {
                    phase: phase.to_string(),
                    reason: "phase configuration is not a step list".to_string(),
                })
            }
        };

        if !self.work_dir.is_dir() {
            return Err(EngineFatal {
                phase: phase.to_string(),
                reason: format!("working directory {} does not exist", self.work_dir),
            });
        }

        let mut results = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            if step.is_null() {
                continue;
            }
            if !step.is_mapping() {
                results.push(ActionResult::failed(
                    format!("step {}", index),
                    "step is not a mapping",
                ));
                continue;
            }

            if let Some(name) = step.get("name").and_then(Value::as_str) {
                info!("Processing step: {}", name);
            }

            if let Some(commands) = step.get("commands").and_then(Value::as_sequence) {
                for command in commands {
                    match command.as_str() {
                        Some(command) => results.push(self.run_command(command).await),
                        None => results.push(ActionResult::failed(
                            format!("step {} command", index),
                            "command is not a string",
                        )),
                    }
                }
            }

            if let Some(files) = step.get("files").and_then(Value::as_sequence) {
                for file in files {
                    results.push(self.write_file(file).await);
                }
            }
        }

        Ok(results)
    }
}

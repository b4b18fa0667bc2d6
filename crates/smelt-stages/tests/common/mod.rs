//! Shared fixtures for stage-run integration tests

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml_ng::Value;
use smelt_stages::{ActionResult, EngineFatal, StageEngine};
use std::sync::Mutex;
use tempfile::TempDir;

/// Engine that records every phase it is asked to apply, with the steps it
/// was handed, and can be scripted to fail fatally at one phase.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<(String, Value)>>,
    fatal_phase: Option<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal_at(phase: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fatal_phase: Some(phase.to_string()),
        }
    }

    /// Phases applied so far, in call order
    pub fn phases(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(phase, _)| phase.clone())
            .collect()
    }

    /// Steps handed over for one phase
    pub fn steps_for(&self, phase: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == phase)
            .map(|(_, steps)| steps.clone())
    }
}

#[async_trait]
impl StageEngine for RecordingEngine {
    async fn apply(&self, phase: &str, steps: &Value) -> Result<Vec<ActionResult>, EngineFatal> {
        self.calls
            .lock()
            .unwrap()
            .push((phase.to_string(), steps.clone()));
        if self.fatal_phase.as_deref() == Some(phase) {
            return Err(EngineFatal {
                phase: phase.to_string(),
                reason: "induced failure".to_string(),
            });
        }
        Ok(Vec::new())
    }
}

pub fn utf8(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("Invalid UTF-8 path")
}

pub fn write_file(dir: &Utf8Path, name: &str, content: &str) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

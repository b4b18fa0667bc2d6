//! Stage executor state machine
//!
//! A stage always runs its three hook phases in the fixed order
//! `<stage>.before`, `<stage>`, `<stage>.after`, strictly sequentially.
//! Individual action failures inside a phase are recorded and do not stop
//! the sequence; only an engine-fatal error transitions the executor to
//! `Failed` and halts the remaining phases.

use crate::engine::{ActionResult, StageEngine};
use smelt_core::MergedConfig;
use tracing::{error, info, warn};

/// Execution state of one stage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    RunningBefore,
    RunningMain,
    RunningAfter,
    Completed,
    Failed,
}

/// Result of one executed hook phase.
#[derive(Debug)]
pub struct HookResult {
    /// Phase identifier handed to the engine
    pub hook: String,
    /// Engine-fatal error for this phase, if any
    pub error: Option<String>,
    /// Per-action outcomes reported by the engine
    pub actions: Vec<ActionResult>,
}

/// Aggregate outcome of a stage run.
#[derive(Debug)]
pub struct StageResult {
    pub stage: String,
    /// One entry per executed phase, in execution order
    pub hooks: Vec<HookResult>,
    /// True when the engine reported a fatal error and the sequence stopped
    pub fatal: bool,
}

impl StageResult {
    /// Number of non-fatal action failures across all executed phases
    pub fn action_failures(&self) -> usize {
        self.hooks
            .iter()
            .flat_map(|hook| hook.actions.iter())
            .filter(|action| action.error.is_some())
            .count()
    }
}

/// Drives one stage through its three phases.
pub struct StageExecutor<'a> {
    engine: &'a dyn StageEngine,
    state: ExecutionState,
}

impl<'a> StageExecutor<'a> {
    pub fn new(engine: &'a dyn StageEngine) -> Self {
        Self {
            engine,
            state: ExecutionState::NotStarted,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Run the stage's phases against the merged configuration.
    pub async fn run(&mut self, stage: &str, config: &MergedConfig) -> StageResult {
        let phases = [
            (format!("{}.before", stage), ExecutionState::RunningBefore),
            (stage.to_string(), ExecutionState::RunningMain),
            (format!("{}.after", stage), ExecutionState::RunningAfter),
        ];

        let mut hooks = Vec::with_capacity(phases.len());

        for (phase, running) in phases {
            self.state = running;
            info!("Running stage: {}", phase);

            let steps = config.stage_steps(&phase);
            match self.engine.apply(&phase, steps).await {
                Ok(actions) => {
                    for failed in actions.iter().filter(|a| a.error.is_some()) {
                        warn!(
                            "{} failed in {}: {}",
                            failed.action,
                            phase,
                            failed.error.as_deref().unwrap_or("")
                        );
                    }
                    hooks.push(HookResult {
                        hook: phase,
                        error: None,
                        actions,
                    });
                }
                Err(fatal) => {
                    error!("{}", fatal);
                    hooks.push(HookResult {
                        hook: phase,
                        error: Some(fatal.to_string()),
                        actions: Vec::new(),
                    });
                    self.state = ExecutionState::Failed;
                    return StageResult {
                        stage: stage.to_string(),
                        hooks,
                        fatal: true,
                    };
                }
            }
        }

        self.state = ExecutionState::Completed;
        StageResult {
            stage: stage.to_string(),
            hooks,
            fatal: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ActionResult, EngineFatal, StageEngine};
    use async_trait::async_trait;
    use serde_yaml_ng::Value;
    use smelt_core::{merge, ErrorPolicy, Verbosity};
    use std::sync::Mutex;

    struct ScriptedEngine {
        phases: Mutex<Vec<String>>,
        fatal_phase: Option<String>,
        action_error_phase: Option<String>,
    }

    impl ScriptedEngine {
        fn new() -> Self {
            Self {
                phases: Mutex::new(Vec::new()),
                fatal_phase: None,
                action_error_phase: None,
            }
        }

        fn fatal_at(phase: &str) -> Self {
            Self {
                fatal_phase: Some(phase.to_string()),
                ..Self::new()
            }
        }

        fn action_error_at(phase: &str) -> Self {
            Self {
                action_error_phase: Some(phase.to_string()),
                ..Self::new()
            }
        }

        fn phases(&self) -> Vec<String> {
            self.phases.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StageEngine for ScriptedEngine {
        async fn apply(
            &self,
            phase: &str,
            _steps: &Value,
        ) -> Result<Vec<ActionResult>, EngineFatal> {
            self.phases.lock().unwrap().push(phase.to_string());
            if self.fatal_phase.as_deref() == Some(phase) {
                return Err(EngineFatal {
                    phase: phase.to_string(),
                    reason: "induced".to_string(),
                });
            }
            if self.action_error_phase.as_deref() == Some(phase) {
                return Ok(vec![
                    ActionResult::ok("command `true`"),
                    ActionResult::failed("command `false`", "exit status: 1"),
                ]);
            }
            Ok(vec![ActionResult::ok("command `true`")])
        }
    }

    fn empty_config() -> MergedConfig {
        let policy = ErrorPolicy::lenient(Verbosity::Normal);
        merge(None, Vec::new(), Vec::new(), &policy).unwrap().0
    }

    #[tokio::test]
    async fn test_phases_run_in_fixed_order() {
        let engine = ScriptedEngine::new();
        let mut executor = StageExecutor::new(&engine);
        assert_eq!(executor.state(), ExecutionState::NotStarted);

        let result = executor.run("luke", &empty_config()).await;

        assert_eq!(engine.phases(), vec!["luke.before", "luke", "luke.after"]);
        assert_eq!(executor.state(), ExecutionState::Completed);
        assert!(!result.fatal);
        assert_eq!(result.hooks.len(), 3);
    }

    #[tokio::test]
    async fn test_fatal_in_before_stops_sequence() {
        let engine = ScriptedEngine::fatal_at("luke.before");
        let mut executor = StageExecutor::new(&engine);

        let result = executor.run("luke", &empty_config()).await;

        assert_eq!(engine.phases(), vec!["luke.before"]);
        assert_eq!(executor.state(), ExecutionState::Failed);
        assert!(result.fatal);
        assert_eq!(result.hooks.len(), 1);
        assert!(result.hooks[0].error.is_some());
    }

    #[tokio::test]
    async fn test_fatal_in_main_skips_after() {
        let engine = ScriptedEngine::fatal_at("luke");
        let mut executor = StageExecutor::new(&engine);

        let result = executor.run("luke", &empty_config()).await;

        assert_eq!(engine.phases(), vec!["luke.before", "luke"]);
        assert!(result.fatal);
        assert_eq!(result.hooks.last().unwrap().hook, "luke");
    }

    #[tokio::test]
    async fn test_action_failures_do_not_stop_sequence() {
        let engine = ScriptedEngine::action_error_at("luke.before");
        let mut executor = StageExecutor::new(&engine);

        let result = executor.run("luke", &empty_config()).await;

        assert_eq!(engine.phases(), vec!["luke.before", "luke", "luke.after"]);
        assert_eq!(executor.state(), ExecutionState::Completed);
        assert!(!result.fatal);
        assert_eq!(result.action_failures(), 1);
    }

    #[tokio::test]
    async fn test_any_string_is_a_legal_stage_name() {
        let engine = ScriptedEngine::new();
        let mut executor = StageExecutor::new(&engine);

        let result = executor.run("custom stage-42", &empty_config()).await;
        assert!(!result.fatal);
        assert_eq!(
            engine.phases(),
            vec![
                "custom stage-42.before",
                "custom stage-42",
                "custom stage-42.after"
            ]
        );
    }
}

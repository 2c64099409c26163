use super::assertions::Assertion;
use super::runner::ScenarioRunner;
use super::steps::ScenarioStep;
use std::collections::HashMap;
use std::time::Duration;

/// Fluent DSL for building test scenarios
pub struct Scenario {
    name: String,
    initial_files: HashMap<String, Vec<u8>>,
    fixture: Option<String>,
    block_state_dir: bool,
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    /// Create a new scenario with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            initial_files: HashMap::new(),
            fixture: None,
            block_state_dir: false,
            steps: Vec::new(),
        }
    }

    // ===== Initial setup =====

    /// Add a single file to the initial project
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.initial_files
            .insert(path.to_string(), content.to_vec());
        self
    }

    /// Load the initial project from fixtures
    pub fn from_fixture(mut self, fixture_name: &str) -> Self {
        self.fixture = Some(fixture_name.to_string());
        self
    }

    /// Make the state directory unusable so initialization fails
    pub fn with_unusable_state_dir(mut self) -> Self {
        self.block_state_dir = true;
        self
    }

    // ===== Project edits =====

    /// Write (or overwrite) a project file
    pub fn write(mut self, path: &str, content: &[u8]) -> Self {
        self.steps.push(ScenarioStep::WriteFile {
            path: path.to_string(),
            content: content.to_vec(),
        });
        self
    }

    /// Delete a project file
    pub fn delete(mut self, path: &str) -> Self {
        self.steps.push(ScenarioStep::DeleteFile {
            path: path.to_string(),
        });
        self
    }

    // ===== Checkpoint operations =====

    /// Create a checkpoint of `files`, remembered as `label`
    pub fn checkpoint(mut self, label: &str, operation: &str, files: &[&str]) -> Self {
        self.steps.push(ScenarioStep::Create {
            label: label.to_string(),
            operation: operation.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            snapshot: None,
        });
        self
    }

    /// Create a checkpoint carrying a JSON snapshot
    pub fn checkpoint_with_snapshot(
        mut self,
        label: &str,
        operation: &str,
        files: &[&str],
        snapshot: serde_json::Value,
    ) -> Self {
        self.steps.push(ScenarioStep::Create {
            label: label.to_string(),
            operation: operation.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
            snapshot: Some(snapshot),
        });
        self
    }

    /// Restore the checkpoint remembered as `label`
    pub fn restore(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::Restore {
            label: label.to_string(),
        });
        self
    }

    /// Restore by raw id (for unknown ids)
    pub fn restore_id(mut self, id: &str) -> Self {
        self.steps.push(ScenarioStep::RestoreId { id: id.to_string() });
        self
    }

    /// Drop checkpoints older than `days`
    pub fn clean(mut self, days: u32) -> Self {
        self.steps.push(ScenarioStep::Clean { days });
        self
    }

    // ===== Time control =====

    /// Wait for a duration
    pub fn wait(mut self, duration: Duration) -> Self {
        self.steps.push(ScenarioStep::Wait { duration });
        self
    }

    /// Wait for N days
    pub fn wait_days(mut self, days: u64) -> Self {
        self.steps.push(ScenarioStep::WaitDays { days });
        self
    }

    // ===== Failure simulation =====

    /// Make the next commits fail at the ref update
    pub fn inject_commit_failure(mut self) -> Self {
        self.steps.push(ScenarioStep::InjectCommitFailure);
        self
    }

    /// Undo `inject_commit_failure`
    pub fn clear_commit_failure(mut self) -> Self {
        self.steps.push(ScenarioStep::ClearCommitFailure);
        self
    }

    /// Hold the repository lock as another process would
    pub fn hold_lock(mut self) -> Self {
        self.steps.push(ScenarioStep::HoldLock);
        self
    }

    /// Release a lock taken by `hold_lock`
    pub fn release_lock(mut self) -> Self {
        self.steps.push(ScenarioStep::ReleaseLock);
        self
    }

    /// Overwrite metadata.json with garbage
    pub fn corrupt_metadata(mut self) -> Self {
        self.steps.push(ScenarioStep::CorruptMetadata);
        self
    }

    /// Die in the middle of restoring `label`
    pub fn crash_mid_restore(mut self, label: &str) -> Self {
        self.steps.push(ScenarioStep::CrashMidRestore {
            label: label.to_string(),
        });
        self
    }

    /// Simulate a crash
    pub fn crash(mut self) -> Self {
        self.steps.push(ScenarioStep::Crash);
        self
    }

    /// Restart after crash
    pub fn restart(mut self) -> Self {
        self.steps.push(ScenarioStep::Restart);
        self
    }

    // ===== Assertions =====

    /// Add a general assertion
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.steps.push(ScenarioStep::Assert { assertion });
        self
    }

    /// Assert a project file's exact content
    pub fn assert_file(self, path: &str, content: &[u8]) -> Self {
        self.assert(Assertion::FileContent {
            path: path.to_string(),
            content: content.to_vec(),
        })
    }

    /// Assert the number of listed checkpoints
    pub fn assert_count(self, count: usize) -> Self {
        self.assert(Assertion::CheckpointCount(count))
    }

    /// Assert the files recorded for `label`
    pub fn assert_files(self, label: &str, files: &[&str]) -> Self {
        self.assert(Assertion::CheckpointFiles {
            label: label.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
        })
    }

    /// Assert the shadow HEAD is back on main
    pub fn assert_head_attached(self) -> Self {
        self.assert(Assertion::HeadAttached)
    }

    // ===== Execution =====

    /// Execute the scenario and return results
    pub fn run(self) -> ScenarioResult {
        let mut runner = match ScenarioRunner::new(
            self.initial_files.clone(),
            self.fixture.as_deref(),
            self.block_state_dir,
        ) {
            Ok(r) => r,
            Err(e) => {
                return ScenarioResult {
                    name: self.name.clone(),
                    success: false,
                    steps_executed: 0,
                    failure_step: Some(0),
                    error: Some(format!("Failed to create runner: {}", e)),
                }
            }
        };

        match runner.execute(&self.steps) {
            Ok(()) => ScenarioResult {
                name: self.name,
                success: true,
                steps_executed: self.steps.len(),
                failure_step: None,
                error: None,
            },
            Err(e) => {
                let failure_step = runner.current_step();
                ScenarioResult {
                    name: self.name,
                    success: false,
                    steps_executed: failure_step,
                    failure_step: Some(failure_step),
                    error: Some(format!("{:?}", e)),
                }
            }
        }
    }
}

/// Result of running a scenario
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub steps_executed: usize,
    pub failure_step: Option<usize>,
    pub error: Option<String>,
}

impl ScenarioResult {
    /// Unwrap the result, panicking if it failed
    pub fn unwrap(self) {
        if !self.success {
            panic!(
                "Scenario '{}' failed at step {}: {}",
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    /// Expect the result to be successful
    pub fn expect(self, msg: &str) {
        if !self.success {
            panic!(
                "{}: Scenario '{}' failed at step {}: {}",
                msg,
                self.name,
                self.failure_step.unwrap_or(0),
                self.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }
}

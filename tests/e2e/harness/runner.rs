use super::assertions::Assertion;
use super::clock::MockClock;
use super::steps::ScenarioStep;
use super::workspace::TestWorkspace;
use anyhow::{anyhow, bail, ensure, Context, Result};
use rewind_core::{
    Checkpoints, LockConfig, LockGuard, Refs, RestoreReport, ShadowRepository, Snapshot,
    METADATA_FILE,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Executes scenarios against a real shadow repository
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    checkpoints: Option<Checkpoints>,
    clock: MockClock,
    /// Label -> id returned by `create` (None when it failed).
    created: HashMap<String, Option<String>>,
    last_restore: Option<Option<RestoreReport>>,
    last_clean: Option<usize>,
    held_lock: Option<LockGuard>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner and initialize checkpointing
    pub fn new(
        initial_files: HashMap<String, Vec<u8>>,
        fixture: Option<&str>,
        block_state_dir: bool,
    ) -> Result<Self> {
        let workspace = TestWorkspace::with_files(initial_files)?;
        if let Some(name) = fixture {
            workspace.load_fixture(name)?;
        }
        if block_state_dir {
            workspace.block_state_dir()?;
        }

        let mut runner = Self {
            workspace,
            checkpoints: None,
            clock: MockClock::new(),
            created: HashMap::new(),
            last_restore: None,
            last_clean: None,
            held_lock: None,
            current_step: 0,
        };
        runner.start()?;
        Ok(runner)
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    /// Execute a single step
    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::WriteFile { path, content } => self.workspace.write_file(path, content),
            ScenarioStep::DeleteFile { path } => self.workspace.delete_file(path),

            ScenarioStep::Create {
                label,
                operation,
                files,
                snapshot,
            } => self.handle_create(label, operation, files, snapshot.as_ref()),
            ScenarioStep::Restore { label } => self.handle_restore(label),
            ScenarioStep::RestoreId { id } => self.handle_restore_id(id),
            ScenarioStep::Clean { days } => self.handle_clean(*days),

            ScenarioStep::Wait { duration } => self.handle_wait(*duration),
            ScenarioStep::WaitDays { days } => self.handle_wait(Duration::from_secs(days * 86400)),

            ScenarioStep::InjectCommitFailure => self.handle_inject_commit_failure(),
            ScenarioStep::ClearCommitFailure => self.handle_clear_commit_failure(),
            ScenarioStep::HoldLock => self.handle_hold_lock(),
            ScenarioStep::ReleaseLock => {
                self.held_lock = None;
                Ok(())
            }
            ScenarioStep::CorruptMetadata => self.handle_corrupt_metadata(),
            ScenarioStep::CrashMidRestore { label } => self.handle_crash_mid_restore(label),
            ScenarioStep::Crash => {
                // No shutdown: whatever is on disk is what the next process sees.
                self.checkpoints = None;
                Ok(())
            }
            ScenarioStep::Restart => self.start(),

            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn start(&mut self) -> Result<()> {
        let mut checkpoints = self
            .workspace
            .checkpoints()
            .with_time_provider(self.clock.as_provider());
        checkpoints.initialize();
        self.checkpoints = Some(checkpoints);
        Ok(())
    }

    fn checkpoints(&self) -> Result<&Checkpoints> {
        self.checkpoints
            .as_ref()
            .ok_or_else(|| anyhow!("Checkpoints not available (crashed?)"))
    }

    fn repo(&self) -> Result<&ShadowRepository> {
        Ok(self.checkpoints()?.manager().repository()?)
    }

    fn shadow_dir(&self) -> Result<PathBuf> {
        Ok(self.repo()?.dir().to_path_buf())
    }

    fn id_for(&self, label: &str) -> Result<&str> {
        match self.created.get(label) {
            Some(Some(id)) => Ok(id),
            Some(None) => bail!("Checkpoint '{}' was never created", label),
            None => bail!("Unknown checkpoint label '{}'", label),
        }
    }

    // ===== Checkpoint handlers =====

    fn handle_create(
        &mut self,
        label: &str,
        operation: &str,
        files: &[String],
        snapshot: Option<&serde_json::Value>,
    ) -> Result<()> {
        let snapshot = snapshot.map(Snapshot::from_json).transpose()?;
        let id = self
            .checkpoints()?
            .create(operation, files, snapshot.as_ref());
        self.created.insert(label.to_string(), id);
        Ok(())
    }

    fn handle_restore(&mut self, label: &str) -> Result<()> {
        let id = self.id_for(label)?.to_string();
        self.handle_restore_id(&id)
    }

    fn handle_restore_id(&mut self, id: &str) -> Result<()> {
        let report = self.checkpoints()?.restore_with_report(id);
        self.last_restore = Some(report);
        Ok(())
    }

    fn handle_clean(&mut self, days: u32) -> Result<()> {
        self.last_clean = Some(self.checkpoints()?.clean(days));
        Ok(())
    }

    fn handle_wait(&mut self, duration: Duration) -> Result<()> {
        self.clock.advance(duration);
        Ok(())
    }

    // ===== Failure simulation handlers =====

    /// A directory squatting on the ref's temp path makes the final ref
    /// update of a commit fail.
    fn handle_inject_commit_failure(&mut self) -> Result<()> {
        let blocker = self.shadow_dir()?.join("refs").join("main.tmp");
        fs::create_dir_all(&blocker).context("Failed to inject commit failure")
    }

    fn handle_clear_commit_failure(&mut self) -> Result<()> {
        let blocker = self.shadow_dir()?.join("refs").join("main.tmp");
        fs::remove_dir_all(&blocker).context("Failed to clear commit failure")
    }

    fn handle_hold_lock(&mut self) -> Result<()> {
        let guard = LockGuard::acquire(&self.shadow_dir()?, &LockConfig::default())?;
        self.held_lock = Some(guard);
        Ok(())
    }

    fn handle_corrupt_metadata(&mut self) -> Result<()> {
        let path = self.shadow_dir()?.join(METADATA_FILE);
        fs::write(path, b"{ \"checkpoints\": [ truncated").context("Failed to corrupt metadata")
    }

    fn handle_crash_mid_restore(&mut self, label: &str) -> Result<()> {
        let id = self.id_for(label)?.to_string();
        let repo = self.repo()?;
        let checkpoint = repo
            .load_metadata()?
            .find(&id)
            .cloned()
            .ok_or_else(|| anyhow!("Checkpoint {} not in metadata", id))?;
        let commit = repo.history().resolve(&checkpoint.history_ref)?;

        Refs::new(repo.dir()).detach_head(commit)?;
        self.checkpoints = None;
        Ok(())
    }

    // ===== Assertion handler =====

    fn handle_assertion(&mut self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::FileContent { path, content } => {
                let actual = self.workspace.read_file(path)?;
                ensure!(
                    &actual == content,
                    "{} contains {:?}, expected {:?}",
                    path,
                    String::from_utf8_lossy(&actual),
                    String::from_utf8_lossy(content)
                );
            }
            Assertion::FileMissing { path } => {
                ensure!(!self.workspace.file_exists(path), "{} exists", path);
            }

            Assertion::CheckpointCount(expected) => {
                let count = self.checkpoints()?.list_checkpoints().len();
                ensure!(count == *expected, "{} checkpoints, expected {}", count, expected);
                let stats = self.checkpoints()?.stats();
                ensure!(stats.count == *expected, "stats count {}", stats.count);
            }
            Assertion::CheckpointListed { label } => {
                let id = self.id_for(label)?;
                let listed = self.checkpoints()?.list_checkpoints();
                ensure!(listed.iter().any(|s| s.id == id), "{} not listed", label);
            }
            Assertion::CheckpointNotListed { label } => {
                let id = self.id_for(label)?;
                let listed = self.checkpoints()?.list_checkpoints();
                ensure!(listed.iter().all(|s| s.id != id), "{} still listed", label);
            }
            Assertion::CreateFailed { label } => {
                ensure!(
                    matches!(self.created.get(label), Some(None)),
                    "create for '{}' did not fail",
                    label
                );
            }
            Assertion::CheckpointFiles { label, files } => {
                let id = self.id_for(label)?;
                let detail = self
                    .checkpoints()?
                    .show(id)
                    .ok_or_else(|| anyhow!("show({}) returned nothing", id))?;
                ensure!(
                    &detail.checkpoint.files == files,
                    "files {:?}, expected {:?}",
                    detail.checkpoint.files,
                    files
                );
            }
            Assertion::SnapshotEquals { label, json } => {
                let id = self.id_for(label)?;
                let detail = self
                    .checkpoints()?
                    .show(id)
                    .ok_or_else(|| anyhow!("show({}) returned nothing", id))?;
                ensure!(detail.checkpoint.has_snapshot, "hasSnapshot is false");
                let snapshot = detail
                    .snapshot
                    .ok_or_else(|| anyhow!("snapshot not returned"))?;
                let value: serde_json::Value = snapshot.to_json()?;
                ensure!(&value == json, "snapshot {}, expected {}", value, json);
            }
            Assertion::DistinctIds => {
                let ids: Vec<&String> = self.created.values().flatten().collect();
                let unique: HashSet<&String> = ids.iter().copied().collect();
                ensure!(unique.len() == ids.len(), "duplicate ids in {:?}", ids);
            }

            Assertion::LastRestoreSucceeded(expected) => {
                let last = self
                    .last_restore
                    .as_ref()
                    .ok_or_else(|| anyhow!("No restore has run"))?;
                ensure!(
                    last.is_some() == *expected,
                    "restore succeeded = {}, expected {}",
                    last.is_some(),
                    expected
                );
            }
            Assertion::LastRestoreMissing(expected) => {
                let report = self
                    .last_restore
                    .as_ref()
                    .and_then(|r| r.as_ref())
                    .ok_or_else(|| anyhow!("No successful restore has run"))?;
                ensure!(
                    &report.missing == expected,
                    "missing {:?}, expected {:?}",
                    report.missing,
                    expected
                );
            }
            Assertion::LastCleanRemoved(expected) => {
                let removed = self.last_clean.ok_or_else(|| anyhow!("No clean has run"))?;
                ensure!(removed == *expected, "clean removed {}, expected {}", removed, expected);
            }

            Assertion::Enabled(expected) => {
                let enabled = self.checkpoints()?.is_enabled();
                ensure!(enabled == *expected, "enabled = {}", enabled);
            }
            Assertion::HeadAttached => {
                ensure!(
                    !self.repo()?.history().is_detached()?,
                    "shadow HEAD is detached"
                );
            }
            Assertion::ShadowFileAbsent { path } => {
                let full = self.repo()?.history().worktree_path(path);
                ensure!(!full.exists(), "{} present in shadow worktree", path);
            }
            Assertion::MetadataBackupExists => {
                let backup = self.shadow_dir()?.join("metadata.json.bak");
                ensure!(backup.is_file(), "no metadata backup at {}", backup.display());
            }

            Assertion::Custom(check) => check(self.checkpoints()?)?,
        }
        Ok(())
    }
}

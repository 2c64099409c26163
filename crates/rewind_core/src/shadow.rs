//! Shadow repository lifecycle: locate, create, recover, or disable.

use crate::config::{Config, LockConfig};
use crate::error::{CheckpointError, Result};
use crate::history::History;
use crate::identity::ProjectIdentity;
use crate::lock::LockGuard;
use crate::metadata::{Metadata, MetadataStore};
use crate::TimeProvider;
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An initialized shadow repository for one project.
///
/// Everything that reads or writes checkpoint state goes through this handle.
/// Mutations must hold [`ShadowRepository::lock`] for their whole duration.
pub struct ShadowRepository {
    identity: ProjectIdentity,
    dir: PathBuf,
    history: History,
    metadata: MetadataStore,
    lock_config: LockConfig,
    /// Time provider for testing (None = use system time).
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl ShadowRepository {
    /// Canonical project root.
    pub fn project_path(&self) -> &Path {
        self.identity.path()
    }

    /// The project's identity.
    pub fn identity(&self) -> &ProjectIdentity {
        &self.identity
    }

    /// `<state_dir>/history/<project-hash>`.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The shadow history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The `metadata.json` store.
    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Takes the cross-process repository lock.
    pub fn lock(&self) -> Result<LockGuard> {
        LockGuard::acquire(&self.dir, &self.lock_config)
    }

    /// Reads `metadata.json` fresh from disk.
    pub fn load_metadata(&self) -> Result<Metadata> {
        self.metadata.load(self.identity.path(), self.now())
    }

    /// Replaces `metadata.json` atomically.
    pub fn save_metadata(&self, metadata: &Metadata) -> Result<()> {
        self.metadata.save(metadata)
    }

    /// Current Unix time in milliseconds.
    pub fn now_ms(&self) -> i64 {
        match &self.time_provider {
            Some(provider) => provider.now(),
            None => Utc::now().timestamp_millis(),
        }
    }

    /// Current time as a UTC timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_ms())
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Repairs state left behind by an interrupted process.
    ///
    /// Must be called with the lock held. A detached HEAD can only be seen
    /// here after a crash mid-restore, so it is moved back to main. Index
    /// entries whose commit no longer resolves are dropped.
    fn recover(&self) -> Result<RecoverySummary> {
        let mut summary = RecoverySummary::default();

        if self.history.is_detached()? {
            warn!(repo = %self.dir.display(), "Found detached HEAD from an interrupted restore, returning to main");
            self.history.checkout_main()?;
            summary.reattached_head = true;
        } else {
            self.history.reset_worktree()?;
        }

        let mut metadata = self.load_metadata()?;
        let before = metadata.checkpoints.len();
        metadata.checkpoints.retain(|cp| match self.history.resolve(&cp.history_ref) {
            Ok(_) => true,
            Err(e) if is_history_lost(&e) => {
                warn!(checkpoint = %cp.id, error = %e, "Dropping checkpoint with unresolvable history");
                summary.dropped.push(cp.id.clone());
                false
            }
            Err(e) => {
                warn!(checkpoint = %cp.id, error = %e, "Could not check checkpoint history, keeping it");
                true
            }
        });

        if metadata.checkpoints.len() != before || !self.metadata.exists() {
            self.save_metadata(&metadata)?;
        }

        Ok(summary)
    }

    /// Cheap check for anything [`Self::recover`] would fix.
    fn needs_recovery(&self) -> Result<bool> {
        if self.history.is_detached()? {
            return Ok(true);
        }
        if !self.metadata.exists() {
            return Ok(true);
        }
        let metadata = self.load_metadata()?;
        Ok(metadata
            .checkpoints
            .iter()
            .any(|cp| matches!(self.history.resolve(&cp.history_ref), Err(e) if is_history_lost(&e))))
    }
}

/// Errors meaning a `historyRef` can never resolve again, as opposed to a
/// read that failed this time.
fn is_history_lost(error: &CheckpointError) -> bool {
    matches!(
        error,
        CheckpointError::ObjectNotFound(_) | CheckpointError::InvalidHex(_)
    )
}

impl std::fmt::Debug for ShadowRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowRepository")
            .field("project", &self.identity.path())
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// What [`ShadowRepositoryManager::initialize`] repaired on an existing
/// repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// HEAD was detached and has been moved back to main.
    pub reattached_head: bool,
    /// Checkpoint ids removed from the index.
    pub dropped: Vec<String>,
}

impl RecoverySummary {
    /// Whether anything had to be repaired.
    pub fn is_clean(&self) -> bool {
        !self.reattached_head && self.dropped.is_empty()
    }
}

/// Lifecycle state of the shadow repository for a session.
#[derive(Debug)]
pub enum RepositoryState {
    /// `initialize` has not run yet.
    Uninitialized,
    /// Usable.
    Ready(ShadowRepository),
    /// Initialization failed; checkpointing is off until restart.
    Disabled {
        /// Why initialization failed.
        reason: String,
    },
}

/// Owns the shadow repository handle and its enabled/disabled state.
pub struct ShadowRepositoryManager {
    project_dir: PathBuf,
    config: Config,
    time_provider: Option<Arc<dyn TimeProvider>>,
    state: RepositoryState,
}

impl ShadowRepositoryManager {
    /// A manager for `project_dir`. Nothing touches the disk until
    /// [`Self::initialize`].
    pub fn new(project_dir: impl Into<PathBuf>, config: Config) -> Self {
        Self {
            project_dir: project_dir.into(),
            config,
            time_provider: None,
            state: RepositoryState::Uninitialized,
        }
    }

    /// Sets a custom time provider (Unix milliseconds) for testing.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Creates or opens the shadow repository.
    ///
    /// Returns `true` when checkpointing is available. Any failure is logged
    /// and leaves the manager disabled for the rest of the session; calling
    /// this again after that is a no-op that returns `false`.
    pub fn initialize(&mut self) -> bool {
        match &self.state {
            RepositoryState::Ready(_) => return true,
            RepositoryState::Disabled { .. } => return false,
            RepositoryState::Uninitialized => {}
        }

        match self.open_or_create() {
            Ok(repo) => {
                info!(project = %repo.project_path().display(), repo = %repo.dir().display(), "Checkpointing enabled");
                self.state = RepositoryState::Ready(repo);
                true
            }
            Err(e) => {
                warn!(
                    project = %self.project_dir.display(),
                    error = %e,
                    "Checkpoint initialization failed, checkpointing disabled"
                );
                if let Some(hint) = e.recovery_suggestion() {
                    debug!(hint, "recovery suggestion");
                }
                self.state = RepositoryState::Disabled {
                    reason: e.to_string(),
                };
                false
            }
        }
    }

    fn open_or_create(&self) -> Result<ShadowRepository> {
        let identity = ProjectIdentity::resolve(&self.project_dir)?;
        let state_dir = self.config.state_dir()?;
        let dir = identity.shadow_dir(&state_dir);
        fs::create_dir_all(&dir)?;

        let repo = ShadowRepository {
            history: History::open(&dir, &self.config),
            metadata: MetadataStore::new(&dir),
            lock_config: self.config.lock.clone(),
            time_provider: self.time_provider.clone(),
            identity,
            dir,
        };

        if !repo.history.is_initialized() {
            let _lock = repo.lock()?;
            // Another process may have won the race while we waited.
            if !repo.history.is_initialized() {
                let initial = repo.history.init(repo.now_ms())?;
                let metadata = Metadata::new(repo.project_path(), repo.now());
                repo.save_metadata(&metadata)?;
                info!(repo = %repo.dir.display(), commit = %initial, "Created shadow repository");
                return Ok(repo);
            }
        }

        if repo.needs_recovery()? {
            let _lock = repo.lock()?;
            let summary = repo.recover()?;
            if !summary.is_clean() {
                info!(
                    reattached_head = summary.reattached_head,
                    dropped = summary.dropped.len(),
                    "Recovered shadow repository"
                );
            }
        }

        Ok(repo)
    }

    /// Whether checkpointing is available.
    pub fn is_enabled(&self) -> bool {
        matches!(self.state, RepositoryState::Ready(_))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &RepositoryState {
        &self.state
    }

    /// The ready repository, or why there is none.
    pub fn repository(&self) -> Result<&ShadowRepository> {
        match &self.state {
            RepositoryState::Ready(repo) => Ok(repo),
            RepositoryState::Disabled { reason } => Err(CheckpointError::Disabled(reason.clone())),
            RepositoryState::Uninitialized => Err(CheckpointError::Disabled(
                "checkpointing has not been initialized".to_string(),
            )),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Leaves the repository attached to main and releases the handle.
    pub fn shutdown(&mut self) {
        if let RepositoryState::Ready(repo) = &self.state {
            match repo.history.is_detached() {
                Ok(false) => {}
                Ok(true) => {
                    if let Err(e) = repo.lock().and_then(|_lock| repo.history.checkout_main()) {
                        warn!(error = %e, "Could not return shadow HEAD to main on shutdown");
                    }
                }
                Err(e) => warn!(error = %e, "Could not read shadow HEAD on shutdown"),
            }
            debug!(repo = %repo.dir.display(), "shadow repository closed");
        }
        self.state = RepositoryState::Uninitialized;
    }
}

impl std::fmt::Debug for ShadowRepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowRepositoryManager")
            .field("project_dir", &self.project_dir)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

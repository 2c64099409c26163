//! Advisory cross-process lock on a shadow repository.

use crate::config::LockConfig;
use crate::error::{CheckpointError, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name inside the shadow repository.
pub const LOCK_FILE: &str = "LOCK";

/// RAII guard for the shadow repository lock.
///
/// The lock file holds the owner's PID and is also `flock`ed. Dropping the
/// guard closes the file and removes it, so every exit path releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    /// Wrapped in Option to allow taking ownership in Drop.
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    /// Acquires the lock in `repo_dir`, retrying with exponential backoff.
    ///
    /// A lock file left by a dead process is removed and the attempt is
    /// repeated immediately. When the holder is alive after all retries the
    /// call fails with `LockHeld`, never proceeding unsynchronized.
    pub fn acquire(repo_dir: &Path, config: &LockConfig) -> Result<Self> {
        let path = repo_dir.join(LOCK_FILE);
        let mut attempt = 0;

        loop {
            match try_acquire(&path) {
                Ok(guard) => return Ok(guard),
                Err(Contention::Stale) => continue,
                Err(Contention::Held(err)) => {
                    if attempt >= config.retries {
                        return Err(err);
                    }
                    let wait = config.backoff(attempt);
                    debug!(attempt, ?wait, "shadow repository busy, backing off");
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(Contention::Io(e)) => return Err(e),
            }
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Closing the handle releases the flock.
        if let Some(file) = self.file.take() {
            drop(file);
        }
        let _ = fs::remove_file(&self.path);
    }
}

enum Contention {
    /// Someone else holds it; worth retrying after a pause.
    Held(CheckpointError),
    /// A dead owner's file was removed; retry right away.
    Stale,
    /// Not a contention problem at all.
    Io(CheckpointError),
}

fn try_acquire(path: &Path) -> std::result::Result<LockGuard, Contention> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            let stamped = writeln!(file, "{}", std::process::id()).and_then(|_| file.flush());
            if let Err(e) = stamped {
                let _ = fs::remove_file(path);
                return Err(Contention::Io(e.into()));
            }

            if file.try_lock_exclusive().is_err() {
                let _ = fs::remove_file(path);
                return Err(Contention::Held(CheckpointError::RepositoryLocked));
            }

            Ok(LockGuard {
                file: Some(file),
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => inspect_existing(path),
        Err(e) => Err(Contention::Io(e.into())),
    }
}

/// Decides what to do about a `LOCK` file we did not create.
///
/// Reclaiming happens only while holding the flock on that same file, and
/// only if `path` still names it. Every reclaimer needs that flock first, so
/// two processes can never both remove and recreate the lock.
fn inspect_existing(path: &Path) -> std::result::Result<LockGuard, Contention> {
    let file = match File::open(path) {
        Ok(file) => file,
        // Released between our create and our open.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Contention::Stale),
        Err(_) => return Err(Contention::Held(CheckpointError::RepositoryLocked)),
    };

    if file.try_lock_exclusive().is_err() {
        let held = match read_pid(&file) {
            Some(pid) => CheckpointError::LockHeld { pid },
            None => CheckpointError::RepositoryLocked,
        };
        return Err(Contention::Held(held));
    }

    let Some(pid) = read_pid(&file) else {
        // The owner may still be writing its PID.
        return Err(Contention::Held(CheckpointError::RepositoryLocked));
    };

    if pid == std::process::id() || is_process_alive(pid) {
        return Err(Contention::Held(CheckpointError::LockHeld { pid }));
    }

    if !is_same_file(&file, path) {
        // Already reclaimed and replaced by someone else.
        return Err(Contention::Stale);
    }

    warn!(pid, "Detected stale lock from dead process, cleaning up");
    // Removed while our flock is still held; dropping `file` releases it.
    match fs::remove_file(path) {
        Ok(()) => Err(Contention::Stale),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Contention::Stale),
        Err(e) => Err(Contention::Io(e.into())),
    }
}

fn read_pid(mut file: &File) -> Option<u32> {
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Check if a process with the given PID is still alive.
#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    // /proc/{pid}/stat rather than /proc/{pid}: zombies keep the directory.
    Path::new(&format!("/proc/{}/stat", pid)).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    // Stale locks are not auto-cleaned here; the LOCK file must be removed by hand.
    true
}

//! Age-based pruning of the checkpoint index.

use crate::error::Result;
use crate::shadow::ShadowRepository;
use chrono::Duration;
use tracing::{debug, info};

/// Removes old checkpoints from `metadata.json`.
///
/// Only index entries are removed. Commits stay in the shadow history, which
/// is never rewritten here.
pub struct RetentionManager<'a> {
    repo: &'a ShadowRepository,
}

impl<'a> RetentionManager<'a> {
    /// A manager pruning `repo`.
    pub fn new(repo: &'a ShadowRepository) -> Self {
        Self { repo }
    }

    /// Drops every checkpoint strictly older than `days` days and returns how
    /// many were dropped.
    ///
    /// A checkpoint exactly at the cutoff is kept. With nothing to drop the
    /// index file is not rewritten.
    pub fn clean(&self, days: u32) -> Result<usize> {
        let _lock = self.repo.lock()?;

        let mut metadata = self.repo.load_metadata()?;
        // A window reaching past the earliest representable date covers everything.
        let Some(cutoff) = self
            .repo
            .now()
            .checked_sub_signed(Duration::days(i64::from(days)))
        else {
            debug!(days, "retention window exceeds representable time");
            return Ok(0);
        };

        let before = metadata.checkpoints.len();
        metadata.checkpoints.retain(|cp| cp.timestamp >= cutoff);
        let removed = before - metadata.checkpoints.len();

        if removed == 0 {
            debug!(days, "no checkpoints older than retention window");
            return Ok(0);
        }

        self.repo.save_metadata(&metadata)?;
        info!(removed, days, remaining = metadata.checkpoints.len(), "Cleaned old checkpoints");
        Ok(removed)
    }
}

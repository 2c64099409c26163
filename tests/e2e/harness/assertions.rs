use anyhow::Result;
use rewind_core::Checkpoints;

/// Declarative assertions on project and checkpoint state
pub enum Assertion {
    // Project files
    FileContent {
        path: String,
        content: Vec<u8>,
    },
    FileMissing {
        path: String,
    },

    // Checkpoints
    CheckpointCount(usize),
    CheckpointListed {
        label: String,
    },
    CheckpointNotListed {
        label: String,
    },
    CreateFailed {
        label: String,
    },
    CheckpointFiles {
        label: String,
        files: Vec<String>,
    },
    SnapshotEquals {
        label: String,
        json: serde_json::Value,
    },
    DistinctIds,

    // Restore and clean results
    LastRestoreSucceeded(bool),
    LastRestoreMissing(Vec<String>),
    LastCleanRemoved(usize),

    // Shadow repository
    Enabled(bool),
    HeadAttached,
    ShadowFileAbsent {
        path: String,
    },
    MetadataBackupExists,

    // Custom
    Custom(Box<dyn Fn(&Checkpoints) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileContent { path, content } => write!(
                f,
                "FileContent {{ path: {:?}, content: {:?} }}",
                path,
                String::from_utf8_lossy(content)
            ),
            Self::FileMissing { path } => write!(f, "FileMissing {{ path: {:?} }}", path),
            Self::CheckpointCount(n) => write!(f, "CheckpointCount({})", n),
            Self::CheckpointListed { label } => write!(f, "CheckpointListed({:?})", label),
            Self::CheckpointNotListed { label } => write!(f, "CheckpointNotListed({:?})", label),
            Self::CreateFailed { label } => write!(f, "CreateFailed({:?})", label),
            Self::CheckpointFiles { label, files } => {
                write!(f, "CheckpointFiles {{ label: {:?}, files: {:?} }}", label, files)
            }
            Self::SnapshotEquals { label, json } => {
                write!(f, "SnapshotEquals {{ label: {:?}, json: {} }}", label, json)
            }
            Self::DistinctIds => write!(f, "DistinctIds"),
            Self::LastRestoreSucceeded(ok) => write!(f, "LastRestoreSucceeded({})", ok),
            Self::LastRestoreMissing(paths) => write!(f, "LastRestoreMissing({:?})", paths),
            Self::LastCleanRemoved(n) => write!(f, "LastCleanRemoved({})", n),
            Self::Enabled(on) => write!(f, "Enabled({})", on),
            Self::HeadAttached => write!(f, "HeadAttached"),
            Self::ShadowFileAbsent { path } => write!(f, "ShadowFileAbsent({:?})", path),
            Self::MetadataBackupExists => write!(f, "MetadataBackupExists"),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = FsError> = std::result::Result<T, E>;

/// Failure of a single filesystem operation.
///
/// The variant names the operation, the fields name the offending path(s).
/// When the host reported the failure, its `io::Error` is kept as the source
/// but is not otherwise distinguished (permission denied and disk full look
/// the same at this level).
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Could not check if {path:?} exists because the path exceeds {limit} characters")]
    PathTooLong { path: PathBuf, limit: usize },

    #[error("{path:?} does not exist")]
    NotFound { path: PathBuf },

    #[error("Failed to read {path:?}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path:?}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to copy {from:?} to {to:?}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move {from:?} to {to:?}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to touch {path:?}")]
    TouchFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to unlink {path:?}")]
    UnlinkFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create directory {path:?}")]
    MkdirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list directory {path:?}")]
    ReadDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove directory {path:?}")]
    RmdirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound {
            path: path.to_path_buf(),
        }
    }

    /// The primary path the failing operation was acting on.
    ///
    /// For copy and move this is the source.
    pub fn path(&self) -> &Path {
        match self {
            Self::PathTooLong { path, .. }
            | Self::NotFound { path }
            | Self::ReadFailed { path, .. }
            | Self::WriteFailed { path, .. }
            | Self::TouchFailed { path, .. }
            | Self::UnlinkFailed { path, .. }
            | Self::MkdirFailed { path, .. }
            | Self::ReadDirFailed { path, .. }
            | Self::RmdirFailed { path, .. } => path,
            Self::CopyFailed { from, .. } | Self::MoveFailed { from, .. } => from,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

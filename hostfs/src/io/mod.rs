pub mod fs;
pub mod memfs;

use crate::error::{FsError, Result};
use crate::util::paths;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Capability set over a filesystem.
///
/// Calling code depends on this trait instead of `std::fs` so that a
/// [`memfs::MemFs`] can stand in for the host in tests. Every call is
/// self-contained: nothing is opened or cached across calls.
pub trait Filesystem: Send + Sync {
    /// Fails with `PathTooLong` if the path exceeds the configured limit.
    fn exists(&self, path: &Path) -> Result<bool>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Replaces the file contents. With `lock`, an exclusive lock is held
    /// for the duration of this call only.
    fn write(&self, path: &Path, contents: &[u8], lock: bool) -> Result<()>;

    fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Appends to the file, creating it if needed. Reports failure through
    /// the return value, never as an error.
    fn append(&self, path: &Path, contents: &[u8]) -> bool;

    /// Creates the file if missing and sets its times. `mtime` defaults to
    /// now, `atime` defaults to `mtime`.
    fn touch(&self, path: &Path, mtime: Option<SystemTime>, atime: Option<SystemTime>)
        -> Result<()>;

    /// Removes a file or a symbolic link (never follows it).
    fn unlink(&self, path: &Path) -> Result<()>;

    fn mkdir(&self, path: &Path, mode: u32, recursive: bool) -> Result<()>;

    /// Removes a directory and everything below it. See [`crate::tree`].
    fn rmdir(&self, path: &Path) -> Result<()>;

    fn filesize(&self, path: &Path) -> Result<u64>;

    fn is_directory(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn is_symlink(&self, path: &Path) -> bool;

    fn mime_type(&self, path: &Path) -> Result<String>;

    /// Direct children of a directory, sorted.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Removes a single directory that must already be empty.
    fn remove_empty_dir(&self, path: &Path) -> Result<()>;

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| FsError::ReadFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })
    }

    /// Unlinks each path in order, stopping at the first failure. Paths after
    /// the failing one are left untouched.
    fn unlink_all(&self, targets: &[PathBuf]) -> Result<()> {
        for (i, path) in targets.iter().enumerate() {
            if let Err(err) = self.unlink(path) {
                log::debug!("unlink_all stopped at item {} of {}", i + 1, targets.len());
                return Err(err);
            }
        }
        Ok(())
    }

    fn name(&self, path: &Path) -> String {
        paths::name(path)
    }

    fn basename(&self, path: &Path) -> String {
        paths::basename(path)
    }

    fn dirname(&self, path: &Path) -> String {
        paths::dirname(path)
    }

    fn extension(&self, path: &Path) -> String {
        paths::extension(path)
    }
}

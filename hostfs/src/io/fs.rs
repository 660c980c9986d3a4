use super::Filesystem;
use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::mime::{MimeDetector, SniffMimeDetector, MIME_DIRECTORY};
use crate::tree;
use crate::util::paths::check_path_len;
use filetime::FileTime;
use std::fmt;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// The host filesystem.
///
/// Every method is a single delegation to `std::fs` (or `filetime` for
/// timestamps), with the OS error folded into the matching [`FsError`].
/// Holds only immutable configuration, so clones are interchangeable.
#[derive(Clone)]
pub struct LocalFs {
    config: FsConfig,
    mime: Arc<dyn MimeDetector>,
}

impl fmt::Debug for LocalFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFs")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

impl LocalFs {
    pub fn new(config: FsConfig) -> Self {
        Self {
            config,
            mime: Arc::new(SniffMimeDetector),
        }
    }

    pub fn with_mime_detector(mut self, detector: impl MimeDetector + 'static) -> Self {
        self.mime = Arc::new(detector);
        self
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// `mkdir` with the configured default mode.
    pub fn mkdir_default(&self, path: &Path, recursive: bool) -> Result<()> {
        self.mkdir(path, self.config.default_dir_mode, recursive)
    }

    fn try_write(path: &Path, contents: &[u8], lock: bool) -> io::Result<()> {
        // Truncate only once the lock is held so a waiting writer never
        // clobbers a file another locked writer is still filling.
        let mut file = OpenOptions::new().write(true).create(true).open(path)?;
        if lock {
            file.lock()?;
        }
        file.set_len(0)?;
        file.write_all(contents)?;
        file.flush()
    }

    fn try_append(path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        file.write_all(contents)
    }

    fn try_touch(path: &Path, mtime: SystemTime, atime: SystemTime) -> io::Result<()> {
        if fs::symlink_metadata(path).is_err() {
            OpenOptions::new().write(true).create(true).open(path)?;
        }
        filetime::set_file_times(
            path,
            FileTime::from_system_time(atime),
            FileTime::from_system_time(mtime),
        )
    }

    fn sample(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut sample = Vec::new();
        File::open(path)?
            .take(self.config.mime_sample_len as u64)
            .read_to_end(&mut sample)?;
        Ok(sample)
    }
}

/// Whether both paths resolve to one existing file.
#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl Filesystem for LocalFs {
    fn exists(&self, path: &Path) -> Result<bool> {
        check_path_len(path, self.config.max_path_len)?;
        Ok(path.exists())
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        if !self.exists(path)? && !self.is_file(path) {
            return Err(FsError::not_found(path));
        }
        fs::read(path).map_err(|source| FsError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, contents: &[u8], lock: bool) -> Result<()> {
        log::debug!("write {} ({} bytes, lock={})", path.display(), contents.len(), lock);
        Self::try_write(path, contents, lock).map_err(|source| FsError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        log::debug!("copy {} -> {}", from.display(), to.display());
        let copy_failed = |source: io::Error| FsError::CopyFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };
        // std::fs::copy truncates the destination before reading the source.
        if same_file(from, to) {
            return Err(copy_failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "source and destination are the same file",
            )));
        }
        fs::copy(from, to).map(|_| ()).map_err(copy_failed)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        log::debug!("move {} -> {}", from.display(), to.display());
        fs::rename(from, to).map_err(|source| FsError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
    }

    fn append(&self, path: &Path, contents: &[u8]) -> bool {
        log::debug!("append {} ({} bytes)", path.display(), contents.len());
        match Self::try_append(path, contents) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to append to {}: {}", path.display(), e);
                false
            }
        }
    }

    fn touch(&self, path: &Path, mtime: Option<SystemTime>, atime: Option<SystemTime>) -> Result<()> {
        log::debug!("touch {}", path.display());
        let mtime = mtime.unwrap_or_else(SystemTime::now);
        let atime = atime.unwrap_or(mtime);
        Self::try_touch(path, mtime, atime).map_err(|source| FsError::TouchFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn unlink(&self, path: &Path) -> Result<()> {
        log::debug!("unlink {}", path.display());
        fs::remove_file(path).map_err(|source| FsError::UnlinkFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn mkdir(&self, path: &Path, mode: u32, recursive: bool) -> Result<()> {
        log::debug!("mkdir {} (mode={:o}, recursive={})", path.display(), mode, recursive);
        let mut builder = DirBuilder::new();
        builder.recursive(recursive);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        // A recursive DirBuilder succeeds on an existing directory; the host
        // mkdir contract does not.
        if recursive && path.is_dir() {
            return Err(FsError::MkdirFailed {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::AlreadyExists),
            });
        }
        builder.create(path).map_err(|source| FsError::MkdirFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        log::debug!("rmdir {}", path.display());
        tree::remove_tree(self, path, self.config.rmdir_policy)
    }

    fn filesize(&self, path: &Path) -> Result<u64> {
        if !self.exists(path)? {
            return Err(FsError::not_found(path));
        }
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|source| FsError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        path.is_symlink()
    }

    fn mime_type(&self, path: &Path) -> Result<String> {
        if !self.exists(path)? {
            return Err(FsError::not_found(path));
        }
        if path.is_dir() {
            return Ok(MIME_DIRECTORY.to_string());
        }
        let sample = self.sample(path).map_err(|source| FsError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.mime.detect(path, &sample))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let read_dir_failed = |source: io::Error| FsError::ReadDirFailed {
            path: path.to_path_buf(),
            source,
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(read_dir_failed)? {
            entries.push(entry.map_err(read_dir_failed)?.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn remove_empty_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).map_err(|source| FsError::RmdirFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

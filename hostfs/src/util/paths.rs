use crate::error::{FsError, Result};
use std::path::Path;

#[cfg(target_os = "linux")]
const PLATFORM_MAX_PATH: usize = 4096;
#[cfg(windows)]
const PLATFORM_MAX_PATH: usize = 260;
#[cfg(not(any(target_os = "linux", windows)))]
const PLATFORM_MAX_PATH: usize = 1024;

/// Longest path `exists` accepts: the platform maximum minus two, leaving
/// room for a terminator and a trailing separator.
pub const DEFAULT_MAX_PATH_LEN: usize = PLATFORM_MAX_PATH - 2;

pub fn check_path_len(path: &Path, limit: usize) -> Result<()> {
    if path.as_os_str().len() > limit {
        return Err(FsError::PathTooLong {
            path: path.to_path_buf(),
            limit,
        });
    }
    Ok(())
}

/// Final path segment without its extension (`/x/file1.txt` -> `file1`).
pub fn name(path: &Path) -> String {
    let base = basename(path);
    match base.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => base,
    }
}

/// Final path segment (`/x/file1.txt` -> `file1.txt`).
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Path minus its final segment (`/x/file1.txt` -> `/x`).
///
/// A bare file name yields `.`; a root (or empty) path is returned as is.
pub fn dirname(path: &Path) -> String {
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => ".".to_string(),
        Some(parent) => parent.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

/// Everything after the last dot of the final segment, or empty when there
/// is no dot. A leading dot counts, so `.bashrc` has extension `bashrc`.
pub fn extension(path: &Path) -> String {
    basename(path)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_fixture_path() {
        let path = Path::new("/x/file1.txt");
        assert_eq!(name(path), "file1");
        assert_eq!(basename(path), "file1.txt");
        assert_eq!(dirname(path), "/x");
        assert_eq!(extension(path), "txt");
    }

    #[test]
    fn test_decompose_without_extension() {
        let path = Path::new("/var/log/syslog");
        assert_eq!(name(path), "syslog");
        assert_eq!(extension(path), "");
    }

    #[test]
    fn test_only_last_extension_counts() {
        let path = Path::new("backups/archive.tar.gz");
        assert_eq!(name(path), "archive.tar");
        assert_eq!(extension(path), "gz");
        assert_eq!(dirname(path), "backups");
    }

    #[test]
    fn test_dirname_edges() {
        assert_eq!(dirname(Path::new("file.txt")), ".");
        assert_eq!(dirname(Path::new("/file.txt")), "/");
        assert_eq!(dirname(Path::new("/")), "/");
        assert_eq!(dirname(Path::new("/x/dir/")), "/x");
    }

    #[test]
    fn test_dotfile_is_all_extension() {
        let path = Path::new("/home/me/.bashrc");
        assert_eq!(name(path), "");
        assert_eq!(basename(path), ".bashrc");
        assert_eq!(extension(path), "bashrc");
    }

    #[test]
    fn test_trailing_dot_gives_empty_extension() {
        let path = Path::new("/tmp/file.");
        assert_eq!(name(path), "file");
        assert_eq!(extension(path), "");
    }

    #[test]
    fn test_basename_of_root_is_empty() {
        assert_eq!(basename(Path::new("/")), "");
        assert_eq!(name(Path::new("/")), "");
    }

    #[test]
    fn test_check_path_len() {
        assert!(check_path_len(Path::new("/tmp/a"), 6).is_ok());
        let err = check_path_len(Path::new("/tmp/ab"), 6).unwrap_err();
        assert!(matches!(err, FsError::PathTooLong { limit: 6, .. }));
    }
}

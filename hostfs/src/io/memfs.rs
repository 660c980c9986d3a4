use super::Filesystem;
use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::mime::{MimeDetector, SniffMimeDetector, MIME_DIRECTORY};
use crate::tree;
use crate::util::paths::check_path_len;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

const MAX_LINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum Node {
    File {
        contents: Vec<u8>,
        mtime: SystemTime,
        atime: SystemTime,
    },
    Dir {
        mode: u32,
    },
    Symlink {
        target: PathBuf,
    },
}

type Nodes = BTreeMap<PathBuf, Node>;

/// In-memory filesystem for tests.
///
/// Paths are keys taken literally, the same way the host contract does no
/// normalization. `/` always exists as a directory. A relative path is
/// resolved against an implicit working directory, while the empty path
/// names nothing.
/// Symbolic links are resolved only when they are the final component.
pub struct MemFs {
    nodes: Mutex<Nodes>,
    refuse_removal: Mutex<HashSet<PathBuf>>,
    config: FsConfig,
    mime: Arc<dyn MimeDetector>,
}

impl fmt::Debug for MemFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemFs")
            .field("nodes", &self.nodes)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::with_config(FsConfig::default())
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FsConfig) -> Self {
        Self {
            nodes: Mutex::new(BTreeMap::new()),
            refuse_removal: Mutex::new(HashSet::new()),
            config,
            mime: Arc::new(SniffMimeDetector),
        }
    }

    pub fn with_mime_detector(mut self, detector: impl MimeDetector + 'static) -> Self {
        self.mime = Arc::new(detector);
        self
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
        let path = path.into();
        let mut nodes = self.nodes();
        ensure_parent(&mut nodes, &path);
        let now = SystemTime::now();
        nodes.insert(
            path,
            Node::File {
                contents: content.as_ref().to_vec(),
                mtime: now,
                atime: now,
            },
        );
    }

    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut nodes = self.nodes();
        ensure_parent(&mut nodes, &path);
        nodes.insert(path, Node::Dir { mode: 0o777 });
    }

    pub fn add_symlink(&self, link: impl Into<PathBuf>, target: impl Into<PathBuf>) {
        let link = link.into();
        let mut nodes = self.nodes();
        ensure_parent(&mut nodes, &link);
        nodes.insert(
            link,
            Node::Symlink {
                target: target.into(),
            },
        );
    }

    /// Makes every later attempt to remove the directory at `path` fail,
    /// the way a host refuses on a permission error.
    pub fn fail_remove_dir(&self, path: impl Into<PathBuf>) {
        self.refuse_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into());
    }

    /// `(mtime, atime)` of a file, following a final symlink.
    pub fn times(&self, path: &Path) -> Option<(SystemTime, SystemTime)> {
        match lookup(&self.nodes(), path) {
            Some((_, Node::File { mtime, atime, .. })) => Some((*mtime, *atime)),
            _ => None,
        }
    }

    pub fn mode(&self, path: &Path) -> Option<u32> {
        match lookup(&self.nodes(), path) {
            Some((_, Node::Dir { mode })) => Some(*mode),
            _ => None,
        }
    }

    fn nodes(&self) -> MutexGuard<'_, Nodes> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut nodes = self.nodes();
        let key = writable_target(&nodes, path).map_err(|source| FsError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let now = SystemTime::now();
        match nodes.get_mut(&key) {
            Some(Node::File {
                contents: existing,
                mtime,
                ..
            }) => {
                existing.extend_from_slice(contents);
                *mtime = now;
            }
            _ => {
                nodes.insert(
                    key,
                    Node::File {
                        contents: contents.to_vec(),
                        mtime: now,
                        atime: now,
                    },
                );
            }
        }
        Ok(())
    }
}

impl Filesystem for MemFs {
    fn exists(&self, path: &Path) -> Result<bool> {
        check_path_len(path, self.config.max_path_len)?;
        let found = lookup(&self.nodes(), path).is_some();
        Ok(is_root(path) || found)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match lookup(&self.nodes(), path) {
            Some((_, Node::File { contents, .. })) => Ok(contents.clone()),
            Some(_) => Err(FsError::ReadFailed {
                path: path.to_path_buf(),
                source: io_error(ErrorKind::Other, "is a directory"),
            }),
            None if is_root(path) => Err(FsError::ReadFailed {
                path: path.to_path_buf(),
                source: io_error(ErrorKind::Other, "is a directory"),
            }),
            None => Err(FsError::not_found(path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8], lock: bool) -> Result<()> {
        log::debug!("write {} ({} bytes, lock={})", path.display(), contents.len(), lock);
        let mut nodes = self.nodes();
        let key = writable_target(&nodes, path).map_err(|source| FsError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let now = SystemTime::now();
        nodes.insert(
            key,
            Node::File {
                contents: contents.to_vec(),
                mtime: now,
                atime: now,
            },
        );
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        log::debug!("copy {} -> {}", from.display(), to.display());
        let copy_failed = |source: io::Error| FsError::CopyFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        };
        let mut nodes = self.nodes();
        let (source_key, contents) = match lookup(&nodes, from) {
            Some((key, Node::File { contents, .. })) => (key, contents.clone()),
            Some(_) => return Err(copy_failed(io_error(ErrorKind::Other, "source is a directory"))),
            None => return Err(copy_failed(io_error(ErrorKind::NotFound, "source does not exist"))),
        };
        let key = writable_target(&nodes, to).map_err(copy_failed)?;
        if key == source_key {
            return Err(copy_failed(io_error(
                ErrorKind::InvalidInput,
                "source and destination are the same file",
            )));
        }
        let now = SystemTime::now();
        nodes.insert(
            key,
            Node::File {
                contents,
                mtime: now,
                atime: now,
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        log::debug!("move {} -> {}", from.display(), to.display());
        let move_failed = |kind: ErrorKind, msg: &str| FsError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: io_error(kind, msg),
        };
        let mut nodes = self.nodes();
        let Some(node) = nodes.get(from).cloned() else {
            return Err(move_failed(ErrorKind::NotFound, "source does not exist"));
        };
        if !parent_is_dir(&nodes, to) {
            return Err(move_failed(ErrorKind::NotFound, "destination parent does not exist"));
        }
        if matches!(lookup(&nodes, to), Some((_, Node::Dir { .. }))) {
            return Err(move_failed(ErrorKind::AlreadyExists, "destination is a directory"));
        }
        if from == to {
            return Ok(());
        }

        if let Node::Dir { .. } = node {
            if to.starts_with(from) {
                return Err(move_failed(ErrorKind::InvalidInput, "cannot move a directory into itself"));
            }
            let moved: Vec<PathBuf> = nodes
                .keys()
                .filter(|key| key.starts_with(from) && key.as_path() != from)
                .cloned()
                .collect();
            for key in moved {
                if let (Some(child), Ok(rel)) = (nodes.remove(&key), key.strip_prefix(from)) {
                    nodes.insert(to.join(rel), child);
                }
            }
        }
        nodes.remove(from);
        nodes.insert(to.to_path_buf(), node);
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> bool {
        log::debug!("append {} ({} bytes)", path.display(), contents.len());
        match self.try_append(path, contents) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("{err}");
                false
            }
        }
    }

    fn touch(&self, path: &Path, mtime: Option<SystemTime>, atime: Option<SystemTime>) -> Result<()> {
        log::debug!("touch {}", path.display());
        let mtime = mtime.unwrap_or_else(SystemTime::now);
        let atime = atime.unwrap_or(mtime);
        let mut nodes = self.nodes();

        if is_root(path) || matches!(lookup(&nodes, path), Some((_, Node::Dir { .. }))) {
            return Ok(());
        }
        let key = writable_target(&nodes, path).map_err(|source| FsError::TouchFailed {
            path: path.to_path_buf(),
            source,
        })?;
        match nodes.get_mut(&key) {
            Some(Node::File {
                mtime: m, atime: a, ..
            }) => {
                *m = mtime;
                *a = atime;
            }
            _ => {
                nodes.insert(
                    key,
                    Node::File {
                        contents: Vec::new(),
                        mtime,
                        atime,
                    },
                );
            }
        }
        Ok(())
    }

    fn unlink(&self, path: &Path) -> Result<()> {
        log::debug!("unlink {}", path.display());
        let unlink_failed = |kind: ErrorKind, msg: &str| FsError::UnlinkFailed {
            path: path.to_path_buf(),
            source: io_error(kind, msg),
        };
        let mut nodes = self.nodes();
        match nodes.get(path) {
            Some(Node::File { .. }) | Some(Node::Symlink { .. }) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(unlink_failed(ErrorKind::Other, "is a directory")),
            None => Err(unlink_failed(ErrorKind::NotFound, "no such file")),
        }
    }

    fn mkdir(&self, path: &Path, mode: u32, recursive: bool) -> Result<()> {
        log::debug!("mkdir {} (mode={:o}, recursive={})", path.display(), mode, recursive);
        let mkdir_failed = |kind: ErrorKind, msg: &str| FsError::MkdirFailed {
            path: path.to_path_buf(),
            source: io_error(kind, msg),
        };
        if is_empty(path) {
            return Err(mkdir_failed(ErrorKind::NotFound, "empty path"));
        }
        let mut nodes = self.nodes();
        if is_root(path) || lookup(&nodes, path).is_some() {
            return Err(mkdir_failed(ErrorKind::AlreadyExists, "already exists"));
        }

        if !recursive {
            if !parent_is_dir(&nodes, path) {
                return Err(mkdir_failed(ErrorKind::NotFound, "parent directory does not exist"));
            }
            nodes.insert(path.to_path_buf(), Node::Dir { mode });
            return Ok(());
        }

        let missing: Vec<PathBuf> = path
            .ancestors()
            .take_while(|dir| !is_empty(dir) && !is_dir_at(&nodes, dir))
            .map(Path::to_path_buf)
            .collect();
        if missing.iter().any(|dir| lookup(&nodes, dir).is_some()) {
            return Err(mkdir_failed(ErrorKind::Other, "an ancestor is not a directory"));
        }
        for dir in missing.into_iter().rev() {
            nodes.insert(dir, Node::Dir { mode });
        }
        Ok(())
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        log::debug!("rmdir {}", path.display());
        tree::remove_tree(self, path, self.config.rmdir_policy)
    }

    fn filesize(&self, path: &Path) -> Result<u64> {
        if !self.exists(path)? {
            return Err(FsError::not_found(path));
        }
        match lookup(&self.nodes(), path) {
            Some((_, Node::File { contents, .. })) => Ok(contents.len() as u64),
            _ => Ok(0),
        }
    }

    fn is_directory(&self, path: &Path) -> bool {
        is_dir_at(&self.nodes(), path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(lookup(&self.nodes(), path), Some((_, Node::File { .. })))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(self.nodes().get(path), Some(Node::Symlink { .. }))
    }

    fn mime_type(&self, path: &Path) -> Result<String> {
        if !self.exists(path)? {
            return Err(FsError::not_found(path));
        }
        let sample = match lookup(&self.nodes(), path) {
            Some((_, Node::File { contents, .. })) => {
                contents[..contents.len().min(self.config.mime_sample_len)].to_vec()
            }
            _ => return Ok(MIME_DIRECTORY.to_string()),
        };
        Ok(self.mime.detect(path, &sample))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let nodes = self.nodes();
        let dir = match lookup(&nodes, path) {
            Some((key, Node::Dir { .. })) => key,
            None if is_root(path) => path.to_path_buf(),
            _ => {
                return Err(FsError::ReadDirFailed {
                    path: path.to_path_buf(),
                    source: io_error(ErrorKind::NotFound, "not a directory"),
                })
            }
        };
        let entries = children(&nodes, &dir).cloned().collect();
        Ok(entries)
    }

    fn remove_empty_dir(&self, path: &Path) -> Result<()> {
        let rmdir_failed = |kind: ErrorKind, msg: &str| FsError::RmdirFailed {
            path: path.to_path_buf(),
            source: io_error(kind, msg),
        };
        if self
            .refuse_removal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
        {
            return Err(rmdir_failed(ErrorKind::PermissionDenied, "permission denied"));
        }
        let mut nodes = self.nodes();
        if !matches!(nodes.get(path), Some(Node::Dir { .. })) {
            return Err(rmdir_failed(ErrorKind::NotFound, "not a directory"));
        }
        if children(&nodes, path).next().is_some() {
            return Err(rmdir_failed(ErrorKind::DirectoryNotEmpty, "directory not empty"));
        }
        nodes.remove(path);
        Ok(())
    }
}

fn io_error(kind: ErrorKind, msg: &str) -> io::Error {
    io::Error::new(kind, msg.to_string())
}

fn is_root(path: &Path) -> bool {
    path == Path::new("/")
}

fn is_empty(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

/// Follows symlinks at the final component. Returns the key the chain ends at.
fn lookup<'a>(nodes: &'a Nodes, path: &Path) -> Option<(PathBuf, &'a Node)> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        match nodes.get(&current)? {
            Node::Symlink { target } => current = target.clone(),
            node => return Some((current, node)),
        }
    }
    None
}

fn is_dir_at(nodes: &Nodes, path: &Path) -> bool {
    is_root(path) || matches!(lookup(nodes, path), Some((_, Node::Dir { .. })))
}

fn parent_is_dir(nodes: &Nodes, path: &Path) -> bool {
    path.parent()
        .map_or(true, |parent| is_empty(parent) || is_dir_at(nodes, parent))
}

fn children<'a>(nodes: &'a Nodes, dir: &'a Path) -> impl Iterator<Item = &'a PathBuf> + 'a {
    nodes.keys().filter(move |key| key.parent() == Some(dir))
}

/// Key a write to `path` lands on: the file a final symlink points to, or
/// `path` itself when nothing is there yet.
fn writable_target(nodes: &Nodes, path: &Path) -> io::Result<PathBuf> {
    match lookup(nodes, path) {
        Some((key, Node::File { .. })) => Ok(key),
        Some(_) => Err(io_error(ErrorKind::Other, "is a directory")),
        None if is_root(path) => Err(io_error(ErrorKind::Other, "is a directory")),
        None if is_empty(path) => Err(io_error(ErrorKind::NotFound, "empty path")),
        None if !parent_is_dir(nodes, path) => {
            Err(io_error(ErrorKind::NotFound, "parent directory does not exist"))
        }
        None => Ok(path.to_path_buf()),
    }
}

fn ensure_parent(nodes: &mut Nodes, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if is_root(dir) || is_empty(dir) || nodes.contains_key(dir) {
            break;
        }
        nodes.insert(dir.to_path_buf(), Node::Dir { mode: 0o777 });
        current = dir.parent();
    }
}

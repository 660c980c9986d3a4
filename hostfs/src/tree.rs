//! Recursive directory removal shared by every [`Filesystem`].
//!
//! Traversal is depth-first over an explicit stack. A child that is a
//! directory and not a symlink is descended into; anything else (files,
//! symlinks, including links to directories) is unlinked as a leaf, so linked
//! cycles are never followed. Each directory is removed once its children are
//! gone.

use crate::config::RmdirPolicy;
use crate::error::{FsError, Result};
use crate::io::Filesystem;
use std::path::{Path, PathBuf};

pub fn remove_tree<F>(fs: &F, root: &Path, policy: RmdirPolicy) -> Result<()>
where
    F: Filesystem + ?Sized,
{
    if !fs.is_directory(root) {
        return Err(FsError::not_found(root));
    }

    // (directory, children already handled)
    let mut stack: Vec<(PathBuf, bool)> = vec![(root.to_path_buf(), false)];

    while let Some((dir, drained)) = stack.pop() {
        if drained {
            remove_dir(fs, &dir, policy)?;
            continue;
        }

        stack.push((dir.clone(), true));
        for child in fs.read_dir(&dir)? {
            if fs.is_directory(&child) && !fs.is_symlink(&child) {
                stack.push((child, false));
            } else {
                fs.unlink(&child)?;
            }
        }
    }

    Ok(())
}

fn remove_dir<F>(fs: &F, dir: &Path, policy: RmdirPolicy) -> Result<()>
where
    F: Filesystem + ?Sized,
{
    match fs.remove_empty_dir(dir) {
        Ok(()) => Ok(()),
        Err(err) => match policy {
            RmdirPolicy::Strict => Err(err),
            RmdirPolicy::BestEffort => {
                log::warn!("Ignoring failure to remove directory {}: {}", dir.display(), err);
                Ok(())
            }
        },
    }
}

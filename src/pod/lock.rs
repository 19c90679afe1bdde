//! Pod directory locking.
//!
//! Owners of a pod (preparation, stage1 while running, GC while deleting)
//! hold an exclusive `flock` on the pod directory. Readers take a shared
//! lock without blocking: success pins the directory against destructive
//! owners for the lifetime of the handle; contention tells the reader an
//! owner is active.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Non-exclusive lock on a pod directory.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
    /// Open directory; `None` after release.
    file: Option<File>,
    /// Another process held the exclusive lock when we tried.
    held_elsewhere: bool,
}

impl DirLock {
    /// Opens `path` and tries to take a shared lock on it.
    ///
    /// Fails with an [`io::ErrorKind::NotFound`] I/O error if the directory
    /// does not exist.
    pub fn try_shared(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let held_elsewhere = match FileExt::try_lock_shared(&file) {
            Ok(()) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!("{} is exclusively locked by its owner", path.display());
                true
            }
            Err(source) => {
                return Err(Error::Lock {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            held_elsewhere,
        })
    }

    /// Whether an owner held the exclusive lock at acquisition time.
    pub fn is_held_elsewhere(&self) -> bool {
        self.held_elsewhere
    }

    /// Whether this handle holds the shared lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some() && !self.held_elsewhere
    }

    /// Releases the lock. Dropping the handle has the same effect but
    /// swallows errors.
    pub fn release(mut self) -> Result<()> {
        self.unlock()
    }

    fn unlock(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        if !self.held_elsewhere {
            FileExt::unlock(&file).map_err(|source| Error::Lock {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.unlock();
    }
}

//! Advisory lock on a store directory.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";

/// Exclusive advisory lock on `<root>/LOCK`, held until dropped.
///
/// The lock only keeps two cooperating engines off the same directory; the
/// engine itself never takes it implicitly.
#[derive(Debug)]
pub(crate) struct StoreLock {
    path: PathBuf,
    file: File,
}

impl StoreLock {
    pub(crate) fn acquire(root: &Path) -> CoreResult<Self> {
        let path = root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }
        debug!(path = %path.display(), "acquired store lock");
        Ok(Self { path, file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(path = %self.path.display(), "released store lock");
    }
}

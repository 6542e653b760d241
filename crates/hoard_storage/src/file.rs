//! File-based record store for persistent storage.

use crate::error::{StorageError, StorageResult};
use crate::name::{validate_name, Namespace};
use crate::store::RecordStore;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Suffix of the scratch file used for atomic replacement.
const TEMP_SUFFIX: &str = ".tmp";

/// A file-based record store.
///
/// Each record is one file named after the record, inside a directory per
/// namespace:
///
/// ```text
/// <root>/
/// ├─ objects/      # ordinary records, e.g. objects/USER.1A
/// ├─ indexes/      # e.g. indexes/user.email
/// ├─ groupings/
/// ├─ rels/         # e.g. rels/members_left_to_right
/// └─ system/       # system/system
/// ```
///
/// # Durability
///
/// Writes use the write-then-rename pattern: the payload is written to a
/// scratch file, synced, and renamed over the record file. A crash leaves
/// either the old or the new payload, never a torn one.
///
/// # Example
///
/// ```no_run
/// use hoard_storage::{FileRecordStore, Namespace, RecordStore};
/// use std::path::Path;
///
/// let mut store = FileRecordStore::open(Path::new("data")).unwrap();
/// store.write(Namespace::Object, "USER.1", b"{\"id\":\"USER.1\"}").unwrap();
/// store.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Opens or creates a record store rooted at `root`.
    ///
    /// Missing namespace directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created or `root`
    /// exists but is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        if root.exists() && !root.is_dir() {
            return Err(StorageError::Corrupted(format!(
                "store root is not a directory: {}",
                root.display()
            )));
        }
        for namespace in Namespace::ALL {
            fs::create_dir_all(root.join(namespace.dir_name()))?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    fn record_path(&self, namespace: Namespace, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.namespace_dir(namespace).join(name))
    }

    #[cfg(unix)]
    fn sync_dir(dir: &Path) -> StorageResult<()> {
        File::open(dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(_dir: &Path) -> StorageResult<()> {
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn exists(&self, namespace: Namespace, name: &str) -> StorageResult<bool> {
        Ok(self.record_path(namespace, name)?.is_file())
    }

    fn read(&self, namespace: Namespace, name: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.record_path(namespace, name)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, namespace: Namespace, name: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.record_path(namespace, name)?;
        let temp_path = self
            .namespace_dir(namespace)
            .join(format!(".{name}{TEMP_SUFFIX}"));

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn delete(&mut self, namespace: Namespace, name: &str) -> StorageResult<bool> {
        let path = self.record_path(namespace, name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn modified(&self, namespace: Namespace, name: &str) -> StorageResult<Option<SystemTime>> {
        let path = self.record_path(namespace, name)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, namespace: Namespace) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.namespace_dir(namespace))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Scratch files and anything we would not have written are skipped.
            if let Some(name) = entry.file_name().to_str() {
                if validate_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn sync(&mut self) -> StorageResult<()> {
        for namespace in Namespace::ALL {
            Self::sync_dir(&self.namespace_dir(namespace))?;
        }
        Ok(())
    }
}

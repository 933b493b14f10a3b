#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use schedule_gate_contracts::pending::{LegacyZone, PendingChange};

use crate::repo::{PendingSlotRepo, SlotLoad, StorageError};

/// Slot persisted as one JSON file, replaced via temp file + rename.
///
/// Cross-process read-modify-write is serialized with an advisory `flock` on a sibling
/// `<file>.lock`, so the data file itself is only ever swapped whole.
#[derive(Debug, Clone)]
pub struct FilePendingSlot {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FilePendingSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, ".lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn ensure_parent_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                    op: "create_dir",
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        Ok(())
    }

    fn atomic_write(&self, data: &[u8]) -> Result<(), StorageError> {
        let tmp = sibling(&self.path, &format!(".tmp.{}", std::process::id()));
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
            Ok(())
        };
        if let Err(source) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::Io {
                op: "write",
                path: tmp,
                source,
            });
        }
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StorageError::Io {
                op: "rename",
                path: self.path.clone(),
                source,
            }
        })?;
        sync_parent_dir(&self.path).map_err(|source| StorageError::Io {
            op: "sync_dir",
            path: self.path.clone(),
            source,
        })
    }
}

impl PendingSlotRepo for FilePendingSlot {
    fn load_slot(&self, legacy_zone: LegacyZone) -> Result<SlotLoad, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(SlotLoad::decode(&bytes, legacy_zone)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(SlotLoad::Absent),
            Err(source) => Err(StorageError::Io {
                op: "read",
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn store_slot(&self, change: &PendingChange) -> Result<(), StorageError> {
        self.ensure_parent_dir()?;
        let serialized = change.encode_json()?;
        self.atomic_write(&serialized)
    }

    fn clear_slot(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                op: "remove",
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn with_slot_exclusive<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<StorageError>,
    {
        self.ensure_parent_dir()?;
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|source| StorageError::Lock {
                path: self.lock_path.clone(),
                source,
            })?;
        FileExt::lock_exclusive(&lock_file).map_err(|source| StorageError::Lock {
            path: self.lock_path.clone(),
            source,
        })?;
        let result = op();
        // Closing the descriptor releases the flock even if unlock fails.
        let _ = FileExt::unlock(&lock_file);
        drop(lock_file);
        result
    }
}

/// Flushes the directory entry of `path` so a completed rename survives a crash.
#[cfg(unix)]
pub fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
pub fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

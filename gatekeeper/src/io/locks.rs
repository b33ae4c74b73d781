//! Keyed exclusive locks: an in-process mutex per key plus an `fs2` lock file
//! so other processes sharing the data directory serialize too.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use fs2::FileExt;
use tracing::warn;

use crate::error::LockError;

#[derive(Debug)]
pub struct LockTable {
    dir: PathBuf,
    keys: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// `key` becomes a file name; callers pass validated ids only.
    pub fn with<T, E, F>(&self, key: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<LockError>,
    {
        let slot = {
            let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(keys.entry(key.to_string()).or_default())
        };
        // Writes under the lock are atomic renames; a poisoned slot holds no partial state.
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let lock_path = self.dir.join(format!("{key}.lock"));
        let file = open_lock_file(&lock_path)?;
        FileExt::lock_exclusive(&file).map_err(|source| LockError {
            path: lock_path.clone(),
            source,
        })?;
        let result = f();
        if let Err(err) = FileExt::unlock(&file) {
            warn!(path = %lock_path.display(), error = %err, "failed to release lock file");
        }
        result
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    let to_lock_err = |source| LockError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_lock_err)?;
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(to_lock_err)
}

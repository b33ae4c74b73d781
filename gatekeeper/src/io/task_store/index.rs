//! `tasks/index.json`: a rebuildable id -> file cache.
//!
//! Records are the source of truth. A missing or unreadable index is treated
//! as absent and rebuilt by rescanning.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::io::atomic::write_atomic;

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIndex {
    pub version: u32,
    /// Task id -> record path relative to the tasks directory, `/`-separated.
    pub entries: BTreeMap<String, String>,
}

impl Default for TaskIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Load the index; `None` when it is missing, unreadable, or a newer version.
pub fn load_index(path: &Path) -> Option<TaskIndex> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "task index unreadable; rescanning");
            return None;
        }
    };
    match serde_json::from_str::<TaskIndex>(&contents) {
        Ok(index) if index.version == INDEX_VERSION => Some(index),
        Ok(index) => {
            warn!(version = index.version, "unsupported task index version; rescanning");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "task index corrupt; rescanning");
            None
        }
    }
}

pub fn write_index(path: &Path, index: &TaskIndex) -> Result<(), StoreError> {
    let mut buf = serde_json::to_string_pretty(index)
        .map_err(|err| StoreError::corrupt(path, err.to_string()))?;
    buf.push('\n');
    write_atomic(path, buf.as_bytes()).map_err(|err| StoreError::io(path, err))
}

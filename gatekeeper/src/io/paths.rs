//! Layout of the gatekeeper data directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "GATEKEEPER_DATA";
/// Data directory used when neither flag nor env var is given.
pub const DEFAULT_DATA_DIR: &str = ".gatekeeper";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub tasks_dir: PathBuf,
    pub index_path: PathBuf,
    pub task_locks_dir: PathBuf,
    pub sessions_dir: PathBuf,
    pub session_locks_dir: PathBuf,
    pub audit_dir: PathBuf,
}

impl DataPaths {
    pub fn new(root: &Path) -> Self {
        let tasks_dir = root.join("tasks");
        let sessions_dir = root.join("sessions");
        Self {
            root: root.to_path_buf(),
            config_path: root.join("config.toml"),
            index_path: tasks_dir.join("index.json"),
            task_locks_dir: tasks_dir.join(".locks"),
            tasks_dir,
            session_locks_dir: sessions_dir.join(".locks"),
            sessions_dir,
            audit_dir: root.join("audit"),
        }
    }

    /// Canonical location of a task record.
    pub fn task_file(&self, id: &str) -> PathBuf {
        self.tasks_dir.join(format!("{id}.md"))
    }

    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    pub fn audit_file(&self, session_id: &str) -> PathBuf {
        self.audit_dir.join(format!("{session_id}.jsonl"))
    }
}

/// `--data-dir`, else `$GATEKEEPER_DATA`, else `.gatekeeper`.
pub fn resolve_root(flag: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

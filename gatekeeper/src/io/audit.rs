//! Append-only audit trail: one JSON line per evaluated event, one file per
//! session under `<data>/audit/<session>.jsonl`.
//!
//! Unlike `tracing` output, audit records are product artifacts: they are
//! always written and are not affected by `RUST_LOG`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::event::EventKind;
use crate::core::task::is_valid_id;
use crate::core::verdict::TraceEntry;
use crate::error::{EnforceError, SessionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_gate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocking_reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Gates in the order they ran, stopping at the first block.
    pub trace: Vec<TraceEntry>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one record. Each record is a single `write_all` of a full line
    /// on an `O_APPEND` handle, so concurrent writers never interleave.
    ///
    /// The session id names the file, so ids that could leave the audit
    /// directory are rejected.
    pub fn append(&self, record: &AuditRecord) -> Result<(), EnforceError> {
        if !is_valid_id(&record.session_id) {
            return Err(SessionError::InvalidId(record.session_id.clone()).into());
        }
        let path = self.path_for(&record.session_id);
        let audit_err = |source| EnforceError::Audit {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(audit_err)?;
        let mut line = serde_json::to_string(record)
            .map_err(|err| audit_err(std::io::Error::other(err)))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(audit_err)?;
        file.write_all(line.as_bytes()).map_err(audit_err)
    }
}

/// Read every record of an audit file (used by `audit show`).
pub fn read_records(path: &Path) -> anyhow::Result<Vec<AuditRecord>> {
    use anyhow::Context;
    let contents =
        fs::read_to_string(path).with_context(|| format!("read audit {}", path.display()))?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} record {}", path.display(), n + 1))
        })
        .collect()
}

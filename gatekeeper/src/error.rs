//! Typed domain errors.
//!
//! Stores, the router, and the enforcer return these enums so callers can
//! branch on the failure kind. The CLI wraps them in `anyhow` and maps them to
//! exit codes by downcasting (see [`crate::exit_codes::for_error`]).

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::TaskStatus;

/// Failure to acquire a keyed lock (in-process mutex + lock file).
#[derive(Debug, Error)]
#[error("lock {path}: {source}")]
pub struct LockError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: '{0}'")]
    NotFound(String),

    #[error("task already exists: '{0}'")]
    DuplicateId(String),

    #[error("invalid parent '{parent}' for task '{id}': {reason}")]
    InvalidParent {
        id: String,
        parent: String,
        reason: String,
    },

    #[error("storage conflict on '{id}': expected version {expected}, stored version {actual}")]
    StorageConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid transition for '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("dependency '{id}' -> '{dep_id}' would create a cycle")]
    CycleDetected { id: String, dep_id: String },

    #[error("invalid task: {0}")]
    Validation(String),

    #[error("corrupt task record {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("task storage i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session id '{0}'")]
    InvalidId(String),

    #[error("corrupt session state {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("session storage i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Lock(#[from] LockError),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("unrecognized host event '{0}'")]
    UnrecognizedEvent(String),

    #[error("invalid {event} payload: {message}")]
    Validation { event: String, message: String },
}

impl RouteError {
    pub(crate) fn validation(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            event: event.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnforceError {
    #[error("unknown session '{0}' (no SessionStart recorded)")]
    UnknownSession(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("audit write failed for {path}: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("gate evaluation fault: {0}")]
    GateFault(String),
}

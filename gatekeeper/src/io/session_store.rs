//! Per-session state files under `<data>/sessions/<id>.json`.
//!
//! Callers serialize all events of one session with [`SessionStore::lock`];
//! load/save themselves take no lock.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::core::session::SessionState;
use crate::core::task::is_valid_id;
use crate::error::{LockError, SessionError};
use crate::io::atomic::write_atomic;
use crate::io::locks::LockTable;
use crate::io::paths::DataPaths;

#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    paths: DataPaths,
    locks: LockTable,
}

impl SessionStore {
    pub fn open(paths: &DataPaths) -> Result<Self, SessionError> {
        fs::create_dir_all(&paths.sessions_dir).map_err(|source| SessionError::Io {
            path: paths.sessions_dir.clone(),
            source,
        })?;
        Ok(Self {
            inner: Arc::new(Inner {
                paths: paths.clone(),
                locks: LockTable::new(&paths.session_locks_dir),
            }),
        })
    }

    /// Run `f` holding the session's exclusive lock.
    pub fn lock<T, E, F>(&self, session_id: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<SessionError> + From<LockError>,
    {
        check_id(session_id)?;
        self.inner.locks.with(session_id, f)
    }

    pub fn load(&self, session_id: &str) -> Result<Option<SessionState>, SessionError> {
        check_id(session_id)?;
        let path = self.inner.paths.session_file(session_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        let state: SessionState =
            serde_json::from_str(&contents).map_err(|err| SessionError::Corrupt {
                path: path.clone(),
                message: err.to_string(),
            })?;
        if state.session_id != session_id {
            return Err(SessionError::Corrupt {
                path,
                message: format!("file holds session '{}'", state.session_id),
            });
        }
        Ok(Some(state))
    }

    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        check_id(&state.session_id)?;
        let path = self.inner.paths.session_file(&state.session_id);
        let mut buf = serde_json::to_string_pretty(state).map_err(|err| SessionError::Corrupt {
            path: path.clone(),
            message: err.to_string(),
        })?;
        buf.push('\n');
        write_atomic(&path, buf.as_bytes()).map_err(|source| SessionError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(session = %state.session_id, phase = %state.phase, "session saved");
        Ok(())
    }

    /// Load, modify, and save a session under its lock. `None` when the
    /// session does not exist.
    pub fn update<F>(&self, session_id: &str, f: F) -> Result<Option<SessionState>, SessionError>
    where
        F: FnOnce(&mut SessionState),
    {
        self.lock(session_id, || {
            let Some(mut state) = self.load(session_id)? else {
                return Ok(None);
            };
            f(&mut state);
            state.updated_at = Utc::now().max(state.updated_at);
            self.save(&state)?;
            Ok(Some(state))
        })
    }

    /// Delete a session file. Missing files are fine.
    pub fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        check_id(session_id)?;
        let path = self.inner.paths.session_file(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionError::Io { path, source }),
        }
    }
}

/// Session ids become file names.
fn check_id(session_id: &str) -> Result<(), SessionError> {
    if is_valid_id(session_id) {
        Ok(())
    } else {
        Err(SessionError::InvalidId(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Phase;
    use crate::test_support::{TestEnv, session};

    #[test]
    fn save_then_load() {
        let env = TestEnv::new();
        let store = env.sessions();
        assert!(store.load("s1").expect("load").is_none());
        let state = session("s1", Phase::Hydrate);
        store.save(&state).expect("save");
        assert_eq!(store.load("s1").expect("load"), Some(state));
        store.remove("s1").expect("remove");
        store.remove("s1").expect("remove twice");
        assert!(store.load("s1").expect("load").is_none());
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let env = TestEnv::new();
        let store = env.sessions();
        assert!(matches!(
            store.load("../escape"),
            Err(SessionError::InvalidId(_))
        ));
    }

    #[test]
    fn corrupt_state_is_reported() {
        let env = TestEnv::new();
        let store = env.sessions();
        fs::write(env.paths.session_file("s1"), "{").expect("write");
        assert!(matches!(
            store.load("s1"),
            Err(SessionError::Corrupt { .. })
        ));
    }

    #[test]
    fn update_changes_existing_sessions_only() {
        let env = TestEnv::new();
        let store = env.sessions();
        let missing = store
            .update("s1", |state| state.custodiet_block = Some("x".to_string()))
            .expect("update");
        assert!(missing.is_none());
        assert!(store.load("s1").expect("load").is_none());

        store.save(&session("s1", Phase::Orchestrate)).expect("save");
        let updated = store
            .update("s1", |state| state.custodiet_block = Some("drift".to_string()))
            .expect("update")
            .expect("session");
        assert_eq!(updated.custodiet_block.as_deref(), Some("drift"));
        assert_eq!(store.load("s1").expect("load"), Some(updated));
    }

    #[test]
    fn lock_passes_closure_result() {
        let env = TestEnv::new();
        let store = env.sessions();
        let value = store
            .lock("s1", || Ok::<_, SessionError>(7))
            .expect("locked");
        assert_eq!(value, 7);
    }
}

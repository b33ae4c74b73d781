//! Stable exit codes for gatekeeper CLI commands.

use crate::error::{EnforceError, RouteError, SessionError, StoreError};

/// Command succeeded. A blocked verdict is still a success.
pub const OK: i32 = 0;
/// Internal fault (storage, lock, corrupt record, gate fault).
pub const FAULT: i32 = 1;
/// Malformed input: validation error, unrecognized event, bad CLI arguments.
pub const INVALID: i32 = 2;
/// Task command lost a race or broke a graph rule (version, cycle, transition).
pub const CONFLICT: i32 = 3;

/// Map an error chain to an exit code.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if let Some(store) = err.downcast_ref::<StoreError>() {
        return for_store(store);
    }
    if err.downcast_ref::<RouteError>().is_some() {
        return INVALID;
    }
    if let Some(session) = err.downcast_ref::<SessionError>() {
        return match session {
            SessionError::InvalidId(_) => INVALID,
            _ => FAULT,
        };
    }
    if let Some(enforce) = err.downcast_ref::<EnforceError>() {
        return match enforce {
            EnforceError::UnknownSession(_) => INVALID,
            EnforceError::Store(store) => for_store(store),
            EnforceError::Session(SessionError::InvalidId(_)) => INVALID,
            _ => FAULT,
        };
    }
    FAULT
}

fn for_store(err: &StoreError) -> i32 {
    match err {
        StoreError::StorageConflict { .. }
        | StoreError::CycleDetected { .. }
        | StoreError::InvalidTransition { .. } => CONFLICT,
        StoreError::NotFound(_)
        | StoreError::DuplicateId(_)
        | StoreError::InvalidParent { .. }
        | StoreError::Validation(_) => INVALID,
        StoreError::Corrupt { .. } | StoreError::Io { .. } | StoreError::Lock(_) => FAULT,
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn conflicts_survive_context_wrapping() {
        let err: anyhow::Error = Err::<(), _>(StoreError::StorageConflict {
            id: "t1".to_string(),
            expected: 1,
            actual: 2,
        })
        .context("update task t1")
        .expect_err("error");
        assert_eq!(for_error(&err), CONFLICT);
    }

    #[test]
    fn route_errors_are_invalid_input() {
        let err = anyhow::Error::new(RouteError::UnrecognizedEvent("PreCompact".to_string()));
        assert_eq!(for_error(&err), INVALID);
    }

    #[test]
    fn untyped_errors_are_faults() {
        assert_eq!(for_error(&anyhow::anyhow!("boom")), FAULT);
    }
}

//! Allowed task status transitions.

use crate::core::types::TaskStatus;

/// Whether a task may move from `from` to `to`.
///
/// Same-status patches are not transitions; callers check that first.
pub fn is_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    match (from, to) {
        (TaskStatus::Inbox, TaskStatus::Active)
        | (TaskStatus::Active, TaskStatus::Blocked)
        | (TaskStatus::Blocked, TaskStatus::Active)
        | (TaskStatus::Active, TaskStatus::Completed) => true,
        (from, TaskStatus::Archived) => from != TaskStatus::Archived,
        _ => false,
    }
}

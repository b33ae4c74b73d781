//! Pure graph queries over task records: reachability, readiness, ordering.
//!
//! Reachability takes a lookup closure so the store can answer it from disk
//! without materializing the whole graph.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::core::task::TaskNode;
use crate::core::types::TaskStatus;

/// Whether `target` is reachable from `from` by following dependency edges.
pub fn reaches<E, F>(from: &str, target: &str, mut deps_of: F) -> Result<bool, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    let mut stack = vec![from.to_string()];
    let mut seen = HashSet::new();
    while let Some(current) = stack.pop() {
        if current == target {
            return Ok(true);
        }
        if !seen.insert(current.clone()) {
            continue;
        }
        for dep in deps_of(&current)? {
            if !seen.contains(&dep) {
                stack.push(dep);
            }
        }
    }
    Ok(false)
}

/// Whether adding the edge `id -> dep_id` would close a cycle.
pub fn would_cycle<E, F>(id: &str, dep_id: &str, deps_of: F) -> Result<bool, E>
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
{
    if id == dep_id {
        return Ok(true);
    }
    reaches(dep_id, id, deps_of)
}

/// Whether `ancestor` appears on the parent chain starting at `start`.
///
/// The walk is bounded by the visited set, so a malformed chain cannot loop.
pub fn has_ancestor<E, F>(start: &str, ancestor: &str, mut parent_of: F) -> Result<bool, E>
where
    F: FnMut(&str) -> Result<Option<String>, E>,
{
    let mut seen = HashSet::new();
    let mut current = Some(start.to_string());
    while let Some(id) = current {
        if id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id.clone()) {
            return Ok(false);
        }
        current = parent_of(&id)?;
    }
    Ok(false)
}

/// Ready: workable status and every dependency completed.
///
/// A dependency missing from `statuses` counts as unmet.
pub fn is_ready(task: &TaskNode, statuses: &HashMap<String, TaskStatus>) -> bool {
    task.status.is_workable()
        && task
            .dependency_ids
            .iter()
            .all(|dep| statuses.get(dep) == Some(&TaskStatus::Completed))
}

/// Priority first (0 = most urgent), then creation time, then id.
pub fn priority_order(a: &TaskNode, b: &TaskNode) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Creation time, then id.
pub fn insertion_order(a: &TaskNode, b: &TaskNode) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

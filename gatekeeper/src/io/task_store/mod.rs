//! Durable task graph store.
//!
//! One record file per task under `<data>/tasks/` is the source of truth. Each
//! task is version-guarded and mutated under its own keyed lock; there is no
//! global lock. Edge insertions additionally share one `_edges` lock so the
//! cycle check and the write cannot interleave with another insertion. The
//! `index.json` cache maps ids to files and is rebuilt by rescanning whenever
//! it is missing or stale, so records may be moved into subdirectories.

pub mod index;
pub mod record;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::core::graph;
use crate::core::task::{
    NewTask, TaskNode, TaskPatch, generate_id, id_candidates, is_valid_id, validate_priority,
    validate_title,
};
use crate::core::transitions;
use crate::core::types::{TaskStatus, TaskType};
use crate::error::StoreError;
use crate::io::locks::LockTable;
use crate::io::paths::DataPaths;

use self::index::{TaskIndex, load_index, write_index};
use self::record::{read_record, write_record};

/// Lock keys that cannot collide with task ids (ids start alphanumeric).
const EDGES_LOCK: &str = "_edges";
const INDEX_LOCK: &str = "_index";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    /// Creation time, then id.
    #[default]
    Insertion,
    /// Priority, then creation time, then id.
    Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub parent: Option<String>,
    pub include_archived: bool,
    pub order: ListOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadyFilter {
    pub task_type: Option<TaskType>,
    pub parent: Option<String>,
}

impl ReadyFilter {
    fn matches(&self, task: &TaskNode) -> bool {
        self.task_type.is_none_or(|t| task.task_type == t)
            && self
                .parent
                .as_deref()
                .is_none_or(|p| task.parent_id.as_deref() == Some(p))
    }
}

/// Ready tasks over a snapshot taken when the sequence was created.
///
/// The snapshot (every record, in priority order) is read eagerly by
/// [`TaskStore::ready`]; the status, filter, and dependency checks run as the
/// iterator advances. Cloning or [`Ready::restart`] replays the same
/// snapshot; calling [`TaskStore::ready`] again takes a fresh one.
#[derive(Debug, Clone)]
pub struct Ready {
    snapshot: Arc<[TaskNode]>,
    statuses: Arc<HashMap<String, TaskStatus>>,
    filter: Arc<ReadyFilter>,
    pos: usize,
}

impl Ready {
    pub fn restart(&self) -> Ready {
        Ready {
            pos: 0,
            ..self.clone()
        }
    }
}

impl Iterator for Ready {
    type Item = TaskNode;

    fn next(&mut self) -> Option<TaskNode> {
        while let Some(task) = self.snapshot.get(self.pos) {
            self.pos += 1;
            if task.status.is_workable()
                && self.filter.matches(task)
                && graph::is_ready(task, &self.statuses)
            {
                return Some(task.clone());
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    paths: DataPaths,
    locks: LockTable,
}

impl TaskStore {
    pub fn open(paths: &DataPaths) -> Result<Self, StoreError> {
        fs::create_dir_all(&paths.tasks_dir)
            .map_err(|err| StoreError::io(&paths.tasks_dir, err))?;
        Ok(Self {
            inner: Arc::new(Inner {
                paths: paths.clone(),
                locks: LockTable::new(&paths.task_locks_dir),
            }),
        })
    }

    pub fn create(&self, new: NewTask) -> Result<TaskNode, StoreError> {
        self.create_at(new, Utc::now())
    }

    /// `create` with an explicit creation time.
    pub fn create_at(&self, new: NewTask, now: DateTime<Utc>) -> Result<TaskNode, StoreError> {
        validate_title(&new.title).map_err(StoreError::Validation)?;
        validate_priority(new.priority).map_err(StoreError::Validation)?;
        if let Some(id) = &new.id
            && !is_valid_id(id)
        {
            return Err(StoreError::Validation(format!(
                "invalid task id '{id}' (letters, digits, '-' and '_', starting alphanumeric)"
            )));
        }
        let label = new.id.clone().unwrap_or_else(|| new.title.clone());
        if let Some(parent) = &new.parent_id {
            self.check_parent_exists(&label, parent)?;
        }
        for dep in &new.dependency_ids {
            self.get(dep, false)?;
        }

        let template = TaskNode {
            id: String::new(),
            title: new.title,
            task_type: new.task_type,
            status: TaskStatus::Inbox,
            priority: new.priority,
            parent_id: new.parent_id,
            dependency_ids: new.dependency_ids,
            body: new.body,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        if let Some(id) = new.id {
            return self.insert(TaskNode { id, ..template });
        }
        let base = generate_id(&template.title, now.date_naive());
        for candidate in id_candidates(&base) {
            match self.insert(TaskNode {
                id: candidate,
                ..template.clone()
            }) {
                Err(StoreError::DuplicateId(taken)) => debug!(id = %taken, "generated id taken"),
                other => return other,
            }
        }
        Err(StoreError::Validation(format!("no free id for '{base}'")))
    }

    /// Fetch a task. Archived tasks are `NotFound` unless `include_archived`.
    pub fn get(&self, id: &str, include_archived: bool) -> Result<TaskNode, StoreError> {
        match self.load(id)? {
            Some((_, task)) if include_archived || task.status != TaskStatus::Archived => Ok(task),
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }

    pub fn update(
        &self,
        id: &str,
        patch: TaskPatch,
        expected_version: u64,
    ) -> Result<TaskNode, StoreError> {
        self.inner.locks.with(id, || {
            let (path, current) = self.load_live(id)?;
            if current.version != expected_version {
                return Err(StoreError::StorageConflict {
                    id: id.to_string(),
                    expected: expected_version,
                    actual: current.version,
                });
            }

            let mut next = current.clone();
            if let Some(status) = patch.status {
                if status != current.status && !transitions::is_allowed(current.status, status) {
                    return Err(StoreError::InvalidTransition {
                        id: id.to_string(),
                        from: current.status,
                        to: status,
                    });
                }
                next.status = status;
            }
            if let Some(title) = patch.title {
                validate_title(&title).map_err(StoreError::Validation)?;
                next.title = title;
            }
            if let Some(priority) = patch.priority {
                validate_priority(priority).map_err(StoreError::Validation)?;
                next.priority = priority;
            }
            if let Some(task_type) = patch.task_type {
                next.task_type = task_type;
            }
            if let Some(parent) = patch.parent_id {
                if let Some(parent_id) = &parent {
                    self.check_reparent(id, parent_id)?;
                }
                next.parent_id = parent;
            }
            if let Some(body) = patch.body {
                next.body = body;
            }

            self.commit(&path, &current, next)
        })
    }

    /// Add the edge `id -> dep_id` ("`id` depends on `dep_id`").
    ///
    /// Adding an existing edge returns the task unchanged.
    pub fn add_dependency(&self, id: &str, dep_id: &str) -> Result<TaskNode, StoreError> {
        let cycle = || StoreError::CycleDetected {
            id: id.to_string(),
            dep_id: dep_id.to_string(),
        };
        if id == dep_id {
            return Err(cycle());
        }
        self.inner.locks.with(EDGES_LOCK, || {
            self.get(id, false)?;
            self.get(dep_id, false)?;
            if graph::would_cycle(id, dep_id, |node| self.deps_of(node))? {
                debug!(id, dep_id, "dependency rejected: cycle");
                return Err(cycle());
            }
            self.inner.locks.with(id, || {
                let (path, current) = self.load_live(id)?;
                if current.dependency_ids.contains(dep_id) {
                    return Ok(current);
                }
                let mut next = current.clone();
                next.dependency_ids.insert(dep_id.to_string());
                self.commit(&path, &current, next)
            })
        })
    }

    pub fn remove_dependency(&self, id: &str, dep_id: &str) -> Result<TaskNode, StoreError> {
        self.inner.locks.with(id, || {
            let (path, current) = self.load_live(id)?;
            if !current.dependency_ids.contains(dep_id) {
                return Err(StoreError::NotFound(format!("dependency {id} -> {dep_id}")));
            }
            let mut next = current.clone();
            next.dependency_ids.remove(dep_id);
            self.commit(&path, &current, next)
        })
    }

    /// Live tasks whose parent is `id`, in insertion order.
    pub fn children(&self, id: &str) -> Result<Vec<TaskNode>, StoreError> {
        self.get(id, true)?;
        self.list(&ListFilter {
            parent: Some(id.to_string()),
            ..ListFilter::default()
        })
    }

    /// Live tasks that depend on `id`, in insertion order.
    pub fn dependents(&self, id: &str) -> Result<Vec<TaskNode>, StoreError> {
        self.get(id, true)?;
        let mut tasks: Vec<TaskNode> = self
            .scan()?
            .into_iter()
            .map(|(_, task)| task)
            .filter(|task| task.status != TaskStatus::Archived && task.dependency_ids.contains(id))
            .collect();
        tasks.sort_by(graph::insertion_order);
        Ok(tasks)
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<TaskNode>, StoreError> {
        let mut tasks: Vec<TaskNode> = self
            .scan()?
            .into_iter()
            .map(|(_, task)| task)
            .filter(|task| filter.include_archived || task.status != TaskStatus::Archived)
            .filter(|task| filter.status.is_none_or(|s| task.status == s))
            .filter(|task| filter.task_type.is_none_or(|t| task.task_type == t))
            .filter(|task| {
                filter
                    .parent
                    .as_deref()
                    .is_none_or(|p| task.parent_id.as_deref() == Some(p))
            })
            .collect();
        match filter.order {
            ListOrder::Insertion => tasks.sort_by(graph::insertion_order),
            ListOrder::Priority => tasks.sort_by(graph::priority_order),
        }
        Ok(tasks)
    }

    /// Workable tasks whose dependencies are all completed, most urgent first.
    ///
    /// Reads the records now; filtering happens as the result is iterated.
    pub fn ready(&self, filter: &ReadyFilter) -> Result<Ready, StoreError> {
        let mut snapshot: Vec<TaskNode> = self.scan()?.into_iter().map(|(_, task)| task).collect();
        let statuses: HashMap<String, TaskStatus> = snapshot
            .iter()
            .map(|task| (task.id.clone(), task.status))
            .collect();
        snapshot.sort_by(graph::priority_order);
        Ok(Ready {
            snapshot: snapshot.into(),
            statuses: Arc::new(statuses),
            filter: Arc::new(filter.clone()),
            pos: 0,
        })
    }

    /// Rescan every record and rewrite the index. Returns the number of tasks.
    pub fn rebuild_index(&self) -> Result<usize, StoreError> {
        let index = self.rebuild()?;
        info!(tasks = index.entries.len(), "task index rebuilt");
        Ok(index.entries.len())
    }

    fn commit(
        &self,
        path: &Path,
        current: &TaskNode,
        mut next: TaskNode,
    ) -> Result<TaskNode, StoreError> {
        next.version = current.version + 1;
        next.updated_at = Utc::now().max(current.updated_at);
        write_record(path, &next)?;
        debug!(id = %next.id, version = next.version, status = %next.status, "task updated");
        Ok(next)
    }

    fn insert(&self, task: TaskNode) -> Result<TaskNode, StoreError> {
        let id = task.id.clone();
        self.inner.locks.with(&id, || {
            if self.load(&id)?.is_some() {
                return Err(StoreError::DuplicateId(id.clone()));
            }
            let path = self.inner.paths.task_file(&id);
            write_record(&path, &task)?;
            self.index_put(&id, &path);
            debug!(id = %id, "task created");
            Ok(task)
        })
    }

    fn load_live(&self, id: &str) -> Result<(PathBuf, TaskNode), StoreError> {
        match self.load(id)? {
            Some((path, task)) if task.status != TaskStatus::Archived => Ok((path, task)),
            _ => Err(StoreError::NotFound(id.to_string())),
        }
    }

    /// Locate and read a record (archived included).
    ///
    /// Index entry first, then the canonical path, then a full rescan when the
    /// index is missing or points at the wrong record.
    fn load(&self, id: &str) -> Result<Option<(PathBuf, TaskNode)>, StoreError> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let paths = &self.inner.paths;
        if let Some(index) = load_index(&paths.index_path) {
            match index.entries.get(id) {
                Some(rel) => {
                    let path = paths.tasks_dir.join(rel);
                    if let Some(task) = read_record(&path)?.filter(|t| t.id == id) {
                        return Ok(Some((path, task)));
                    }
                    debug!(id, file = %rel, "stale index entry; rescanning");
                }
                None => {
                    let path = paths.task_file(id);
                    return Ok(read_record(&path)?
                        .filter(|t| t.id == id)
                        .map(|task| (path, task)));
                }
            }
        }
        let index = self.rebuild()?;
        match index.entries.get(id) {
            Some(rel) => {
                let path = paths.tasks_dir.join(rel);
                Ok(read_record(&path)?.map(|task| (path, task)))
            }
            None => Ok(None),
        }
    }

    fn deps_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .load(id)?
            .map(|(_, task)| task.dependency_ids.into_iter().collect())
            .unwrap_or_default())
    }

    fn check_parent_exists(&self, id: &str, parent: &str) -> Result<(), StoreError> {
        let invalid = |reason: &str| StoreError::InvalidParent {
            id: id.to_string(),
            parent: parent.to_string(),
            reason: reason.to_string(),
        };
        match self.load(parent)? {
            Some((_, task)) if task.status != TaskStatus::Archived => Ok(()),
            Some(_) => Err(invalid("parent is archived")),
            None => Err(invalid("parent does not exist")),
        }
    }

    fn check_reparent(&self, id: &str, parent: &str) -> Result<(), StoreError> {
        if id == parent {
            return Err(StoreError::InvalidParent {
                id: id.to_string(),
                parent: parent.to_string(),
                reason: "a task cannot be its own parent".to_string(),
            });
        }
        self.check_parent_exists(id, parent)?;
        let parent_of = |node: &str| Ok::<_, StoreError>(self.load(node)?.and_then(|(_, task)| task.parent_id));
        if graph::has_ancestor(parent, id, parent_of)? {
            return Err(StoreError::InvalidParent {
                id: id.to_string(),
                parent: parent.to_string(),
                reason: "task would become its own ancestor".to_string(),
            });
        }
        Ok(())
    }

    fn index_put(&self, id: &str, path: &Path) {
        let Some(rel) = self.relative(path) else {
            return;
        };
        let result = self.inner.locks.with(INDEX_LOCK, || {
            let Some(mut index) = load_index(&self.inner.paths.index_path) else {
                return self.rebuild_locked().map(|_| ());
            };
            index.entries.insert(id.to_string(), rel);
            write_index(&self.inner.paths.index_path, &index)
        });
        if let Err(err) = result {
            warn!(id, error = %err, "task index not updated; it will be rebuilt on demand");
        }
    }

    fn rebuild(&self) -> Result<TaskIndex, StoreError> {
        self.inner.locks.with(INDEX_LOCK, || self.rebuild_locked())
    }

    fn rebuild_locked(&self) -> Result<TaskIndex, StoreError> {
        let mut index = TaskIndex::default();
        for (path, task) in self.scan()? {
            let Some(rel) = self.relative(&path) else {
                continue;
            };
            if let Some(previous) = index.entries.insert(task.id.clone(), rel) {
                return Err(StoreError::corrupt(
                    path,
                    format!("duplicate task id '{}' (also in {previous})", task.id),
                ));
            }
        }
        write_index(&self.inner.paths.index_path, &index)?;
        Ok(index)
    }

    /// Every record under the tasks directory, sorted by path.
    fn scan(&self) -> Result<Vec<(PathBuf, TaskNode)>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![self.inner.paths.tasks_dir.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::io(&dir, err)),
            };
            for entry in entries {
                let entry = entry.map_err(|err| StoreError::io(&dir, err))?;
                let path = entry.path();
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                let file_type = entry.file_type().map_err(|err| StoreError::io(&path, err))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "md")
                    && let Some(task) = read_record(&path)?
                {
                    found.push((path, task));
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.inner.paths.tasks_dir).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

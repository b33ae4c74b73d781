//! Task graph node and the attribute sets used to create and patch it.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::types::{TaskStatus, TaskType};

/// Highest (least urgent) priority value. `0` is critical.
pub const MAX_PRIORITY: u8 = 4;
pub const DEFAULT_PRIORITY: u8 = 2;

const MAX_SLUG_LEN: usize = 50;

static ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("id regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub dependency_ids: BTreeSet<String>,
    #[serde(default)]
    pub body: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes for `TaskStore::create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Explicit id; generated from the title when absent.
    pub id: Option<String>,
    pub title: String,
    pub task_type: TaskType,
    pub priority: u8,
    pub parent_id: Option<String>,
    pub dependency_ids: BTreeSet<String>,
    pub body: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            task_type: TaskType::default(),
            priority: DEFAULT_PRIORITY,
            parent_id: None,
            dependency_ids: BTreeSet::new(),
            body: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn depends_on(mut self, dep_id: impl Into<String>) -> Self {
        self.dependency_ids.insert(dep_id.into());
        self
    }
}

/// Field changes for `TaskStore::update`. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<u8>,
    pub status: Option<TaskStatus>,
    /// `Some(None)` detaches the task from its parent.
    pub parent_id: Option<Option<String>>,
    pub body: Option<String>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

pub fn is_valid_id(id: &str) -> bool {
    ID_RE.is_match(id)
}

pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title must be non-empty".to_string());
    }
    if title.contains('\n') {
        return Err("title must be a single line".to_string());
    }
    Ok(())
}

pub fn validate_priority(priority: u8) -> Result<(), String> {
    if priority > MAX_PRIORITY {
        return Err(format!(
            "priority {priority} out of range 0..={MAX_PRIORITY}"
        ));
    }
    Ok(())
}

/// Lowercase, strip non-word characters, join words with `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if (ch.is_whitespace() || ch == '_' || ch == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let mut out: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// `YYYYMMDD-<slug>`, with `task` standing in for titles that slugify to nothing.
pub fn generate_id(title: &str, date: NaiveDate) -> String {
    let slug = slugify(title);
    let slug = if slug.is_empty() { "task".to_string() } else { slug };
    format!("{}-{}", date.format("%Y%m%d"), slug)
}

/// Candidate ids for a generated id: `base`, `base-2`, `base-3`, ...
pub fn id_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((2..).map(move |n| format!("{base}-{n}")))
}

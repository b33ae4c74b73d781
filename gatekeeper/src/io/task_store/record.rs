//! On-disk task record: TOML front matter between `+++` lines, then the body.
//!
//! ```text
//! +++
//! id = "20260105-write-notes"
//! title = "Write notes"
//! ...
//! +++
//! Free text body.
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::task::TaskNode;
use crate::core::types::{TaskStatus, TaskType};
use crate::error::StoreError;
use crate::io::atomic::write_atomic;

const FENCE: &str = "+++";

/// Front-matter fields, in the order they are written.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    id: String,
    title: String,
    #[serde(rename = "type", default)]
    task_type: TaskType,
    status: TaskStatus,
    priority: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default)]
    dependency_ids: BTreeSet<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub fn render(task: &TaskNode) -> Result<String, toml::ser::Error> {
    let header = Header {
        id: task.id.clone(),
        title: task.title.clone(),
        task_type: task.task_type,
        status: task.status,
        priority: task.priority,
        parent_id: task.parent_id.clone(),
        dependency_ids: task.dependency_ids.clone(),
        version: task.version,
        created_at: task.created_at,
        updated_at: task.updated_at,
    };
    let front = toml::to_string(&header)?;
    let mut out = String::with_capacity(front.len() + task.body.len() + 16);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&front);
    if !front.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&task.body);
    Ok(out)
}

pub fn parse(contents: &str) -> Result<TaskNode, String> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let rest = strip_fence_line(contents).ok_or("missing opening +++ line")?;

    let mut offset = 0;
    let (front, body) = loop {
        let line_end = rest[offset..].find('\n').map(|i| offset + i);
        let line = &rest[offset..line_end.unwrap_or(rest.len())];
        if line.trim_end_matches('\r') == FENCE {
            let body = line_end.map_or("", |end| &rest[end + 1..]);
            break (&rest[..offset], body);
        }
        match line_end {
            Some(end) => offset = end + 1,
            None => return Err("missing closing +++ line".to_string()),
        }
    };

    let header: Header = toml::from_str(front).map_err(|err| err.to_string())?;
    Ok(TaskNode {
        id: header.id,
        title: header.title,
        task_type: header.task_type,
        status: header.status,
        priority: header.priority,
        parent_id: header.parent_id,
        dependency_ids: header.dependency_ids,
        body: body.to_string(),
        version: header.version,
        created_at: header.created_at,
        updated_at: header.updated_at,
    })
}

fn strip_fence_line(contents: &str) -> Option<&str> {
    let rest = contents.strip_prefix(FENCE)?;
    let rest = rest.strip_prefix('\r').unwrap_or(rest);
    rest.strip_prefix('\n')
}

/// Read a record. A missing file is `Ok(None)`; an unparseable one is `Corrupt`.
pub fn read_record(path: &Path) -> Result<Option<TaskNode>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(StoreError::io(path, err)),
    };
    parse(&contents)
        .map(Some)
        .map_err(|message| StoreError::corrupt(path, message))
}

pub fn write_record(path: &Path, task: &TaskNode) -> Result<(), StoreError> {
    let rendered = render(task).map_err(|err| StoreError::corrupt(path, err.to_string()))?;
    write_atomic(path, rendered.as_bytes()).map_err(|err| StoreError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::task;

    #[test]
    fn render_then_parse_preserves_task() {
        let mut original = task("t1", TaskStatus::Active);
        original.parent_id = Some("p".to_string());
        original.dependency_ids.insert("d1".to_string());
        original.body = "line one\n\n+++ not a fence\n".to_string();
        let rendered = render(&original).expect("render");
        assert!(rendered.starts_with("+++\nid = \"t1\"\n"));
        assert_eq!(parse(&rendered).expect("parse"), original);
    }

    #[test]
    fn hand_edited_record_parses() {
        let raw = "+++\r\nid = \"x\"\r\ntitle = \"X\"\r\nstatus = \"inbox\"\r\npriority = 1\r\nversion = 3\r\ncreated_at = \"2026-01-05T10:00:00Z\"\r\nupdated_at = \"2026-01-05T10:00:00Z\"\r\n+++\r\nbody";
        let parsed = parse(raw).expect("parse");
        assert_eq!(parsed.task_type, TaskType::Task);
        assert_eq!(parsed.version, 3);
        assert!(parsed.dependency_ids.is_empty());
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn missing_fences_are_errors() {
        assert!(parse("id = \"x\"").is_err());
        assert!(parse("+++\nid = \"x\"\n").is_err());
    }

    #[test]
    fn unreadable_front_matter_is_corrupt() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bad.md");
        fs::write(&path, "+++\nid = \n+++\n").expect("write");
        assert!(matches!(
            read_record(&path),
            Err(StoreError::Corrupt { .. })
        ));
        assert!(read_record(&temp.path().join("none.md")).expect("missing").is_none());
    }
}

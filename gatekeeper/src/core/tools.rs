//! Tool categorization by side effect.
//!
//! Read-only tools only observe, meta tools steer the agent without touching
//! user files, and everything else (including tools we have never seen) is
//! treated as a write.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    ReadOnly,
    Write,
    Meta,
}

impl ToolCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolCategory::ReadOnly => "read_only",
            ToolCategory::Write => "write",
            ToolCategory::Meta => "meta",
        }
    }
}

const READ_ONLY_TOOLS: &[&str] = &[
    // Claude
    "Read",
    "Glob",
    "Grep",
    "LS",
    "WebFetch",
    "WebSearch",
    "ListMcpResourcesTool",
    "ReadMcpResourceTool",
    "TaskOutput",
    "BashOutput",
    // Gemini
    "read_file",
    "read_many_files",
    "view_file",
    "list_dir",
    "list_directory",
    "glob",
    "find_by_name",
    "grep_search",
    "search_file_content",
    "search_web",
    "google_web_search",
    "web_fetch",
    "read_url_content",
];

const META_TOOLS: &[&str] = &[
    // Claude
    "Task",
    "Skill",
    "TodoWrite",
    "AskUserQuestion",
    "EnterPlanMode",
    "ExitPlanMode",
    "KillShell",
    // Gemini
    "activate_skill",
    "delegate_to_agent",
    "write_todos",
    "save_memory",
];

/// Read-only operations exposed by MCP servers (`mcp__<server>__<op>`).
const READ_ONLY_MCP_OPS: &[&str] = &[
    "get_task",
    "list_tasks",
    "search_tasks",
    "get_task_tree",
    "get_children",
    "get_dependencies",
    "get_blocked_tasks",
    "get_review_tasks",
    "get_index_stats",
    "retrieve_memory",
    "recall_memory",
    "search_by_tag",
    "list_memories",
];

/// Name of the operation behind an MCP tool name, or the name itself.
pub fn mcp_operation(name: &str) -> &str {
    match name.strip_prefix("mcp__") {
        Some(rest) => rest.rsplit("__").next().unwrap_or(rest),
        None => name,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCatalog {
    read_only: BTreeSet<String>,
    meta: BTreeSet<String>,
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolCatalog {
    pub fn builtin() -> Self {
        Self {
            read_only: READ_ONLY_TOOLS.iter().map(|s| s.to_string()).collect(),
            meta: META_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Built-in tables plus configured extra names.
    pub fn with_extras(read_only: &[String], meta: &[String]) -> Self {
        let mut catalog = Self::builtin();
        catalog.read_only.extend(read_only.iter().cloned());
        catalog.meta.extend(meta.iter().cloned());
        catalog
    }

    pub fn categorize(&self, name: &str) -> ToolCategory {
        if self.read_only.contains(name) {
            return ToolCategory::ReadOnly;
        }
        if self.meta.contains(name) {
            return ToolCategory::Meta;
        }
        if name.starts_with("mcp__") && READ_ONLY_MCP_OPS.contains(&mcp_operation(name)) {
            return ToolCategory::ReadOnly;
        }
        ToolCategory::Write
    }
}

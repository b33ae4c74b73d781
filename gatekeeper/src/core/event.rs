//! Canonical event model.
//!
//! Host payloads are translated into these types by the router; everything
//! downstream (gates, enforcer, audit) only ever sees this closed set.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::tools::ToolCategory;
use crate::core::types::{TaskStatus, Workflow};

/// `{session_id, timestamp, type, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    pub fn new(
        session_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Task the event is about, if any (not the session's bound task).
    pub fn task_ref(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::TaskBind { task_id } | EventPayload::TaskUnbind { task_id, .. } => {
                Some(task_id.as_str())
            }
            EventPayload::PreToolUse { tool } | EventPayload::PostToolUse { tool, .. } => {
                match &tool.input {
                    ToolInput::TaskOp { task_id, .. } => task_id.as_deref(),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    SessionStart {
        source: StartSource,
    },
    UserPromptSubmit {
        prompt: String,
    },
    PreToolUse {
        tool: ToolCall,
    },
    PostToolUse {
        tool: ToolCall,
        succeeded: bool,
        /// The tool output contains an `APPROVED` verdict.
        #[serde(default)]
        approved: bool,
    },
    HydrationComplete {
        workflow: Workflow,
    },
    TaskBind {
        task_id: String,
    },
    TaskUnbind {
        task_id: String,
        completed: bool,
    },
    SubagentStop {
        agent_type: Option<String>,
    },
    Stop {},
    SessionEnd {
        reason: Option<String>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::SessionStart { .. } => EventKind::SessionStart,
            EventPayload::UserPromptSubmit { .. } => EventKind::UserPromptSubmit,
            EventPayload::PreToolUse { .. } => EventKind::PreToolUse,
            EventPayload::PostToolUse { .. } => EventKind::PostToolUse,
            EventPayload::HydrationComplete { .. } => EventKind::HydrationComplete,
            EventPayload::TaskBind { .. } => EventKind::TaskBind,
            EventPayload::TaskUnbind { .. } => EventKind::TaskUnbind,
            EventPayload::SubagentStop { .. } => EventKind::SubagentStop,
            EventPayload::Stop {} => EventKind::Stop,
            EventPayload::SessionEnd { .. } => EventKind::SessionEnd,
        }
    }

    /// Tool call carried by tool events.
    pub fn tool(&self) -> Option<&ToolCall> {
        match self {
            EventPayload::PreToolUse { tool } | EventPayload::PostToolUse { tool, .. } => {
                Some(tool)
            }
            _ => None,
        }
    }
}

/// Discriminant of [`EventPayload`], used to index gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    HydrationComplete,
    TaskBind,
    TaskUnbind,
    SubagentStop,
    Stop,
    SessionEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::SessionStart,
        EventKind::UserPromptSubmit,
        EventKind::PreToolUse,
        EventKind::PostToolUse,
        EventKind::HydrationComplete,
        EventKind::TaskBind,
        EventKind::TaskUnbind,
        EventKind::SubagentStop,
        EventKind::Stop,
        EventKind::SessionEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::SessionStart => "SessionStart",
            EventKind::UserPromptSubmit => "UserPromptSubmit",
            EventKind::PreToolUse => "PreToolUse",
            EventKind::PostToolUse => "PostToolUse",
            EventKind::HydrationComplete => "HydrationComplete",
            EventKind::TaskBind => "TaskBind",
            EventKind::TaskUnbind => "TaskUnbind",
            EventKind::SubagentStop => "SubagentStop",
            EventKind::Stop => "Stop",
            EventKind::SessionEnd => "SessionEnd",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartSource {
    #[default]
    Startup,
    Resume,
    Clear,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub category: ToolCategory,
    pub input: ToolInput,
}

impl ToolCall {
    /// Whether this call runs `agent`, either as a tool named after it
    /// (`custodiet`, `aops-core:custodiet`) or through a delegation tool.
    pub fn invokes(&self, agent: &str) -> bool {
        let named = self
            .name
            .rsplit(':')
            .next()
            .is_some_and(|name| name.eq_ignore_ascii_case(agent));
        named
            || matches!(&self.input, ToolInput::Delegate { agent: target }
                if target.to_ascii_lowercase().contains(agent))
    }
}

/// Typed view of the tool input fields gates care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolInput {
    Shell {
        command: String,
    },
    WriteFile {
        path: String,
        content: String,
    },
    EditFile {
        path: String,
    },
    ReadFile {
        path: String,
    },
    Delegate {
        agent: String,
    },
    TaskOp {
        op: TaskOpKind,
        task_id: Option<String>,
        status: Option<TaskStatus>,
    },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOpKind {
    Create,
    Update,
    Complete,
    Claim,
    Query,
}

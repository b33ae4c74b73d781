//! Host-side shapes: event names and the loosely-typed hook payload.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::event::StartSource;
use crate::core::types::Workflow;

/// Hook names accepted from Claude- and Gemini-style hosts, plus the
/// canonical names for events a host can report directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    SessionStart,
    UserPrompt,
    PreTool,
    PostTool,
    SubagentStop,
    Stop,
    AfterAgent,
    SessionEnd,
    HydrationComplete,
    TaskBind,
    TaskUnbind,
}

impl HostEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        let event = match name {
            "SessionStart" => HostEvent::SessionStart,
            "UserPromptSubmit" | "BeforeAgent" => HostEvent::UserPrompt,
            "PreToolUse" | "BeforeTool" => HostEvent::PreTool,
            "PostToolUse" | "AfterTool" => HostEvent::PostTool,
            "SubagentStop" => HostEvent::SubagentStop,
            "Stop" => HostEvent::Stop,
            "AfterAgent" => HostEvent::AfterAgent,
            "SessionEnd" => HostEvent::SessionEnd,
            "HydrationComplete" => HostEvent::HydrationComplete,
            "TaskBind" => HostEvent::TaskBind,
            "TaskUnbind" => HostEvent::TaskUnbind,
            _ => return None,
        };
        Some(event)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HostPayload {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<StartSource>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, alias = "toolName")]
    pub tool_name: Option<String>,
    #[serde(default, alias = "toolInput")]
    pub tool_input: Option<Map<String, Value>>,
    #[serde(default, alias = "tool_result", alias = "toolResult")]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, alias = "prompt_response")]
    pub response: Option<Value>,
    #[serde(default)]
    pub workflow: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

static HYDRATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)HYDRATION RESULT|Execution Plan|Execution Steps")
        .expect("hydration marker regex must compile")
});

static WORKFLOW_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Workflows?\*\*:\s*\[\[workflows/([^\]]+)\]\]")
        .expect("workflow regex must compile")
});

pub fn has_hydration_marker(text: &str) -> bool {
    HYDRATION_MARKER.is_match(text)
}

/// Workflow declared in a hydration result; `standard` when none is given.
pub fn parse_workflow(text: &str) -> Workflow {
    WORKFLOW_LINE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(Workflow::Standard, |slug| Workflow::from_slug(slug.as_str().trim()))
}

/// Flatten a tool response to text: plain strings, MCP `content` blocks, or
/// the JSON itself.
pub fn response_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("content") {
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(Value::String(text)) => text.clone(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}

/// Structured view of a tool response; text responses are parsed as JSON
/// when they hold JSON.
pub fn response_json(value: &Value) -> Option<Value> {
    match value {
        Value::Object(map) if !map.contains_key("content") => Some(value.clone()),
        Value::Object(_) | Value::String(_) => serde_json::from_str(&response_text(value)).ok(),
        _ => None,
    }
}

/// `false` when the response reports a failure.
pub fn succeeded(response: Option<&Value>) -> bool {
    let Some(response) = response else {
        return true;
    };
    let failed = |value: &Value| {
        value.get("success").and_then(Value::as_bool) == Some(false)
            || value.get("is_error").and_then(Value::as_bool) == Some(true)
            || value.get("error").is_some_and(|err| !err.is_null())
    };
    !(failed(response) || response_json(response).is_some_and(|json| failed(&json)))
}

/// The response text carries an `APPROVED` verdict.
pub fn reports_approval(response: &Value) -> bool {
    response_text(response).contains("APPROVED")
}

/// Task id reported by a task-manager response (`task.id`, `id`, or `task_id`).
pub fn reported_task_id(response: &Value) -> Option<String> {
    let json = response_json(response)?;
    json.get("task")
        .and_then(|task| task.get("id"))
        .or_else(|| json.get("id"))
        .or_else(|| json.get("task_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

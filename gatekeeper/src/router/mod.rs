//! Host event router.
//!
//! Validates a raw hook payload against the embedded host-event schema,
//! deserializes it into [`HostPayload`], and maps it onto the closed set of
//! canonical [`Event`]s. Some tool results are promoted to lifecycle events
//! (hydrator finished, task created or claimed, task completed).

pub mod host;

use chrono::Utc;
use jsonschema::{Draft, Validator};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::event::{Event, EventPayload, TaskOpKind, ToolCall, ToolInput};
use crate::core::tools::{ToolCatalog, mcp_operation};
use crate::core::types::{TaskStatus, Workflow};
use crate::error::RouteError;

use self::host::{
    HostEvent, HostPayload, has_hydration_marker, parse_workflow, reported_task_id,
    reports_approval, response_text, succeeded,
};

const HOST_EVENT_SCHEMA: &str = include_str!("../../../schemas/host_event/v1.schema.json");

pub struct Router {
    catalog: ToolCatalog,
    schema: Validator,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(catalog: ToolCatalog) -> anyhow::Result<Self> {
        use anyhow::Context;
        let schema: Value =
            serde_json::from_str(HOST_EVENT_SCHEMA).context("parse host event schema")?;
        let schema = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&schema)
            .map_err(|err| anyhow::anyhow!("compile host event schema: {err}"))?;
        Ok(Self { catalog, schema })
    }

    /// Translate one host hook into a canonical event.
    pub fn route(&self, name: &str, raw: &Value) -> Result<Event, RouteError> {
        let host_event =
            HostEvent::from_name(name).ok_or_else(|| RouteError::UnrecognizedEvent(name.into()))?;
        let messages: Vec<String> = self
            .schema
            .iter_errors(raw)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(RouteError::validation(name, messages.join("; ")));
        }
        let payload = HostPayload::deserialize(raw)
            .map_err(|err| RouteError::validation(name, err.to_string()))?;

        let event_payload = self.translate(name, host_event, &payload)?;
        debug!(host = name, kind = %event_payload.kind(), "host event routed");
        Ok(Event::new(
            payload.session_id,
            payload.timestamp.unwrap_or_else(Utc::now),
            event_payload,
        ))
    }

    fn translate(
        &self,
        name: &str,
        host_event: HostEvent,
        payload: &HostPayload,
    ) -> Result<EventPayload, RouteError> {
        let translated = match host_event {
            HostEvent::SessionStart => EventPayload::SessionStart {
                source: payload.source.unwrap_or_default(),
            },
            HostEvent::UserPrompt => EventPayload::UserPromptSubmit {
                prompt: payload.prompt.clone().unwrap_or_default(),
            },
            HostEvent::PreTool => EventPayload::PreToolUse {
                tool: self.tool_call(name, payload)?,
            },
            HostEvent::PostTool => {
                let tool = self.tool_call(name, payload)?;
                let response = payload.tool_response.as_ref();
                derived_from_result(&tool, response).unwrap_or(EventPayload::PostToolUse {
                    succeeded: succeeded(response),
                    approved: response.is_some_and(reports_approval),
                    tool,
                })
            }
            HostEvent::SubagentStop => EventPayload::SubagentStop {
                agent_type: payload.agent_type.clone(),
            },
            HostEvent::Stop => EventPayload::Stop {},
            HostEvent::AfterAgent => {
                let text = payload.response.as_ref().map(response_text).unwrap_or_default();
                if has_hydration_marker(&text) {
                    EventPayload::HydrationComplete {
                        workflow: parse_workflow(&text),
                    }
                } else {
                    EventPayload::Stop {}
                }
            }
            HostEvent::SessionEnd => EventPayload::SessionEnd {
                reason: payload.reason.clone(),
            },
            HostEvent::HydrationComplete => EventPayload::HydrationComplete {
                workflow: payload
                    .workflow
                    .as_deref()
                    .map_or(Workflow::Standard, Workflow::from_slug),
            },
            HostEvent::TaskBind => EventPayload::TaskBind {
                task_id: required(name, "task_id", payload.task_id.clone())?,
            },
            HostEvent::TaskUnbind => EventPayload::TaskUnbind {
                task_id: required(name, "task_id", payload.task_id.clone())?,
                completed: payload.completed.unwrap_or(false),
            },
        };
        Ok(translated)
    }

    fn tool_call(&self, name: &str, payload: &HostPayload) -> Result<ToolCall, RouteError> {
        let tool_name = required(name, "tool_name", payload.tool_name.clone())?;
        let empty = Map::new();
        let input = payload.tool_input.as_ref().unwrap_or(&empty);
        Ok(ToolCall {
            category: self.catalog.categorize(&tool_name),
            input: typed_input(name, &tool_name, input)?,
            name: tool_name,
        })
    }
}

#[derive(Deserialize)]
struct ShellInput {
    command: String,
}

#[derive(Deserialize)]
struct WriteInput {
    #[serde(alias = "path")]
    file_path: String,
    content: String,
}

#[derive(Deserialize)]
struct PathInput {
    #[serde(alias = "path", alias = "notebook_path", alias = "absolute_path")]
    file_path: String,
}

fn typed_input(
    event: &str,
    tool_name: &str,
    input: &Map<String, Value>,
) -> Result<ToolInput, RouteError> {
    let typed = match tool_name {
        "Bash" | "run_shell_command" => {
            let shell: ShellInput = parse_input(event, tool_name, input)?;
            ToolInput::Shell {
                command: shell.command,
            }
        }
        "Write" | "write_file" => {
            let write: WriteInput = parse_input(event, tool_name, input)?;
            ToolInput::WriteFile {
                path: write.file_path,
                content: write.content,
            }
        }
        "Edit" | "MultiEdit" | "NotebookEdit" | "replace" => {
            let edit: PathInput = parse_input(event, tool_name, input)?;
            ToolInput::EditFile {
                path: edit.file_path,
            }
        }
        "Read" | "read_file" | "view_file" => {
            let read: PathInput = parse_input(event, tool_name, input)?;
            ToolInput::ReadFile {
                path: read.file_path,
            }
        }
        "Task" => delegate(event, tool_name, input, "subagent_type")?,
        "Skill" => delegate(event, tool_name, input, "skill")?,
        "activate_skill" => delegate(event, tool_name, input, "name")?,
        "delegate_to_agent" => delegate(event, tool_name, input, "agent_name")?,
        _ => task_op(mcp_operation(tool_name), input).unwrap_or(ToolInput::Other),
    };
    Ok(typed)
}

fn parse_input<T: DeserializeOwned>(
    event: &str,
    tool_name: &str,
    input: &Map<String, Value>,
) -> Result<T, RouteError> {
    serde_json::from_value(Value::Object(input.clone()))
        .map_err(|err| RouteError::validation(event, format!("{tool_name} input: {err}")))
}

fn delegate(
    event: &str,
    tool_name: &str,
    input: &Map<String, Value>,
    field: &str,
) -> Result<ToolInput, RouteError> {
    let agent = input
        .get(field)
        .and_then(Value::as_str)
        .filter(|agent| !agent.is_empty())
        .ok_or_else(|| {
            RouteError::validation(event, format!("{tool_name} input: missing {field}"))
        })?;
    Ok(ToolInput::Delegate {
        agent: agent.to_string(),
    })
}

fn task_op(operation: &str, input: &Map<String, Value>) -> Option<ToolInput> {
    let op = match operation {
        "create_task" => TaskOpKind::Create,
        "update_task" => TaskOpKind::Update,
        "complete_task" | "complete_tasks" => TaskOpKind::Complete,
        "claim_next_task" => TaskOpKind::Claim,
        "get_task" | "list_tasks" | "search_tasks" | "get_task_tree" | "get_children"
        | "get_dependencies" => TaskOpKind::Query,
        _ => return None,
    };
    let task_id = ["id", "task_id"]
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .map(str::to_string);
    let status = input.get("status").and_then(Value::as_str).and_then(|raw| {
        let parsed = raw.parse::<TaskStatus>().ok();
        if parsed.is_none() {
            debug!(status = raw, "task op status not recognized");
        }
        parsed
    });
    Some(ToolInput::TaskOp {
        op,
        task_id,
        status,
    })
}

/// Lifecycle event implied by a successful tool result, if any.
fn derived_from_result(tool: &ToolCall, response: Option<&Value>) -> Option<EventPayload> {
    if !succeeded(response) {
        return None;
    }
    match &tool.input {
        ToolInput::Delegate { agent } if agent.contains("hydrator") => {
            let text = response.map(response_text).unwrap_or_default();
            Some(EventPayload::HydrationComplete {
                workflow: parse_workflow(&text),
            })
        }
        ToolInput::TaskOp {
            op: TaskOpKind::Create,
            ..
        }
        | ToolInput::TaskOp {
            op: TaskOpKind::Update,
            status: Some(TaskStatus::Active),
            ..
        } => {
            let task_id = response.and_then(reported_task_id)?;
            Some(EventPayload::TaskBind { task_id })
        }
        ToolInput::TaskOp {
            op: TaskOpKind::Complete,
            task_id,
            ..
        } => {
            let reported_success = response
                .and_then(host::response_json)
                .and_then(|json| json.get("success").and_then(Value::as_bool))
                .unwrap_or(false);
            if !reported_success {
                return None;
            }
            let task_id = task_id
                .clone()
                .or_else(|| response.and_then(reported_task_id))?;
            Some(EventPayload::TaskUnbind {
                task_id,
                completed: true,
            })
        }
        _ => None,
    }
}

fn required(event: &str, field: &str, value: Option<String>) -> Result<String, RouteError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RouteError::validation(event, format!("missing {field}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::event::StartSource;
    use crate::core::tools::ToolCategory;

    fn router() -> Router {
        Router::new(ToolCatalog::builtin()).expect("router")
    }

    #[test]
    fn unknown_names_are_rejected_before_validation() {
        for name in ["PreCompact", "Notification", "BeforeModel", ""] {
            let err = router()
                .route(name, &json!({"session_id": "s1"}))
                .expect_err("unrecognized");
            assert!(matches!(err, RouteError::UnrecognizedEvent(_)), "{name}");
        }
    }

    #[test]
    fn session_id_is_required_and_non_empty() {
        for raw in [json!({}), json!({"session_id": ""}), json!("s1")] {
            let err = router().route("Stop", &raw).expect_err("invalid");
            assert!(matches!(err, RouteError::Validation { .. }), "{raw}");
        }
    }

    #[test]
    fn claude_and_gemini_names_map_to_the_same_event() {
        let raw = json!({"session_id": "s1", "tool_name": "Bash", "tool_input": {"command": "ls"}});
        let claude = router().route("PreToolUse", &raw).expect("claude");
        let gemini = router()
            .route(
                "BeforeTool",
                &json!({"sessionId": "s1", "toolName": "Bash", "toolInput": {"command": "ls"}}),
            )
            .expect("gemini");
        assert_eq!(claude.payload, gemini.payload);
        let tool = claude.payload.tool().expect("tool");
        assert_eq!(tool.category, ToolCategory::Write);
        assert_eq!(
            tool.input,
            ToolInput::Shell {
                command: "ls".to_string()
            }
        );
    }

    #[test]
    fn missing_tool_fields_are_validation_errors() {
        let err = router()
            .route(
                "PreToolUse",
                &json!({"session_id": "s1", "tool_name": "Write", "tool_input": {"file_path": "a.md"}}),
            )
            .expect_err("content missing");
        assert!(matches!(err, RouteError::Validation { .. }));
        let err = router()
            .route("PreToolUse", &json!({"session_id": "s1"}))
            .expect_err("tool missing");
        assert!(err.to_string().contains("tool_name"));
    }

    #[test]
    fn session_start_defaults_to_startup() {
        let event = router()
            .route("SessionStart", &json!({"session_id": "s1"}))
            .expect("route");
        assert_eq!(
            event.payload,
            EventPayload::SessionStart {
                source: StartSource::Startup
            }
        );
        let err = router()
            .route("SessionStart", &json!({"session_id": "s1", "source": "reboot"}))
            .expect_err("bad source");
        assert!(matches!(err, RouteError::Validation { .. }));
    }

    #[test]
    fn hydrator_result_becomes_hydration_complete() {
        let event = router()
            .route(
                "PostToolUse",
                &json!({
                    "session_id": "s1",
                    "tool_name": "Task",
                    "tool_input": {"subagent_type": "aops-core:prompt-hydrator"},
                    "tool_response": {"content": [{"type": "text", "text": "**Workflow**: [[workflows/simple-question]]"}]}
                }),
            )
            .expect("route");
        assert_eq!(
            event.payload,
            EventPayload::HydrationComplete {
                workflow: Workflow::SimpleQuestion
            }
        );
    }

    #[test]
    fn after_agent_without_marker_is_stop() {
        let stop = router()
            .route(
                "AfterAgent",
                &json!({"session_id": "s1", "prompt_response": "done for now"}),
            )
            .expect("route");
        assert_eq!(stop.payload, EventPayload::Stop {});
        let hydrated = router()
            .route(
                "AfterAgent",
                &json!({"session_id": "s1", "prompt_response": "## HYDRATION RESULT\n**Workflow**: [[workflows/direct-skill]]"}),
            )
            .expect("route");
        assert_eq!(
            hydrated.payload,
            EventPayload::HydrationComplete {
                workflow: Workflow::DirectSkill
            }
        );
    }

    #[test]
    fn task_manager_results_bind_and_unbind() {
        let bind = router()
            .route(
                "PostToolUse",
                &json!({
                    "session_id": "s1",
                    "tool_name": "mcp__tasks__update_task",
                    "tool_input": {"id": "t1", "status": "in_progress"},
                    "tool_response": {"success": true, "task": {"id": "t1"}}
                }),
            )
            .expect("route");
        assert_eq!(
            bind.payload,
            EventPayload::TaskBind {
                task_id: "t1".to_string()
            }
        );

        let unbind = router()
            .route(
                "PostToolUse",
                &json!({
                    "session_id": "s1",
                    "tool_name": "mcp__tasks__complete_task",
                    "tool_input": {"id": "t1"},
                    "tool_result": "{\"success\": true}"
                }),
            )
            .expect("route");
        assert_eq!(
            unbind.payload,
            EventPayload::TaskUnbind {
                task_id: "t1".to_string(),
                completed: true
            }
        );
    }

    #[test]
    fn failed_task_result_stays_post_tool_use() {
        let event = router()
            .route(
                "PostToolUse",
                &json!({
                    "session_id": "s1",
                    "tool_name": "mcp__tasks__create_task",
                    "tool_input": {"title": "x"},
                    "tool_response": {"success": false, "error": "nope"}
                }),
            )
            .expect("route");
        assert!(matches!(
            event.payload,
            EventPayload::PostToolUse {
                succeeded: false,
                ..
            }
        ));
    }

    #[test]
    fn session_ids_must_be_file_safe() {
        for bad in ["../x", "a/b", ""] {
            let err = router()
                .route("Stop", &json!({"session_id": bad}))
                .expect_err("invalid session id");
            assert!(matches!(err, RouteError::Validation { .. }));
        }
    }

    #[test]
    fn critic_output_carries_approval() {
        let route = |text: &str| {
            router()
                .route(
                    "PostToolUse",
                    &json!({
                        "session_id": "s1",
                        "tool_name": "Task",
                        "tool_input": {"subagent_type": "aops-core:critic"},
                        "tool_response": {"content": [{"type": "text", "text": text}]}
                    }),
                )
                .expect("route")
                .payload
        };
        assert!(matches!(
            route("Plan looks sound.\n\nVerdict: APPROVED"),
            EventPayload::PostToolUse { approved: true, .. }
        ));
        assert!(matches!(
            route("Verdict: REVISE"),
            EventPayload::PostToolUse { approved: false, .. }
        ));
    }

    #[test]
    fn canonical_names_are_accepted() {
        let event = router()
            .route(
                "TaskUnbind",
                &json!({"session_id": "s1", "task_id": "t1", "completed": true}),
            )
            .expect("route");
        assert_eq!(event.task_ref(), Some("t1"));
        assert!(
            router()
                .route("TaskBind", &json!({"session_id": "s1"}))
                .is_err()
        );
    }
}

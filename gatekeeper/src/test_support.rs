//! Test-only fixtures for tasks, sessions, events, and stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::core::event::{Event, EventPayload, TaskOpKind, ToolCall, ToolInput};
use crate::core::session::SessionState;
use crate::core::task::{DEFAULT_PRIORITY, TaskNode};
use crate::core::tools::ToolCategory;
use crate::core::types::{Phase, ReasonCode, TaskStatus, TaskType};
use crate::core::verdict::GateResult;
use crate::enforcer::{EnforcerOptions, PolicyEnforcer};
use crate::gates::{Gate, GateInput, default_registry};
use crate::io::audit::AuditLog;
use crate::io::config::GatekeeperConfig;
use crate::io::paths::DataPaths;
use crate::io::session_store::SessionStore;
use crate::io::task_store::TaskStore;

/// Fixed instant so fixtures compare equal across calls.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0)
        .single()
        .expect("valid fixture time")
}

/// A deterministic task with default attributes.
pub fn task(id: &str, status: TaskStatus) -> TaskNode {
    TaskNode {
        id: id.to_string(),
        title: format!("{id} title"),
        task_type: TaskType::Task,
        status,
        priority: DEFAULT_PRIORITY,
        parent_id: None,
        dependency_ids: Default::default(),
        body: String::new(),
        version: 1,
        created_at: fixed_time(),
        updated_at: fixed_time(),
    }
}

/// A fresh session moved to `phase`.
pub fn session(id: &str, phase: Phase) -> SessionState {
    let mut state = SessionState::new(id, fixed_time());
    state.phase = phase;
    state
}

pub fn event(session_id: &str, payload: EventPayload) -> Event {
    Event::new(session_id, fixed_time(), payload)
}

pub fn pre_tool(session_id: &str, tool: ToolCall) -> Event {
    event(session_id, EventPayload::PreToolUse { tool })
}

/// Gate input with nothing resolved from the task store.
pub fn gate_input(event: Event, session: SessionState) -> GateInput {
    GateInput {
        event,
        session,
        subject: None,
        bound: None,
        dependencies: Vec::new(),
    }
}

pub fn shell(command: &str) -> ToolCall {
    ToolCall {
        name: "Bash".to_string(),
        category: ToolCategory::Write,
        input: ToolInput::Shell {
            command: command.to_string(),
        },
    }
}

pub fn write_file(path: &str, content: &str) -> ToolCall {
    ToolCall {
        name: "Write".to_string(),
        category: ToolCategory::Write,
        input: ToolInput::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        },
    }
}

pub fn read_file(path: &str) -> ToolCall {
    ToolCall {
        name: "Read".to_string(),
        category: ToolCategory::ReadOnly,
        input: ToolInput::ReadFile {
            path: path.to_string(),
        },
    }
}

pub fn delegate(tool_name: &str, agent: &str) -> ToolCall {
    ToolCall {
        name: tool_name.to_string(),
        category: ToolCategory::Meta,
        input: ToolInput::Delegate {
            agent: agent.to_string(),
        },
    }
}

/// Task-manager tool call named the way the MCP server exposes it.
pub fn task_op(op: TaskOpKind, task_id: Option<&str>, status: Option<TaskStatus>) -> ToolCall {
    let (operation, category) = match op {
        TaskOpKind::Create => ("create_task", ToolCategory::Write),
        TaskOpKind::Update => ("update_task", ToolCategory::Write),
        TaskOpKind::Complete => ("complete_task", ToolCategory::Write),
        TaskOpKind::Claim => ("claim_next_task", ToolCategory::Write),
        TaskOpKind::Query => ("get_task", ToolCategory::ReadOnly),
    };
    ToolCall {
        name: format!("mcp__tasks__{operation}"),
        category,
        input: ToolInput::TaskOp {
            op,
            task_id: task_id.map(str::to_string),
            status,
        },
    }
}

/// Temporary data directory. Every accessor opens stores over the same
/// files, so state written through one handle is visible to the next.
pub struct TestEnv {
    _temp: TempDir,
    pub paths: DataPaths,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = DataPaths::new(&temp.path().join("data"));
        Self { _temp: temp, paths }
    }

    pub fn tasks(&self) -> TaskStore {
        TaskStore::open(&self.paths).expect("open task store")
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::open(&self.paths).expect("open session store")
    }

    pub fn audit(&self) -> AuditLog {
        AuditLog::new(&self.paths.audit_dir)
    }

    /// Enforcer with the default gates and config.
    pub fn enforcer(&self) -> PolicyEnforcer {
        self.enforcer_with(&GatekeeperConfig::default())
    }

    pub fn enforcer_with(&self, config: &GatekeeperConfig) -> PolicyEnforcer {
        PolicyEnforcer::new(
            Arc::new(default_registry(config)),
            self.tasks(),
            self.sessions(),
            self.audit(),
            EnforcerOptions::from_config(config),
        )
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Gate that always returns the same verdict.
pub struct FixedGate {
    id: &'static str,
    result: fn(&'static str) -> GateResult,
    calls: Option<Arc<AtomicUsize>>,
}

impl FixedGate {
    pub fn allow(id: &'static str) -> Self {
        Self::with(id, GateResult::allow)
    }

    pub fn warn(id: &'static str) -> Self {
        Self::with(id, |id| GateResult::warn(id, ReasonCode::TaskRequired, "fixture warning"))
    }

    pub fn block(id: &'static str) -> Self {
        Self::with(id, |id| GateResult::block(id, ReasonCode::TaskRequired, "fixture block"))
    }

    /// Count evaluations into `calls`.
    pub fn counting(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.calls = Some(calls);
        self
    }

    fn with(id: &'static str, result: fn(&'static str) -> GateResult) -> Self {
        Self {
            id,
            result,
            calls: None,
        }
    }
}

impl Gate for FixedGate {
    fn id(&self) -> &'static str {
        self.id
    }

    fn evaluate(&self, _input: &GateInput) -> GateResult {
        if let Some(calls) = &self.calls {
            calls.fetch_add(1, Ordering::SeqCst);
        }
        (self.result)(self.id)
    }
}

/// Gate that sleeps before allowing.
pub struct SlowGate {
    id: &'static str,
    delay: Duration,
}

impl SlowGate {
    pub fn new(id: &'static str, delay: Duration) -> Self {
        Self { id, delay }
    }
}

impl Gate for SlowGate {
    fn id(&self) -> &'static str {
        self.id
    }

    fn evaluate(&self, _input: &GateInput) -> GateResult {
        thread::sleep(self.delay);
        GateResult::allow(self.id)
    }
}

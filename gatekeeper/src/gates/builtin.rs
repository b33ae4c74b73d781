//! Built-in gate set.

use std::time::Duration;

use crate::core::docs::{count_prose_lines, is_guide_file, is_markdown};
use crate::core::event::{EventKind, EventPayload, TaskOpKind, ToolInput};
use crate::core::phase::{PhaseEffect, effect_of, is_regression};
use crate::core::shell::{is_destructive_git, is_mutating};
use crate::core::tools::ToolCategory;
use crate::core::types::{GateMode, ReasonCode, TaskStatus};
use crate::core::verdict::GateResult;
use crate::gates::message::GateMessage;
use crate::gates::registry::GateRegistry;
use crate::gates::{Gate, GateInput};
use crate::io::config::GatekeeperConfig;

pub const SESSION_ENDED: &str = "session_ended";
pub const PHASE_ORDER: &str = "phase_order";
pub const HYDRATION: &str = "hydration";
pub const TASK_BINDING: &str = "task_binding";
pub const TASK_CLAIM: &str = "task_claim";
pub const DESTRUCTIVE_COMMAND: &str = "destructive_command";
pub const MINIMAL_DOCS: &str = "minimal_docs";
pub const SINGLE_BINDING: &str = "single_binding";
pub const TASK_AVAILABLE: &str = "task_available";
pub const UNBIND_MATCHES: &str = "unbind_matches";
pub const HANDOVER: &str = "handover";
pub const CUSTODIET: &str = "custodiet";
pub const CRITIC: &str = "critic";

/// The built-in gates with modes and budgets from `config`.
pub fn default_registry(config: &GatekeeperConfig) -> GateRegistry {
    let modes = &config.gates;
    let mut builder = GateRegistry::builder()
        .register_all(0, SessionEndedGate)
        .register_all(10, PhaseOrderGate)
        .register(
            EventKind::PreToolUse,
            20,
            HydrationGate {
                mode: modes.hydration,
            },
        )
        .register(
            EventKind::PreToolUse,
            30,
            TaskBindingGate {
                mode: modes.task_binding,
            },
        )
        .register(EventKind::PreToolUse, 35, TaskClaimGate)
        .register(
            EventKind::PreToolUse,
            40,
            DestructiveCommandGate {
                mode: modes.destructive_command,
            },
        )
        .register(
            EventKind::PreToolUse,
            50,
            MinimalDocsGate {
                mode: modes.minimal_docs,
                max_prose_lines: config.docs_max_prose_lines,
            },
        )
        .register(
            EventKind::PreToolUse,
            55,
            CustodietGate {
                mode: modes.custodiet,
                threshold: config.custodiet_threshold,
            },
        )
        .register(
            EventKind::PreToolUse,
            60,
            CriticGate {
                mode: modes.critic,
            },
        )
        .register(EventKind::TaskBind, 20, SingleBindingGate)
        .register(EventKind::TaskBind, 30, TaskAvailableGate)
        .register(EventKind::TaskUnbind, 20, UnbindMatchesGate)
        .register(
            EventKind::Stop,
            20,
            HandoverGate {
                mode: modes.handover,
            },
        );
    for (gate_id, ms) in &modes.budgets_ms {
        builder = builder.budget(gate_id.clone(), Duration::from_millis(*ms));
    }
    builder.build()
}

fn message(gate: &str, mode: GateMode, input: &GateInput, summary: &str, next: &str) -> String {
    GateMessage {
        gate,
        mode,
        tool: input.tool(),
        summary,
        next,
    }
    .render()
}

fn enforce(
    gate: &str,
    mode: GateMode,
    reason: ReasonCode,
    input: &GateInput,
    summary: &str,
    next: &str,
) -> GateResult {
    GateResult::enforce(gate, mode, reason, message(gate, mode, input, summary, next))
}

pub struct SessionEndedGate;

impl Gate for SessionEndedGate {
    fn id(&self) -> &'static str {
        SESSION_ENDED
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        if !input.session.is_ended() {
            return GateResult::allow(SESSION_ENDED);
        }
        enforce(
            SESSION_ENDED,
            GateMode::Block,
            ReasonCode::SessionEnded,
            input,
            "This session has ended.",
            "Start a new session.",
        )
    }
}

pub struct PhaseOrderGate;

impl Gate for PhaseOrderGate {
    fn id(&self) -> &'static str {
        PHASE_ORDER
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let effect = effect_of(&input.event.payload);
        if !is_regression(input.session.phase, effect) {
            return GateResult::allow(PHASE_ORDER);
        }
        let target = match effect {
            PhaseEffect::Enter(target) | PhaseEffect::AtLeast(target) => target.as_str(),
            PhaseEffect::None => input.session.phase.as_str(),
        };
        let summary = format!(
            "{} would move the session back from {} to {target}.",
            input.event.kind(),
            input.session.phase
        );
        enforce(
            PHASE_ORDER,
            GateMode::Block,
            ReasonCode::PhaseRegression,
            input,
            &summary,
            "Continue from the current phase.",
        )
    }
}

pub struct HydrationGate {
    pub mode: GateMode,
}

impl HydrationGate {
    fn is_exempt(input: &GateInput) -> bool {
        let Some(tool) = input.tool() else {
            return true;
        };
        if tool.name.to_ascii_lowercase().contains("hydrator") {
            return true;
        }
        match &tool.input {
            ToolInput::Delegate { agent } => agent.to_ascii_lowercase().contains("hydrator"),
            ToolInput::ReadFile { path } => path.contains("/hydrator/hydrate_"),
            _ => false,
        }
    }
}

impl Gate for HydrationGate {
    fn id(&self) -> &'static str {
        HYDRATION
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        if input.session.hydrated || Self::is_exempt(input) {
            return GateResult::allow(HYDRATION);
        }
        enforce(
            HYDRATION,
            self.mode,
            ReasonCode::HydrationRequired,
            input,
            "Hydration required before using tools.",
            "Invoke the prompt-hydrator agent.",
        )
    }
}

pub struct TaskBindingGate {
    pub mode: GateMode,
}

impl Gate for TaskBindingGate {
    fn id(&self) -> &'static str {
        TASK_BINDING
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(tool) = input.tool() else {
            return GateResult::allow(TASK_BINDING);
        };
        let needs_task = tool.category == ToolCategory::Write
            && match &tool.input {
                ToolInput::TaskOp { .. } => false,
                ToolInput::Shell { command } => is_mutating(command),
                _ => true,
            };
        if !needs_task
            || input.session.active_task_id.is_some()
            || input.session.is_streamlined()
        {
            return GateResult::allow(TASK_BINDING);
        }
        enforce(
            TASK_BINDING,
            self.mode,
            ReasonCode::TaskRequired,
            input,
            "This tool modifies state and no task is bound to the session.",
            "Claim a task first: update_task(id=\"...\", status=\"active\").",
        )
    }
}

pub struct TaskClaimGate;

impl Gate for TaskClaimGate {
    fn id(&self) -> &'static str {
        TASK_CLAIM
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let claims = matches!(
            input.tool().map(|tool| &tool.input),
            Some(ToolInput::TaskOp {
                op: TaskOpKind::Update,
                status: Some(TaskStatus::Active),
                ..
            }) | Some(ToolInput::TaskOp {
                op: TaskOpKind::Claim,
                task_id: Some(_),
                ..
            })
        );
        let unmet = input.unmet_dependencies();
        if !claims || input.subject.is_none() || unmet.is_empty() {
            return GateResult::allow(TASK_CLAIM);
        }
        let summary = format!("Dependencies not completed: {}.", unmet.join(", "));
        enforce(
            TASK_CLAIM,
            GateMode::Block,
            ReasonCode::DependenciesUnmet,
            input,
            &summary,
            "Complete the dependencies first or pick a ready task.",
        )
    }
}

pub struct DestructiveCommandGate {
    pub mode: GateMode,
}

impl Gate for DestructiveCommandGate {
    fn id(&self) -> &'static str {
        DESTRUCTIVE_COMMAND
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        match input.tool().map(|tool| &tool.input) {
            Some(ToolInput::Shell { command }) if is_destructive_git(command) => enforce(
                DESTRUCTIVE_COMMAND,
                self.mode,
                ReasonCode::DestructiveCommand,
                input,
                &format!("Destructive git command: {command}"),
                "Use a safe alternative or ask the user for explicit confirmation.",
            ),
            _ => GateResult::allow(DESTRUCTIVE_COMMAND),
        }
    }
}

pub struct MinimalDocsGate {
    pub mode: GateMode,
    pub max_prose_lines: usize,
}

impl Gate for MinimalDocsGate {
    fn id(&self) -> &'static str {
        MINIMAL_DOCS
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(ToolInput::WriteFile { path, content }) = input.tool().map(|tool| &tool.input)
        else {
            return GateResult::allow(MINIMAL_DOCS);
        };
        if is_guide_file(path) {
            return enforce(
                MINIMAL_DOCS,
                self.mode,
                ReasonCode::DocumentationLimit,
                input,
                "*GUIDE.md files are not allowed.",
                "Add two sentences to README.md instead.",
            );
        }
        if !is_markdown(path) {
            return GateResult::allow(MINIMAL_DOCS);
        }
        let prose = count_prose_lines(content);
        if prose <= self.max_prose_lines {
            return GateResult::allow(MINIMAL_DOCS);
        }
        enforce(
            MINIMAL_DOCS,
            self.mode,
            ReasonCode::DocumentationLimit,
            input,
            &format!(
                "{prose} prose lines exceeds the {} line limit (code blocks excluded).",
                self.max_prose_lines
            ),
            "Split into focused documents or cut content.",
        )
    }
}

pub struct SingleBindingGate;

impl Gate for SingleBindingGate {
    fn id(&self) -> &'static str {
        SINGLE_BINDING
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let (EventPayload::TaskBind { task_id }, Some(bound)) =
            (&input.event.payload, input.session.active_task_id.as_deref())
        else {
            return GateResult::allow(SINGLE_BINDING);
        };
        if bound == task_id {
            return GateResult::allow(SINGLE_BINDING);
        }
        enforce(
            SINGLE_BINDING,
            GateMode::Block,
            ReasonCode::TaskAlreadyBound,
            input,
            &format!("Task '{bound}' is already bound to this session."),
            &format!("Unbind '{bound}' before binding '{task_id}'."),
        )
    }
}

pub struct TaskAvailableGate;

impl Gate for TaskAvailableGate {
    fn id(&self) -> &'static str {
        TASK_AVAILABLE
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let EventPayload::TaskBind { task_id } = &input.event.payload else {
            return GateResult::allow(TASK_AVAILABLE);
        };
        let unavailable = |summary: String| {
            enforce(
                TASK_AVAILABLE,
                GateMode::Block,
                ReasonCode::TaskUnavailable,
                input,
                &summary,
                "Pick a ready task.",
            )
        };
        let Some(task) = &input.subject else {
            return unavailable(format!("Task '{task_id}' does not exist."));
        };
        if matches!(task.status, TaskStatus::Archived | TaskStatus::Completed) {
            return unavailable(format!("Task '{task_id}' is {}.", task.status));
        }
        let unmet = input.unmet_dependencies();
        if unmet.is_empty() {
            return GateResult::allow(TASK_AVAILABLE);
        }
        enforce(
            TASK_AVAILABLE,
            GateMode::Block,
            ReasonCode::DependenciesUnmet,
            input,
            &format!("Dependencies not completed: {}.", unmet.join(", ")),
            "Complete the dependencies first or pick a ready task.",
        )
    }
}

pub struct UnbindMatchesGate;

impl Gate for UnbindMatchesGate {
    fn id(&self) -> &'static str {
        UNBIND_MATCHES
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let EventPayload::TaskUnbind { task_id, .. } = &input.event.payload else {
            return GateResult::allow(UNBIND_MATCHES);
        };
        let summary = match input.session.active_task_id.as_deref() {
            Some(bound) if bound == task_id => return GateResult::allow(UNBIND_MATCHES),
            Some(bound) => format!("Task '{task_id}' is not bound; '{bound}' is."),
            None => format!("Task '{task_id}' is not bound; no task is bound."),
        };
        enforce(
            UNBIND_MATCHES,
            GateMode::Warn,
            ReasonCode::TaskNotBound,
            input,
            &summary,
            "Session binding left unchanged.",
        )
    }
}

pub struct HandoverGate {
    pub mode: GateMode,
}

impl Gate for HandoverGate {
    fn id(&self) -> &'static str {
        HANDOVER
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        let Some(bound_id) = input.session.active_task_id.as_deref() else {
            return GateResult::allow(HANDOVER);
        };
        if input
            .bound
            .as_ref()
            .is_some_and(|task| task.status == TaskStatus::Completed)
        {
            return GateResult::allow(HANDOVER);
        }
        enforce(
            HANDOVER,
            self.mode,
            ReasonCode::HandoverPending,
            input,
            &format!("Bound task '{bound_id}' is not completed."),
            "Complete the task or record a handover before stopping.",
        )
    }
}


/// Periodic compliance checks: write tools stop once too many tool calls have
/// passed since the custodiet agent last ran, or while a custodiet block is set.
pub struct CustodietGate {
    pub mode: GateMode,
    pub threshold: u32,
}

impl Gate for CustodietGate {
    fn id(&self) -> &'static str {
        CUSTODIET
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        if input.tool().is_none_or(|tool| tool.category != ToolCategory::Write) {
            return GateResult::allow(CUSTODIET);
        }
        let summary = if let Some(reason) = &input.session.custodiet_block {
            format!("Custodiet block active: {reason}")
        } else {
            let count = input.session.tool_calls_since_compliance;
            if count < self.threshold {
                return GateResult::allow(CUSTODIET);
            }
            format!(
                "Compliance check required ({count}/{} tool calls).",
                self.threshold
            )
        };
        enforce(
            CUSTODIET,
            self.mode,
            ReasonCode::ComplianceCheckRequired,
            input,
            &summary,
            "Invoke the aops-core:custodiet agent.",
        )
    }
}

/// Write tools need the critic to have approved the current plan.
pub struct CriticGate {
    pub mode: GateMode,
}

impl Gate for CriticGate {
    fn id(&self) -> &'static str {
        CRITIC
    }

    fn evaluate(&self, input: &GateInput) -> GateResult {
        if input.session.critic_approved
            || input.tool().is_none_or(|tool| tool.category != ToolCategory::Write)
        {
            return GateResult::allow(CRITIC);
        }
        enforce(
            CRITIC,
            self.mode,
            ReasonCode::CriticApprovalRequired,
            input,
            "Critic approval required for write operations.",
            "Invoke the critic agent to review the plan.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::StartSource;
    use crate::core::types::{GateVerdict, Phase, Workflow};
    use crate::gates::DependencyState;
    use crate::test_support::{
        delegate, event, gate_input, pre_tool, read_file, session, shell, task, task_op,
        write_file,
    };

    fn hydrated(phase: Phase) -> crate::core::session::SessionState {
        let mut state = session("s1", phase);
        state.hydrated = true;
        state.workflow = Some(Workflow::Standard);
        state
    }

    #[test]
    fn ended_session_blocks_everything() {
        let input = gate_input(event("s1", EventPayload::Stop {}), session("s1", Phase::End));
        let result = SessionEndedGate.evaluate(&input);
        assert_eq!(result.reason, Some(ReasonCode::SessionEnded));
        assert!(result.is_block());
    }

    #[test]
    fn restart_after_progress_is_a_regression() {
        let start = event(
            "s1",
            EventPayload::SessionStart {
                source: StartSource::Startup,
            },
        );
        let input = gate_input(start.clone(), session("s1", Phase::Orchestrate));
        assert_eq!(
            PhaseOrderGate.evaluate(&input).reason,
            Some(ReasonCode::PhaseRegression)
        );
        let resume = event(
            "s1",
            EventPayload::SessionStart {
                source: StartSource::Resume,
            },
        );
        let input = gate_input(resume, session("s1", Phase::Orchestrate));
        assert_eq!(PhaseOrderGate.evaluate(&input).verdict, GateVerdict::Allow);
    }

    #[test]
    fn hydration_exempts_hydrator_spawn_and_reads() {
        let gate = HydrationGate {
            mode: GateMode::Block,
        };
        let blocked = gate.evaluate(&gate_input(
            pre_tool("s1", shell("ls")),
            session("s1", Phase::Hydrate),
        ));
        assert_eq!(blocked.reason, Some(ReasonCode::HydrationRequired));
        assert!(blocked.is_block());

        let spawn = gate.evaluate(&gate_input(
            pre_tool("s1", delegate("Task", "aops-core:prompt-hydrator")),
            session("s1", Phase::Hydrate),
        ));
        assert_eq!(spawn.verdict, GateVerdict::Allow);

        let read = gate.evaluate(&gate_input(
            pre_tool("s1", read_file("/tmp/hydrator/hydrate_abc.md")),
            session("s1", Phase::Hydrate),
        ));
        assert_eq!(read.verdict, GateVerdict::Allow);
    }

    #[test]
    fn hydration_in_warn_mode_only_warns() {
        let gate = HydrationGate {
            mode: GateMode::Warn,
        };
        let result = gate.evaluate(&gate_input(
            pre_tool("s1", shell("ls")),
            session("s1", Phase::Hydrate),
        ));
        assert_eq!(result.verdict, GateVerdict::Warn);
    }

    #[test]
    fn task_binding_requires_a_task_for_writes() {
        let gate = TaskBindingGate {
            mode: GateMode::Block,
        };
        let write = gate.evaluate(&gate_input(
            pre_tool("s1", write_file("notes.txt", "x")),
            hydrated(Phase::Route),
        ));
        assert_eq!(write.reason, Some(ReasonCode::TaskRequired));

        let read_only_shell = gate.evaluate(&gate_input(
            pre_tool("s1", shell("git status")),
            hydrated(Phase::Route),
        ));
        assert_eq!(read_only_shell.verdict, GateVerdict::Allow);

        let task_tool = gate.evaluate(&gate_input(
            pre_tool("s1", task_op(TaskOpKind::Create, None, None)),
            hydrated(Phase::Route),
        ));
        assert_eq!(task_tool.verdict, GateVerdict::Allow);

        let mut streamlined = hydrated(Phase::Route);
        streamlined.workflow = Some(Workflow::SimpleQuestion);
        let result = gate.evaluate(&gate_input(
            pre_tool("s1", write_file("notes.txt", "x")),
            streamlined,
        ));
        assert_eq!(result.verdict, GateVerdict::Allow);
    }

    #[test]
    fn claiming_a_task_with_unmet_dependencies_blocks() {
        let mut input = gate_input(
            pre_tool(
                "s1",
                task_op(TaskOpKind::Update, Some("t1"), Some(TaskStatus::Active)),
            ),
            hydrated(Phase::Route),
        );
        input.subject = Some(task("t1", TaskStatus::Inbox));
        input.dependencies = vec![
            DependencyState {
                id: "d1".to_string(),
                status: Some(TaskStatus::Completed),
            },
            DependencyState {
                id: "d2".to_string(),
                status: Some(TaskStatus::Active),
            },
        ];
        let result = TaskClaimGate.evaluate(&input);
        assert_eq!(result.reason, Some(ReasonCode::DependenciesUnmet));
        assert!(result.remediation.as_deref().unwrap_or("").contains("d2"));
    }

    #[test]
    fn destructive_git_is_blocked() {
        let gate = DestructiveCommandGate {
            mode: GateMode::Block,
        };
        let result = gate.evaluate(&gate_input(
            pre_tool("s1", shell("git reset --hard HEAD")),
            hydrated(Phase::Orchestrate),
        ));
        assert_eq!(result.reason, Some(ReasonCode::DestructiveCommand));
    }

    #[test]
    fn docs_limits() {
        let gate = MinimalDocsGate {
            mode: GateMode::Block,
            max_prose_lines: 3,
        };
        let eval = |path: &str, content: &str| {
            gate.evaluate(&gate_input(
                pre_tool("s1", write_file(path, content)),
                hydrated(Phase::Orchestrate),
            ))
        };
        assert!(eval("docs/SETUP-GUIDE.md", "short").is_block());
        assert!(eval("README.md", "a\nb\nc\nd").is_block());
        assert!(!eval("README.md", "a\n```\nx\ny\nz\n```\nb").is_block());
        assert!(!eval("notes.txt", "a\nb\nc\nd").is_block());
    }

    #[test]
    fn binding_rules() {
        let bind = event(
            "s1",
            EventPayload::TaskBind {
                task_id: "t2".to_string(),
            },
        );
        let mut state = hydrated(Phase::Orchestrate);
        state.active_task_id = Some("t1".to_string());
        let result = SingleBindingGate.evaluate(&gate_input(bind.clone(), state));
        assert_eq!(result.reason, Some(ReasonCode::TaskAlreadyBound));

        let missing = TaskAvailableGate.evaluate(&gate_input(bind.clone(), hydrated(Phase::Route)));
        assert_eq!(missing.reason, Some(ReasonCode::TaskUnavailable));

        let mut done = gate_input(bind.clone(), hydrated(Phase::Route));
        done.subject = Some(task("t2", TaskStatus::Completed));
        assert_eq!(
            TaskAvailableGate.evaluate(&done).reason,
            Some(ReasonCode::TaskUnavailable)
        );

        let mut blocked = gate_input(bind, hydrated(Phase::Route));
        blocked.subject = Some(task("t2", TaskStatus::Blocked));
        assert_eq!(TaskAvailableGate.evaluate(&blocked).verdict, GateVerdict::Allow);
    }

    #[test]
    fn unbinding_the_wrong_task_warns() {
        let unbind = event(
            "s1",
            EventPayload::TaskUnbind {
                task_id: "t2".to_string(),
                completed: false,
            },
        );
        let mut state = hydrated(Phase::Orchestrate);
        state.active_task_id = Some("t1".to_string());
        let result = UnbindMatchesGate.evaluate(&gate_input(unbind, state));
        assert_eq!(result.verdict, GateVerdict::Warn);
        assert_eq!(result.reason, Some(ReasonCode::TaskNotBound));
    }

    #[test]
    fn handover_warns_on_open_bound_task() {
        let gate = HandoverGate {
            mode: GateMode::Warn,
        };
        let mut state = hydrated(Phase::Orchestrate);
        state.active_task_id = Some("t1".to_string());
        let mut input = gate_input(event("s1", EventPayload::Stop {}), state);
        input.bound = Some(task("t1", TaskStatus::Active));
        assert_eq!(gate.evaluate(&input).reason, Some(ReasonCode::HandoverPending));
        input.bound = Some(task("t1", TaskStatus::Completed));
        assert_eq!(gate.evaluate(&input).verdict, GateVerdict::Allow);
    }

    #[test]
    fn custodiet_stops_writes_past_the_threshold() {
        let gate = CustodietGate {
            mode: GateMode::Block,
            threshold: 3,
        };
        let mut state = hydrated(Phase::Orchestrate);
        state.tool_calls_since_compliance = 2;
        let write = pre_tool("s1", write_file("a.rs", "x"));
        assert_eq!(
            gate.evaluate(&gate_input(write.clone(), state.clone())).verdict,
            GateVerdict::Allow
        );

        state.tool_calls_since_compliance = 3;
        let result = gate.evaluate(&gate_input(write, state.clone()));
        assert!(result.is_block());
        assert_eq!(result.reason, Some(ReasonCode::ComplianceCheckRequired));
        assert!(result.remediation.as_deref().unwrap_or("").contains("3/3"));

        let read = gate.evaluate(&gate_input(pre_tool("s1", read_file("a.rs")), state.clone()));
        assert_eq!(read.verdict, GateVerdict::Allow);
        let spawn = gate.evaluate(&gate_input(
            pre_tool("s1", delegate("Task", "aops-core:custodiet")),
            state,
        ));
        assert_eq!(spawn.verdict, GateVerdict::Allow);
    }

    #[test]
    fn explicit_custodiet_block_applies_below_threshold() {
        let gate = CustodietGate {
            mode: GateMode::Warn,
            threshold: 7,
        };
        let mut state = hydrated(Phase::Orchestrate);
        state.custodiet_block = Some("scope drift".to_string());
        let result = gate.evaluate(&gate_input(pre_tool("s1", shell("make")), state));
        assert_eq!(result.verdict, GateVerdict::Warn);
        assert!(result.remediation.as_deref().unwrap_or("").contains("scope drift"));
    }

    #[test]
    fn critic_opens_writes_after_approval() {
        let gate = CriticGate {
            mode: GateMode::Block,
        };
        let mut state = hydrated(Phase::Orchestrate);
        let write = pre_tool("s1", write_file("a.rs", "x"));
        let blocked = gate.evaluate(&gate_input(write.clone(), state.clone()));
        assert_eq!(blocked.reason, Some(ReasonCode::CriticApprovalRequired));
        assert!(blocked.is_block());

        let read = gate.evaluate(&gate_input(pre_tool("s1", read_file("a.rs")), state.clone()));
        assert_eq!(read.verdict, GateVerdict::Allow);

        state.critic_approved = true;
        assert_eq!(gate.evaluate(&gate_input(write, state)).verdict, GateVerdict::Allow);
    }

    #[test]
    fn default_registry_orders_pre_tool_gates() {
        let registry = default_registry(&GatekeeperConfig::default());
        let ids: Vec<_> = registry
            .matching(EventKind::PreToolUse)
            .iter()
            .map(|entry| entry.id())
            .collect();
        assert_eq!(
            ids,
            vec![
                SESSION_ENDED,
                PHASE_ORDER,
                HYDRATION,
                TASK_BINDING,
                TASK_CLAIM,
                DESTRUCTIVE_COMMAND,
                MINIMAL_DOCS,
                CUSTODIET,
                CRITIC
            ]
        );
    }
}

//! State changes implied by an allowed event.
//!
//! Planning is pure: the enforcer persists the planned session and applies the
//! task change through the store.

use crate::core::event::{Event, EventPayload, ToolInput};
use crate::core::phase;
use crate::core::session::SessionState;
use crate::core::task::TaskNode;
use crate::core::types::TaskStatus;

/// Agent whose run resets the compliance counter.
pub const CUSTODIET_AGENT: &str = "custodiet";
/// Agent whose `APPROVED` output opens the critic gate.
pub const CRITIC_AGENT: &str = "critic";

/// Versioned status change to apply to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskChange {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectPlan {
    pub session: SessionState,
    pub task_change: Option<TaskChange>,
}

/// Compute the next session state and any task change for `event`.
///
/// `subject` is the task the event refers to, as read before evaluation.
pub fn plan(event: &Event, current: &SessionState, subject: Option<&TaskNode>) -> EffectPlan {
    let mut session = current.clone();
    session.phase = phase::advance(current.phase, phase::effect_of(&event.payload));
    session.updated_at = event.timestamp.max(current.updated_at);
    let mut task_change = None;

    match &event.payload {
        EventPayload::HydrationComplete { workflow } => {
            session.hydrated = true;
            if session.workflow.is_none() {
                session.workflow = Some(*workflow);
            }
        }
        EventPayload::TaskBind { task_id } => {
            session.active_task_id = Some(task_id.clone());
            task_change = transition(subject, task_id, TaskStatus::Inbox, TaskStatus::Active);
        }
        EventPayload::TaskUnbind { task_id, completed } => {
            if current.active_task_id.as_deref() == Some(task_id.as_str()) {
                session.active_task_id = None;
                if *completed {
                    task_change =
                        transition(subject, task_id, TaskStatus::Active, TaskStatus::Completed);
                }
            }
        }
        EventPayload::UserPromptSubmit { .. } => {
            // A new prompt is a new plan.
            session.critic_approved = false;
        }
        EventPayload::PostToolUse {
            tool,
            succeeded,
            approved,
        } => {
            if tool.invokes(CUSTODIET_AGENT) {
                session.tool_calls_since_compliance = 0;
            } else {
                session.tool_calls_since_compliance =
                    session.tool_calls_since_compliance.saturating_add(1);
            }
            if *succeeded && *approved && tool.invokes(CRITIC_AGENT) {
                session.critic_approved = true;
            }
            if *succeeded && let ToolInput::Delegate { agent } = &tool.input {
                *session
                    .subagent_invocations
                    .entry(agent.clone())
                    .or_insert(0) += 1;
            }
        }
        _ => {}
    }

    EffectPlan {
        session,
        task_change,
    }
}

fn transition(
    subject: Option<&TaskNode>,
    task_id: &str,
    from: TaskStatus,
    to: TaskStatus,
) -> Option<TaskChange> {
    subject
        .filter(|task| task.id == task_id && task.status == from)
        .map(|_| TaskChange {
            task_id: task_id.to_string(),
            from,
            to,
        })
}

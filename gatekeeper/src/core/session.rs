//! Per-session policy state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{Phase, Workflow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub phase: Phase,
    pub hydrated: bool,
    /// Set once, when hydration routes the session.
    pub workflow: Option<Workflow>,
    pub active_task_id: Option<String>,
    /// Completed delegations per agent type.
    #[serde(default)]
    pub subagent_invocations: BTreeMap<String, u32>,
    /// Tool calls since the custodiet agent last ran.
    #[serde(default)]
    pub tool_calls_since_compliance: u32,
    /// Explicit custodiet block and its reason; cleared by an operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custodiet_block: Option<String>,
    /// The critic approved the current plan. Reset by every new prompt.
    #[serde(default)]
    pub critic_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            phase: Phase::Start,
            hydrated: false,
            workflow: None,
            active_task_id: None,
            subagent_invocations: BTreeMap::new(),
            tool_calls_since_compliance: 0,
            custodiet_block: None,
            critic_approved: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.phase == Phase::End
    }

    /// Streamlined workflows may write without a bound task.
    pub fn is_streamlined(&self) -> bool {
        self.workflow.is_some_and(Workflow::is_streamlined)
    }
}

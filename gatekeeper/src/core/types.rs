//! Shared enumerations for tasks, sessions, and gate outcomes.
//!
//! Every enum here is closed and serializes to a stable lowercase (or
//! PascalCase, for reason codes) string so persisted records and verdicts stay
//! readable by other tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Inbox,
    Active,
    Blocked,
    Completed,
    Archived,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Inbox,
        TaskStatus::Active,
        TaskStatus::Blocked,
        TaskStatus::Completed,
        TaskStatus::Archived,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Inbox => "inbox",
            TaskStatus::Active => "active",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Completed => "completed",
            TaskStatus::Archived => "archived",
        }
    }

    /// Statuses a task can be picked up from.
    pub fn is_workable(self) -> bool {
        matches!(self, TaskStatus::Inbox | TaskStatus::Active)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    /// Accepts canonical names plus the legacy task-manager spellings
    /// (`done`, `waiting`, `cancelled`, `in_progress`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "inbox" | "todo" => Ok(TaskStatus::Inbox),
            "active" | "in_progress" | "in-progress" => Ok(TaskStatus::Active),
            "blocked" | "waiting" => Ok(TaskStatus::Blocked),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "archived" | "cancelled" => Ok(TaskStatus::Archived),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Decomposition level of a task.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Goal,
    Project,
    #[default]
    Task,
    Action,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Goal => "goal",
            TaskType::Project => "project",
            TaskType::Task => "task",
            TaskType::Action => "action",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "goal" => Ok(TaskType::Goal),
            "project" => Ok(TaskType::Project),
            "task" => Ok(TaskType::Task),
            "action" => Ok(TaskType::Action),
            other => Err(format!("unknown task type '{other}'")),
        }
    }
}

/// Session phase. Declaration order is the phase order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Start,
    Hydrate,
    Route,
    Orchestrate,
    Verify,
    End,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Start,
        Phase::Hydrate,
        Phase::Route,
        Phase::Orchestrate,
        Phase::Verify,
        Phase::End,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Hydrate => "hydrate",
            Phase::Route => "route",
            Phase::Orchestrate => "orchestrate",
            Phase::Verify => "verify",
            Phase::End => "end",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow chosen by hydration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workflow {
    InteractiveFollowup,
    SimpleQuestion,
    DirectSkill,
    Handover,
    #[default]
    Standard,
}

impl Workflow {
    /// Parse a workflow slug. Unknown slugs fall back to `Standard`.
    pub fn from_slug(slug: &str) -> Self {
        match slug.trim().to_ascii_lowercase().as_str() {
            "interactive-followup" => Workflow::InteractiveFollowup,
            "simple-question" => Workflow::SimpleQuestion,
            "direct-skill" => Workflow::DirectSkill,
            "handover" => Workflow::Handover,
            _ => Workflow::Standard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::InteractiveFollowup => "interactive-followup",
            Workflow::SimpleQuestion => "simple-question",
            Workflow::DirectSkill => "direct-skill",
            Workflow::Handover => "handover",
            Workflow::Standard => "standard",
        }
    }

    /// Streamlined workflows may write without a bound task.
    pub fn is_streamlined(self) -> bool {
        matches!(
            self,
            Workflow::InteractiveFollowup | Workflow::SimpleQuestion | Workflow::DirectSkill
        )
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateVerdict {
    Allow,
    Block,
    Warn,
}

/// Enforcement mode for gates that can either block or only warn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    Block,
    Warn,
}

impl GateMode {
    pub fn verdict(self) -> GateVerdict {
        match self {
            GateMode::Block => GateVerdict::Block,
            GateMode::Warn => GateVerdict::Warn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GateMode::Block => "block",
            GateMode::Warn => "warn",
        }
    }
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GateMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(GateMode::Block),
            "warn" => Ok(GateMode::Warn),
            other => Err(format!("unknown gate mode '{other}' (expected block or warn)")),
        }
    }
}

/// Machine-readable reason attached to a non-allow gate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    SessionEnded,
    PhaseRegression,
    HydrationRequired,
    TaskRequired,
    TaskAlreadyBound,
    TaskNotBound,
    TaskUnavailable,
    DependenciesUnmet,
    DestructiveCommand,
    DocumentationLimit,
    HandoverPending,
    ComplianceCheckRequired,
    CriticApprovalRequired,
    Timeout,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::SessionEnded => "SessionEnded",
            ReasonCode::PhaseRegression => "PhaseRegression",
            ReasonCode::HydrationRequired => "HydrationRequired",
            ReasonCode::TaskRequired => "TaskRequired",
            ReasonCode::TaskAlreadyBound => "TaskAlreadyBound",
            ReasonCode::TaskNotBound => "TaskNotBound",
            ReasonCode::TaskUnavailable => "TaskUnavailable",
            ReasonCode::DependenciesUnmet => "DependenciesUnmet",
            ReasonCode::DestructiveCommand => "DestructiveCommand",
            ReasonCode::DocumentationLimit => "DocumentationLimit",
            ReasonCode::HandoverPending => "HandoverPending",
            ReasonCode::ComplianceCheckRequired => "ComplianceCheckRequired",
            ReasonCode::CriticApprovalRequired => "CriticApprovalRequired",
            ReasonCode::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Policy gates.
//!
//! A gate is a pure predicate over a [`GateInput`] snapshot. Gates never touch
//! storage; the enforcer resolves everything they need up front.

pub mod builtin;
pub mod message;
pub mod registry;

use crate::core::event::{Event, ToolCall};
use crate::core::session::SessionState;
use crate::core::task::TaskNode;
use crate::core::types::TaskStatus;
use crate::core::verdict::GateResult;

pub use self::builtin::default_registry;
pub use self::registry::{GateFault, GateRegistry, GateRegistryBuilder, RegisteredGate};

pub trait Gate: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, input: &GateInput) -> GateResult;
}

/// State of one dependency of the subject task. `None` when it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyState {
    pub id: String,
    pub status: Option<TaskStatus>,
}

/// Everything a gate may look at for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct GateInput {
    pub event: Event,
    pub session: SessionState,
    /// Task the event names (archived included).
    pub subject: Option<TaskNode>,
    /// Task bound to the session.
    pub bound: Option<TaskNode>,
    /// Dependencies of `subject`.
    pub dependencies: Vec<DependencyState>,
}

impl GateInput {
    pub fn tool(&self) -> Option<&ToolCall> {
        self.event.payload.tool()
    }

    pub fn unmet_dependencies(&self) -> Vec<&str> {
        self.dependencies
            .iter()
            .filter(|dep| dep.status != Some(TaskStatus::Completed))
            .map(|dep| dep.id.as_str())
            .collect()
    }
}

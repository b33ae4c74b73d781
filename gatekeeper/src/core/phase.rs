//! Session phase machine: which phase an event implies and when that is a
//! regression.

use crate::core::event::{EventPayload, StartSource};
use crate::core::types::Phase;

/// Phase change implied by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEffect {
    None,
    /// Strict: the session must move to exactly this phase; lower is a regression.
    Enter(Phase),
    /// Lenient: advance to this phase unless already past it.
    AtLeast(Phase),
}

pub fn effect_of(payload: &EventPayload) -> PhaseEffect {
    match payload {
        EventPayload::SessionStart { source } => match source {
            StartSource::Startup | StartSource::Clear => PhaseEffect::Enter(Phase::Start),
            StartSource::Resume | StartSource::Compact => PhaseEffect::None,
        },
        EventPayload::UserPromptSubmit { .. } => PhaseEffect::AtLeast(Phase::Hydrate),
        EventPayload::HydrationComplete { .. } => PhaseEffect::Enter(Phase::Route),
        EventPayload::TaskBind { .. } => PhaseEffect::AtLeast(Phase::Orchestrate),
        EventPayload::Stop {} => PhaseEffect::AtLeast(Phase::Verify),
        EventPayload::SessionEnd { .. } => PhaseEffect::Enter(Phase::End),
        EventPayload::PreToolUse { .. }
        | EventPayload::PostToolUse { .. }
        | EventPayload::TaskUnbind { .. }
        | EventPayload::SubagentStop { .. } => PhaseEffect::None,
    }
}

/// A strict effect whose target lies behind the current phase.
pub fn is_regression(current: Phase, effect: PhaseEffect) -> bool {
    matches!(effect, PhaseEffect::Enter(target) if target < current)
}

/// Phase after applying `effect`. Never lower than `current`.
pub fn advance(current: Phase, effect: PhaseEffect) -> Phase {
    match effect {
        PhaseEffect::None => current,
        PhaseEffect::Enter(target) | PhaseEffect::AtLeast(target) => current.max(target),
    }
}

//! Gate results and their aggregation into a verdict.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::types::{GateMode, GateVerdict, ReasonCode};

/// Outcome of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: String,
    pub verdict: GateVerdict,
    pub reason: Option<ReasonCode>,
    pub remediation: Option<String>,
}

impl GateResult {
    pub fn allow(gate_id: &str) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            verdict: GateVerdict::Allow,
            reason: None,
            remediation: None,
        }
    }

    pub fn block(gate_id: &str, reason: ReasonCode, remediation: impl Into<String>) -> Self {
        Self::with_verdict(gate_id, GateVerdict::Block, reason, remediation)
    }

    pub fn warn(gate_id: &str, reason: ReasonCode, remediation: impl Into<String>) -> Self {
        Self::with_verdict(gate_id, GateVerdict::Warn, reason, remediation)
    }

    /// Block or warn depending on the gate's configured mode.
    pub fn enforce(
        gate_id: &str,
        mode: GateMode,
        reason: ReasonCode,
        remediation: impl Into<String>,
    ) -> Self {
        Self::with_verdict(gate_id, mode.verdict(), reason, remediation)
    }

    fn with_verdict(
        gate_id: &str,
        verdict: GateVerdict,
        reason: ReasonCode,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            verdict,
            reason: Some(reason),
            remediation: Some(remediation.into()),
        }
    }

    pub fn is_block(&self) -> bool {
        self.verdict == GateVerdict::Block
    }

    fn warning_line(&self) -> String {
        let reason = self.reason.map_or("Warning", ReasonCode::as_str);
        match &self.remediation {
            Some(text) => format!("{reason} ({}): {text}", self.gate_id),
            None => format!("{reason} ({})", self.gate_id),
        }
    }
}

/// Aggregate answer returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    pub warnings: Vec<String>,
    pub blocking_reason: Option<String>,
    pub remediation: Option<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            warnings: Vec::new(),
            blocking_reason: None,
            remediation: None,
        }
    }

    pub fn block(reason: ReasonCode, remediation: Option<String>) -> Self {
        Self {
            allowed: false,
            warnings: Vec::new(),
            blocking_reason: Some(reason.to_string()),
            remediation,
        }
    }
}

/// One gate run as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub gate_id: String,
    pub verdict: GateVerdict,
    pub reason: Option<ReasonCode>,
    pub elapsed_ms: u64,
}

/// Running aggregation of gate results in evaluation order.
///
/// The first block stops the evaluation; warnings accumulate; an empty
/// evaluation allows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub trace: Vec<TraceEntry>,
    pub warnings: Vec<String>,
    pub blocked_by: Option<GateResult>,
}

impl Evaluation {
    /// Record a result. Returns `true` once the evaluation is blocked.
    pub fn record(&mut self, result: GateResult, elapsed: Duration) -> bool {
        self.trace.push(TraceEntry {
            gate_id: result.gate_id.clone(),
            verdict: result.verdict,
            reason: result.reason,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        match result.verdict {
            GateVerdict::Allow => {}
            GateVerdict::Warn => self.warnings.push(result.warning_line()),
            GateVerdict::Block => self.blocked_by = Some(result),
        }
        self.is_blocked()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }

    pub fn verdict(&self) -> Verdict {
        match &self.blocked_by {
            Some(block) => Verdict {
                allowed: false,
                warnings: self.warnings.clone(),
                blocking_reason: block.reason.map(|r| r.to_string()),
                remediation: block.remediation.clone(),
            },
            None => Verdict {
                warnings: self.warnings.clone(),
                ..Verdict::allow()
            },
        }
    }
}

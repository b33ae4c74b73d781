//! Gate registry: gates indexed by event kind, ordered by priority, and
//! evaluated with a per-gate time budget.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::event::EventKind;
use crate::core::types::ReasonCode;
use crate::core::verdict::{Evaluation, GateResult};
use crate::gates::{Gate, GateInput};

/// The evaluation worker died (a gate panicked) or could not be started.
#[derive(Debug, Error)]
#[error("gate '{gate_id}': {message}")]
pub struct GateFault {
    pub gate_id: String,
    pub message: String,
}

pub struct RegisteredGate {
    pub gate: Arc<dyn Gate>,
    pub priority: i32,
    /// Overrides the caller's default budget.
    pub budget: Option<Duration>,
    seq: usize,
}

impl RegisteredGate {
    pub fn id(&self) -> &'static str {
        self.gate.id()
    }
}

impl fmt::Debug for RegisteredGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredGate")
            .field("id", &self.id())
            .field("priority", &self.priority)
            .field("budget", &self.budget)
            .finish()
    }
}

/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct GateRegistry {
    by_kind: HashMap<EventKind, Vec<Arc<RegisteredGate>>>,
}

impl GateRegistry {
    pub fn builder() -> GateRegistryBuilder {
        GateRegistryBuilder::default()
    }

    /// Gates registered for `kind`, in evaluation order.
    pub fn matching(&self, kind: EventKind) -> &[Arc<RegisteredGate>] {
        self.by_kind.get(&kind).map_or(&[][..], Vec::as_slice)
    }

    /// Evaluate the gates matching the input's event kind in order.
    ///
    /// Gates run one after another on a worker thread. The caller waits at
    /// most each gate's budget (or `default_budget`) for its result; a gate
    /// that overruns is recorded as a `Timeout` block and the evaluation stops.
    /// The worker also stops at the first block.
    pub fn evaluate(
        &self,
        input: Arc<GateInput>,
        default_budget: Duration,
    ) -> Result<Evaluation, GateFault> {
        let gates = self.matching(input.event.kind()).to_vec();
        let mut evaluation = Evaluation::default();
        let Some(first) = gates.first() else {
            return Ok(evaluation);
        };

        let (tx, rx) = mpsc::channel();
        let worker_gates = gates.clone();
        thread::Builder::new()
            .name("gate-eval".to_string())
            .spawn(move || {
                for entry in worker_gates {
                    let started = Instant::now();
                    let result = entry.gate.evaluate(&input);
                    let blocked = result.is_block();
                    if tx.send((result, started.elapsed())).is_err() || blocked {
                        break;
                    }
                }
            })
            .map_err(|err| GateFault {
                gate_id: first.id().to_string(),
                message: format!("spawn evaluation worker: {err}"),
            })?;

        for entry in &gates {
            let budget = entry.budget.unwrap_or(default_budget);
            let waiting = Instant::now();
            match rx.recv_timeout(budget) {
                Ok((result, elapsed)) => {
                    debug!(gate = entry.id(), verdict = ?result.verdict, "gate evaluated");
                    if evaluation.record(result, elapsed) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let budget_ms = budget.as_millis();
                    warn!(gate = entry.id(), budget_ms, "gate exceeded its budget");
                    evaluation.record(
                        GateResult::block(
                            entry.id(),
                            ReasonCode::Timeout,
                            format!("gate '{}' did not finish within {budget_ms} ms", entry.id()),
                        ),
                        waiting.elapsed(),
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GateFault {
                        gate_id: entry.id().to_string(),
                        message: "evaluation worker stopped without a result".to_string(),
                    });
                }
            }
        }
        Ok(evaluation)
    }
}

struct Pending {
    kinds: Vec<EventKind>,
    priority: i32,
    gate: Arc<dyn Gate>,
}

#[derive(Default)]
pub struct GateRegistryBuilder {
    pending: Vec<Pending>,
    budgets: HashMap<String, Duration>,
}

impl GateRegistryBuilder {
    pub fn register(self, kind: EventKind, priority: i32, gate: impl Gate + 'static) -> Self {
        self.register_for(&[kind], priority, gate)
    }

    pub fn register_for(
        mut self,
        kinds: &[EventKind],
        priority: i32,
        gate: impl Gate + 'static,
    ) -> Self {
        self.pending.push(Pending {
            kinds: kinds.to_vec(),
            priority,
            gate: Arc::new(gate),
        });
        self
    }

    /// Register for every event kind.
    pub fn register_all(self, priority: i32, gate: impl Gate + 'static) -> Self {
        self.register_for(&EventKind::ALL, priority, gate)
    }

    /// Time budget for the gate with `gate_id`.
    pub fn budget(mut self, gate_id: impl Into<String>, budget: Duration) -> Self {
        self.budgets.insert(gate_id.into(), budget);
        self
    }

    pub fn build(self) -> GateRegistry {
        let mut by_kind: HashMap<EventKind, Vec<Arc<RegisteredGate>>> = HashMap::new();
        for (seq, pending) in self.pending.into_iter().enumerate() {
            let entry = Arc::new(RegisteredGate {
                budget: self.budgets.get(pending.gate.id()).copied(),
                gate: pending.gate,
                priority: pending.priority,
                seq,
            });
            for kind in pending.kinds {
                by_kind.entry(kind).or_default().push(Arc::clone(&entry));
            }
        }
        for entries in by_kind.values_mut() {
            entries.sort_by_key(|entry| (entry.priority, entry.seq));
        }
        GateRegistry { by_kind }
    }
}

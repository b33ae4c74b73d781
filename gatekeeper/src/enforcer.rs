//! Policy enforcer: evaluates one canonical event end to end.
//!
//! Per event: admit (closing sessions are answered with `SessionEnded`),
//! take the session lock, load or create the session, resolve the tasks the
//! gates need, run the registry, and on allow persist the implied effects.
//! Every evaluated event leaves one audit record.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::effects::{self, TaskChange};
use crate::core::event::{Event, EventPayload};
use crate::core::session::SessionState;
use crate::core::task::{TaskNode, TaskPatch, is_valid_id};
use crate::core::types::ReasonCode;
use crate::core::verdict::{Evaluation, Verdict};
use crate::error::{EnforceError, SessionError, StoreError};
use crate::gates::{DependencyState, GateInput, GateRegistry};
use crate::io::audit::{AuditLog, AuditRecord};
use crate::io::config::GatekeeperConfig;
use crate::io::session_store::SessionStore;
use crate::io::task_store::TaskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnforcerOptions {
    /// Budget for gates without their own.
    pub gate_timeout: Duration,
    /// How long SessionEnd waits for in-flight events of its session.
    pub drain_timeout: Duration,
    /// Attempts for a task status change that hits a version conflict.
    pub update_retries: u32,
}

impl EnforcerOptions {
    pub fn from_config(config: &GatekeeperConfig) -> Self {
        Self {
            gate_timeout: Duration::from_millis(config.gate_timeout_ms),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
            update_retries: config.update_retries,
        }
    }
}

impl Default for EnforcerOptions {
    fn default() -> Self {
        Self::from_config(&GatekeeperConfig::default())
    }
}

/// Admission bookkeeping for one session.
#[derive(Debug, Default)]
struct InFlight {
    active: usize,
    /// A SessionEnd is draining or being evaluated.
    closing: bool,
    /// A SessionEnd was allowed and committed.
    ended: bool,
}

impl InFlight {
    fn refuses(&self) -> bool {
        self.closing || self.ended
    }
}

#[derive(Debug)]
pub struct PolicyEnforcer {
    registry: Arc<GateRegistry>,
    tasks: TaskStore,
    sessions: SessionStore,
    audit: AuditLog,
    options: EnforcerOptions,
    inflight: Mutex<HashMap<String, InFlight>>,
    drained: Condvar,
}

/// Decrements the session's in-flight count when the event finishes.
///
/// A SessionEnd admission reopens the session on drop unless it was marked
/// ended, so a failed or blocked SessionEnd leaves the session usable.
struct Admission<'a> {
    enforcer: &'a PolicyEnforcer,
    session_id: &'a str,
    ends_session: bool,
    ended: Cell<bool>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        let mut inflight = self.enforcer.inflight_lock();
        if let Some(entry) = inflight.get_mut(self.session_id) {
            entry.active = entry.active.saturating_sub(1);
            if self.ends_session {
                entry.closing = false;
                entry.ended |= self.ended.get();
            }
            if entry.active == 0 && !entry.refuses() {
                inflight.remove(self.session_id);
            }
        }
        self.enforcer.drained.notify_all();
    }
}

impl PolicyEnforcer {
    pub fn new(
        registry: Arc<GateRegistry>,
        tasks: TaskStore,
        sessions: SessionStore,
        audit: AuditLog,
        options: EnforcerOptions,
    ) -> Self {
        Self {
            registry,
            tasks,
            sessions,
            audit,
            options,
            inflight: Mutex::new(HashMap::new()),
            drained: Condvar::new(),
        }
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Evaluate one event. A blocked verdict is `Ok`; `Err` is an internal
    /// fault or an event for a session that was never started.
    #[instrument(skip_all, fields(session = %event.session_id, kind = %event.kind()))]
    pub fn handle(&self, event: &Event) -> Result<Verdict, EnforceError> {
        if !is_valid_id(&event.session_id) {
            return Err(SessionError::InvalidId(event.session_id.clone()).into());
        }
        let Some(admission) = self.admit(event) else {
            debug!("session closing; event refused");
            let verdict = Verdict::block(
                ReasonCode::SessionEnded,
                Some("This session has ended. Start a new session.".to_string()),
            );
            let task_id = event.task_ref().map(str::to_string);
            self.write_audit(event, task_id, &Evaluation::default(), &verdict)?;
            return Ok(verdict);
        };
        if !admission.ends_session {
            return self
                .sessions
                .lock(&event.session_id, || self.evaluate_locked(event));
        }
        self.drain(&event.session_id);
        let verdict = self
            .sessions
            .lock(&event.session_id, || self.evaluate_locked(event))?;
        admission.ended.set(verdict.allowed);
        if !verdict.allowed {
            debug!(reason = ?verdict.blocking_reason, "session end blocked; session stays open");
        }
        Ok(verdict)
    }

    fn inflight_lock(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit<'a>(&'a self, event: &'a Event) -> Option<Admission<'a>> {
        let mut inflight = self.inflight_lock();
        let entry = inflight.entry(event.session_id.clone()).or_default();
        if entry.refuses() {
            return None;
        }
        entry.active += 1;
        let ends_session = matches!(event.payload, EventPayload::SessionEnd { .. });
        entry.closing |= ends_session;
        Some(Admission {
            enforcer: self,
            session_id: &event.session_id,
            ends_session,
            ended: Cell::new(false),
        })
    }

    /// Wait until this SessionEnd is the only in-flight event of its session.
    fn drain(&self, session_id: &str) {
        let inflight = self.inflight_lock();
        let (_inflight, wait) = self
            .drained
            .wait_timeout_while(inflight, self.options.drain_timeout, |map| {
                map.get(session_id).is_some_and(|entry| entry.active > 1)
            })
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() {
            warn!(
                session = session_id,
                timeout_ms = self.options.drain_timeout.as_millis(),
                "drain timed out; ending session with events still in flight"
            );
        }
    }

    fn evaluate_locked(&self, event: &Event) -> Result<Verdict, EnforceError> {
        let existing = self.sessions.load(&event.session_id)?;
        let session = match (&existing, &event.payload) {
            (Some(state), _) => state.clone(),
            (None, EventPayload::SessionStart { .. }) => {
                SessionState::new(&event.session_id, event.timestamp)
            }
            (None, _) => return Err(EnforceError::UnknownSession(event.session_id.clone())),
        };

        let input = Arc::new(self.resolve(event, &session)?);
        let evaluation = self
            .registry
            .evaluate(Arc::clone(&input), self.options.gate_timeout)
            .map_err(|fault| EnforceError::GateFault(fault.to_string()))?;
        let verdict = evaluation.verdict();
        let task_id = event
            .task_ref()
            .map(str::to_string)
            .or_else(|| session.active_task_id.clone());

        if let Some(block) = &evaluation.blocked_by {
            info!(gate = %block.gate_id, reason = ?block.reason, "event blocked");
            self.write_audit(event, task_id, &evaluation, &verdict)?;
            return Ok(verdict);
        }

        let plan = effects::plan(event, &session, input.subject.as_ref());
        self.sessions.save(&plan.session)?;
        if let Some(change) = &plan.task_change
            && let Err(err) = self.apply_task_change(change)
        {
            self.restore_session(existing.as_ref(), &event.session_id);
            return Err(err);
        }
        debug!(phase = %plan.session.phase, warnings = verdict.warnings.len(), "event allowed");
        self.write_audit(event, task_id, &evaluation, &verdict)?;
        Ok(verdict)
    }

    /// Snapshot the tasks the gates may look at.
    fn resolve(&self, event: &Event, session: &SessionState) -> Result<GateInput, StoreError> {
        let subject = match event.task_ref() {
            Some(id) => self.lookup(id)?,
            None => None,
        };
        let bound = match session.active_task_id.as_deref() {
            Some(id) if subject.as_ref().is_some_and(|task| task.id == id) => subject.clone(),
            Some(id) => self.lookup(id)?,
            None => None,
        };
        let mut dependencies = Vec::new();
        if let Some(task) = &subject {
            for dep in &task.dependency_ids {
                dependencies.push(DependencyState {
                    id: dep.clone(),
                    status: self.lookup(dep)?.map(|dep| dep.status),
                });
            }
        }
        Ok(GateInput {
            event: event.clone(),
            session: session.clone(),
            subject,
            bound,
            dependencies,
        })
    }

    fn lookup(&self, id: &str) -> Result<Option<TaskNode>, StoreError> {
        match self.tasks.get(id, true) {
            Ok(task) => Ok(Some(task)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Re-read and retry on version conflicts. A task no longer in `from`
    /// was moved by someone else and is left alone.
    fn apply_task_change(&self, change: &TaskChange) -> Result<(), EnforceError> {
        let attempts = self.options.update_retries.max(1);
        for attempt in 1..=attempts {
            let current = self.tasks.get(&change.task_id, true)?;
            if current.status != change.from {
                debug!(task = %change.task_id, status = %current.status, "task already moved");
                return Ok(());
            }
            match self
                .tasks
                .update(&change.task_id, TaskPatch::status(change.to), current.version)
            {
                Ok(updated) => {
                    info!(task = %updated.id, to = %change.to, "task status changed");
                    return Ok(());
                }
                Err(StoreError::StorageConflict { .. }) if attempt < attempts => {
                    debug!(task = %change.task_id, attempt, "version conflict; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn restore_session(&self, previous: Option<&SessionState>, session_id: &str) {
        let restored = match previous {
            Some(state) => self.sessions.save(state),
            None => self.sessions.remove(session_id),
        };
        if let Err(err) = restored {
            error!(
                session = session_id,
                error = %err,
                "session not restored after failed task update"
            );
        }
    }

    fn write_audit(
        &self,
        event: &Event,
        task_id: Option<String>,
        evaluation: &Evaluation,
        verdict: &Verdict,
    ) -> Result<(), EnforceError> {
        self.audit.append(&AuditRecord {
            timestamp: Utc::now(),
            event: event.kind(),
            session_id: event.session_id.clone(),
            task_id,
            allowed: verdict.allowed,
            blocking_gate: evaluation
                .blocked_by
                .as_ref()
                .map(|block| block.gate_id.clone()),
            blocking_reason: verdict.blocking_reason.clone(),
            warnings: verdict.warnings.clone(),
            trace: evaluation.trace.clone(),
        })
    }
}

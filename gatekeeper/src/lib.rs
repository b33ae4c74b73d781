//! Policy enforcement for an AI coding-agent host.
//!
//! The host fires lifecycle hooks (session start, prompt, tool use, stop);
//! each is translated into a canonical event, checked against an ordered set
//! of gates, and answered with an allow/block verdict. Task bindings and phase
//! progress are persisted in a file-backed task graph and session store.
//!
//! - **[`core`]**: Pure, deterministic logic (events, phases, transitions,
//!   graph rules, effects). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (task records, index, sessions,
//!   audit log, locks, config).
//! - **[`router`]** translates host payloads, **[`gates`]** evaluates them,
//!   and **[`enforcer`]** ties a verdict to its persisted effects.
//!   [`runtime`] wires all of it for one data directory.

pub mod core;
pub mod enforcer;
pub mod error;
pub mod exit_codes;
pub mod gates;
pub mod io;
pub mod logging;
pub mod router;
pub mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

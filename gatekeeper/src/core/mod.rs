//! Deterministic, pure logic shared by the gatekeeper.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod docs;
pub mod effects;
pub mod event;
pub mod graph;
pub mod phase;
pub mod session;
pub mod shell;
pub mod task;
pub mod tools;
pub mod transitions;
pub mod types;
pub mod verdict;

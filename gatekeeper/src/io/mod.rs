//! I/O for the gatekeeper data directory.

pub mod atomic;
pub mod audit;
pub mod config;
pub mod locks;
pub mod paths;
pub mod session_store;
pub mod task_store;

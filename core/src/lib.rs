//! Task plan orchestration engine.
//!
//! Validates dependency graphs, picks an execution strategy, dispatches ready
//! tasks to pluggable executors through a result cache, and suspends for
//! human approval or input through a per-session pause controller.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod state;

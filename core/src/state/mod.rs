//! Human-in-the-loop pause handling.
//!
//! A [`PauseController`] is the only place the orchestrator suspends. It is a
//! five-mode state machine (`running`, `paused`, `plan_edit`, `input_request`,
//! `approval_wait`) with an orthogonal cancelled flag, an append-only
//! transition history and a resume signal that waiters block on.
//! [`SessionRegistry`] maps session ids to controllers and exposes the
//! approve / reject / modify / provide-input channel.

pub mod controller;
pub mod manager;
pub mod transitions;
pub mod types;

pub use controller::PauseController;
pub use manager::SessionRegistry;
pub use transitions::{PauseTransition, TransitionError};
pub use types::{
    HitlResponse, PauseEvent, PauseEventKind, PauseMode, PauseState, PauseTrigger,
    TransitionRecord,
};

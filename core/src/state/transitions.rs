//! Legal pause transitions

use thiserror::Error;

use super::types::{PauseMode, PauseTrigger};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("{trigger} is not allowed from {from}")]
    Illegal { from: PauseMode, trigger: PauseTrigger },
}

pub struct PauseTransition;

impl PauseTransition {
    /// Mode reached by applying `trigger` in `from`, if legal.
    pub fn target(from: PauseMode, trigger: PauseTrigger) -> Option<PauseMode> {
        use PauseMode::*;
        use PauseTrigger::*;

        match (from, trigger) {
            (Running, RequestPause) => Some(Paused),
            (Running, RequestInput) => Some(InputRequest),
            (Running, RequestApproval) => Some(ApprovalWait),
            (Paused, EnterPlanEdit) => Some(PlanEdit),
            (Paused, Resume) => Some(Running),
            (PlanEdit, ExitPlanEdit { save: true }) => Some(Running),
            (PlanEdit, ExitPlanEdit { save: false }) => Some(Paused),
            (InputRequest, SubmitInput) => Some(Running),
            (ApprovalWait, SubmitApproval) => Some(Running),
            _ => None,
        }
    }

    pub fn validate(from: PauseMode, trigger: PauseTrigger) -> Result<PauseMode, TransitionError> {
        Self::target(from, trigger).ok_or(TransitionError::Illegal { from, trigger })
    }

    /// Triggers accepted in `from`
    pub fn allowed(from: PauseMode) -> Vec<PauseTrigger> {
        PauseTrigger::ALL
            .into_iter()
            .filter(|t| Self::target(from, *t).is_some())
            .collect()
    }
}

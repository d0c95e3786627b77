//! Pause controller state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mode of a session's pause state machine. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseMode {
    /// Tasks may be dispatched
    #[default]
    Running,
    /// Suspended by an explicit pause
    Paused,
    /// Suspended while the plan is being edited
    PlanEdit,
    /// Waiting for a value from the user
    InputRequest,
    /// Waiting for an approve / reject / modify decision
    ApprovalWait,
}

impl PauseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::PlanEdit => "plan_edit",
            Self::InputRequest => "input_request",
            Self::ApprovalWait => "approval_wait",
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl std::fmt::Display for PauseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event that drives a pause transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum PauseTrigger {
    RequestPause,
    RequestInput,
    RequestApproval,
    EnterPlanEdit,
    Resume,
    ExitPlanEdit { save: bool },
    SubmitInput,
    SubmitApproval,
}

impl PauseTrigger {
    pub const ALL: [PauseTrigger; 9] = [
        Self::RequestPause,
        Self::RequestInput,
        Self::RequestApproval,
        Self::EnterPlanEdit,
        Self::Resume,
        Self::ExitPlanEdit { save: true },
        Self::ExitPlanEdit { save: false },
        Self::SubmitInput,
        Self::SubmitApproval,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestPause => "request_pause",
            Self::RequestInput => "request_input",
            Self::RequestApproval => "request_approval",
            Self::EnterPlanEdit => "enter_plan_edit",
            Self::Resume => "resume",
            Self::ExitPlanEdit { save: true } => "exit_plan_edit(save)",
            Self::ExitPlanEdit { save: false } => "exit_plan_edit(discard)",
            Self::SubmitInput => "submit_input",
            Self::SubmitApproval => "submit_approval",
        }
    }
}

impl std::fmt::Display for PauseTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current mode plus the context of the request that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PauseState {
    pub mode: PauseMode,
    pub reason: Option<String>,
    pub message: Option<String>,
    /// Field name for input requests
    pub field: Option<String>,
    /// Task awaiting approval
    pub task_id: Option<String>,
    pub since: DateTime<Utc>,
}

impl Default for PauseState {
    fn default() -> Self {
        Self {
            mode: PauseMode::Running,
            reason: None,
            message: None,
            field: None,
            task_id: None,
            since: Utc::now(),
        }
    }
}

impl PauseState {
    pub(crate) fn clear_context(&mut self) {
        self.reason = None;
        self.message = None;
        self.field = None;
        self.task_id = None;
    }
}

/// One entry of the append-only transition history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionRecord {
    pub from: PauseMode,
    pub to: PauseMode,
    pub trigger: PauseTrigger,
    pub timestamp: DateTime<Utc>,
}

/// Human decision delivered through the HITL channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum HitlResponse {
    Approved {
        comment: Option<String>,
    },
    Rejected {
        comment: Option<String>,
    },
    Modified {
        instruction: String,
        comment: Option<String>,
    },
    Input {
        value: Value,
        comment: Option<String>,
    },
}

impl HitlResponse {
    pub fn comment(&self) -> Option<&str> {
        match self {
            Self::Approved { comment }
            | Self::Rejected { comment }
            | Self::Modified { comment, .. }
            | Self::Input { comment, .. } => comment.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseEventKind {
    Paused,
    InputRequested,
    ApprovalRequested,
    PlanEditStarted,
    Resumed,
    PlanEditSaved,
    PlanEditDiscarded,
    InputSubmitted,
    ApprovalSubmitted,
    Cancelled,
}

impl PauseEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paused => "paused",
            Self::InputRequested => "input_requested",
            Self::ApprovalRequested => "approval_requested",
            Self::PlanEditStarted => "plan_edit_started",
            Self::Resumed => "resumed",
            Self::PlanEditSaved => "plan_edit_saved",
            Self::PlanEditDiscarded => "plan_edit_discarded",
            Self::InputSubmitted => "input_submitted",
            Self::ApprovalSubmitted => "approval_submitted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn for_trigger(trigger: PauseTrigger) -> Self {
        match trigger {
            PauseTrigger::RequestPause => Self::Paused,
            PauseTrigger::RequestInput => Self::InputRequested,
            PauseTrigger::RequestApproval => Self::ApprovalRequested,
            PauseTrigger::EnterPlanEdit => Self::PlanEditStarted,
            PauseTrigger::Resume => Self::Resumed,
            PauseTrigger::ExitPlanEdit { save: true } => Self::PlanEditSaved,
            PauseTrigger::ExitPlanEdit { save: false } => Self::PlanEditDiscarded,
            PauseTrigger::SubmitInput => Self::InputSubmitted,
            PauseTrigger::SubmitApproval => Self::ApprovalSubmitted,
        }
    }
}

/// Notification published on every pause transition and on cancellation.
#[derive(Debug, Clone, Serialize)]
pub struct PauseEvent {
    pub session_id: String,
    pub kind: PauseEventKind,
    pub from: PauseMode,
    pub to: PauseMode,
    /// reason / message / field / task_id / response, as relevant
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// Value carried by the resume signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumeSignal {
    Blocked,
    Running,
    Cancelled,
}

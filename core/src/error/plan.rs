use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Stable error codes reported alongside plan validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum ErrorCode {
    ValidationError = 3,
    DependencyError = 11,
    CircularDependency = 12,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A single problem found while validating a plan's dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    DuplicateTaskId { task_id: String },
    UnknownDependency { task_id: String, missing_dep: String },
    SelfDependency { task_id: String },
    Cycle { path: Vec<String> },
}

impl ValidationIssue {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::DuplicateTaskId { .. } => ErrorCode::ValidationError,
            Self::UnknownDependency { .. } => ErrorCode::DependencyError,
            Self::SelfDependency { .. } | Self::Cycle { .. } => ErrorCode::CircularDependency,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTaskId { task_id } => write!(f, "duplicate task id '{task_id}'"),
            Self::UnknownDependency {
                task_id,
                missing_dep,
            } => write!(f, "task '{task_id}' depends on unknown task '{missing_dep}'"),
            Self::SelfDependency { task_id } => write!(f, "task '{task_id}' depends on itself"),
            Self::Cycle { path } => write!(f, "circular dependency: {}", path.join(" -> ")),
        }
    }
}

/// Every issue found by one validation pass. Empty means the plan is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_cycle(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::Cycle { .. }))
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn into_result(self) -> Result<(), PlanError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PlanError::Invalid(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", lines.join("; "))
    }
}

/// Graph-level errors. These are fatal for the plan they were raised on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Circular dependency detected: {0}")]
    CyclicDependency(String),

    #[error("Invalid plan: {0}")]
    Invalid(ValidationReport),
}

impl PlanError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::CyclicDependency(_) => ErrorCode::CircularDependency,
            Self::Invalid(report) => report
                .issues
                .first()
                .map(|i| i.error_code())
                .unwrap_or(ErrorCode::ValidationError),
        }
    }
}

use thiserror::Error;

use super::plan::{PlanError, ValidationReport};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("plan rejected: {0}")]
    InvalidPlan(ValidationReport),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("runner error: {0}")]
    Runner(String),
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("orchestrator failed: {0}")]
    Orchestrator(#[from] OrchestratorError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("invalid plan document: {0}")]
    PlanDocument(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod plan;

pub use error::{CliError, OrchestratorError};
pub use executor::{CacheError, ExecutionError};
pub use plan::{ErrorCode, PlanError, ValidationIssue, ValidationReport};

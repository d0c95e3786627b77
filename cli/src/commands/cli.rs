use clap::{Args as ClapArgs, Parser, Subcommand};
use taskweave_core::api::ExecutionStrategy;

#[derive(Parser, Debug)]
#[command(name = "taskweave", version, about = "Run dependency-ordered task plans")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (overrides TASKWEAVE_CONFIG and the default search path)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    /// Plan document (JSON)
    #[arg(long)]
    pub plan: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan_args: PlanArgs,

    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Force a strategy instead of deciding one from the graph.
    /// One of: single, sequential, parallel, dynamic-swarm
    #[arg(long)]
    pub strategy: Option<ExecutionStrategy>,

    #[arg(long)]
    pub no_cache: bool,

    /// text | jsonl | jsonl-pretty
    #[arg(long, default_value = "text")]
    pub stream_format: String,

    /// Approve every approval-gated task without prompting.
    #[arg(long)]
    pub auto_approve: bool,

    /// Give up waiting on a paused session after this many milliseconds.
    #[arg(long)]
    pub resume_timeout_ms: Option<u64>,

    /// Default timeout for `shell` tasks that set no `timeout_ms`.
    #[arg(long)]
    pub shell_timeout_ms: Option<u64>,

    #[arg(long)]
    pub progress: bool,

    /// Write the plan with its final task statuses here, so a paused run can be resumed.
    #[arg(long)]
    pub state_out: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a plan
    Run(RunArgs),
    /// Check a plan for duplicate ids, unknown dependencies and cycles
    Validate(PlanArgs),
    /// Print the parallel levels and a topological order of a plan
    Levels(PlanArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let args = Args::parse_from([
            "taskweave",
            "run",
            "--plan",
            "plan.json",
            "--max-parallel",
            "8",
            "--strategy",
            "dynamic-swarm",
            "--no-cache",
            "--auto-approve",
        ]);
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.plan_args.plan, "plan.json");
        assert_eq!(run.max_parallel, Some(8));
        assert_eq!(run.strategy, Some(ExecutionStrategy::DynamicSwarm));
        assert!(run.no_cache);
        assert!(run.auto_approve);
        assert_eq!(run.stream_format, "text");
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        assert!(Args::try_parse_from(["taskweave", "run", "--plan", "p.json", "--strategy", "burst"]).is_err());
    }
}

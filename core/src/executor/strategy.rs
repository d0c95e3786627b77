use super::graph::TaskGraph;
use super::types::ExecutionStrategy;

/// Chooses an execution strategy for a plan and bounds per-tick fan-out.
pub struct StrategyDecider;

impl StrategyDecider {
    /// Pick a strategy from the shape of the dependency graph.
    ///
    /// A cyclic graph has no levels; it falls back to `Sequential` and is
    /// rejected by validation before anything runs.
    pub fn decide(graph: &TaskGraph) -> ExecutionStrategy {
        if graph.len() <= 1 {
            return ExecutionStrategy::Single;
        }

        if !graph.has_dependencies() {
            return ExecutionStrategy::Parallel;
        }

        match graph.parallel_levels() {
            Ok(levels) if levels.iter().any(|level| level.len() > 1) => {
                ExecutionStrategy::Parallel
            }
            _ => ExecutionStrategy::Sequential,
        }
    }

    /// How many of the currently ready tasks may be dispatched together.
    pub fn batch_size(strategy: ExecutionStrategy, ready_count: usize, max_parallel: usize) -> usize {
        match strategy {
            ExecutionStrategy::Single | ExecutionStrategy::Sequential => ready_count.min(1),
            ExecutionStrategy::Parallel | ExecutionStrategy::DynamicSwarm => {
                ready_count.min(max_parallel.max(1))
            }
        }
    }
}

// In crates/engine/src/types.rs

/// What `Planner::execute` did with a trading plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub buys: usize,
    pub stop_updates: usize,
    /// Orders dropped with a WARNING event.
    pub skipped: usize,
}

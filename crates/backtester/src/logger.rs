// In crates/backtester/src/logger.rs

use core_types::Decision;
use events::{EventLevel, EventRecord};

/// Tallies what the simulator did over one run, for the closing log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunLog {
    pub days_evaluated: u64,
    pub no_ops: u64,
    pub buys: u64,
    pub sells: u64,
    pub stop_outs: u64,
    pub stop_updates: u64,
    pub warnings: u64,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a decision the engine returned, before it is applied.
    pub fn record_decision(&mut self, decision: &Decision) {
        self.days_evaluated += 1;
        if matches!(decision, Decision::NoOp) {
            self.no_ops += 1;
        }
    }

    /// Counts an event the simulator wrote to the ledger.
    pub fn record_event(&mut self, event: &EventRecord) {
        use events::LedgerEvent::*;
        match (&event.level, &event.event) {
            (EventLevel::Warning, _) => self.warnings += 1,
            (_, Bought { .. }) => self.buys += 1,
            (_, Sold { .. }) => self.sells += 1,
            (_, StopLossTriggered { .. }) => self.stop_outs += 1,
            (_, StopLossUpdated { .. }) => self.stop_updates += 1,
            _ => {}
        }
    }
}

//! Process-wide bridge state owned by the scheduler.

use chrono::{DateTime, Utc};

/// Freshness counter published as `/UpdateIndex`.
///
/// Advances by one per completed poll cycle and wraps from 255 to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FreshnessCounter(u8);

impl FreshnessCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Value after the next increment.
    pub fn next(self) -> u8 {
        self.0.wrapping_add(1)
    }

    pub fn increment(&mut self) -> u8 {
        self.0 = self.next();
        self.0
    }
}

/// Mutable state shared between the poll cycle and the heartbeat.
#[derive(Debug, Clone, Default)]
pub struct BridgeState {
    update_index: FreshnessCounter,
    last_update: Option<DateTime<Utc>>,
    cycles_completed: u64,
    cycles_abandoned: u64,
    failed_reads: u64,
    heartbeats: u64,
}

impl BridgeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_index(&self) -> FreshnessCounter {
        self.update_index
    }

    /// Completion time of the last finished poll cycle.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn cycles_abandoned(&self) -> u64 {
        self.cycles_abandoned
    }

    /// Register reads that failed since startup.
    pub fn failed_reads(&self) -> u64 {
        self.failed_reads
    }

    pub fn heartbeats(&self) -> u64 {
        self.heartbeats
    }

    /// Count a sent heartbeat; returns the new total.
    pub fn record_heartbeat(&mut self) -> u64 {
        self.heartbeats += 1;
        self.heartbeats
    }

    /// Record a finished cycle; returns the new update index.
    pub fn complete_cycle(&mut self, at: DateTime<Utc>, failed_reads: usize) -> u8 {
        self.last_update = Some(at);
        self.cycles_completed += 1;
        self.failed_reads += failed_reads as u64;
        self.update_index.increment()
    }

    pub fn abandon_cycle(&mut self) {
        self.cycles_abandoned += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_wraps() {
        let mut counter = FreshnessCounter(254);
        assert_eq!(counter.increment(), 255);
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.increment(), 0);
        assert_eq!(counter.increment(), 1);
    }

    #[test]
    fn test_counter_full_cycle() {
        let mut counter = FreshnessCounter::new();
        for _ in 0..256 {
            counter.increment();
        }
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_complete_cycle() {
        let mut state = BridgeState::new();
        assert!(state.last_update().is_none());

        let now = Utc::now();
        assert_eq!(state.complete_cycle(now, 2), 1);
        assert_eq!(state.complete_cycle(now, 0), 2);

        assert_eq!(state.last_update(), Some(now));
        assert_eq!(state.cycles_completed(), 2);
        assert_eq!(state.failed_reads(), 2);
    }

    #[test]
    fn test_abandoned_cycle_keeps_index() {
        let mut state = BridgeState::new();
        state.abandon_cycle();

        assert_eq!(state.update_index().value(), 0);
        assert_eq!(state.cycles_abandoned(), 1);
        assert!(state.last_update().is_none());
    }

    #[test]
    fn test_heartbeats_leave_cycle_state_alone() {
        let mut state = BridgeState::new();
        assert_eq!(state.record_heartbeat(), 1);
        assert_eq!(state.record_heartbeat(), 2);

        assert_eq!(state.heartbeats(), 2);
        assert_eq!(state.update_index().value(), 0);
        assert_eq!(state.cycles_completed(), 0);
    }
}

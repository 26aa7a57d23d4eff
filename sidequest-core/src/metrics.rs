//! Lifecycle counters.
//!
//! Lock-free `AtomicU64` counters bumped on every transition and read on
//! demand, e.g. for a debug overlay or a server dashboard.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for issue and quest lifecycle events.
#[derive(Debug, Default)]
pub struct BoardCounters {
    /// Issues created for a candidate.
    pub issues_offered: AtomicU64,
    /// Issues the player took.
    pub issues_taken: AtomicU64,
    /// Take attempts refused by accept preconditions.
    pub accepts_blocked: AtomicU64,
    /// Issues resolved by a successful quest.
    pub issues_resolved: AtomicU64,
    /// Issues that ran out of time.
    pub issues_expired: AtomicU64,
    /// Issues invalidated by the world.
    pub issues_abandoned: AtomicU64,
    /// Quests handed over.
    pub quests_succeeded: AtomicU64,
    /// Quests that timed out.
    pub quests_failed: AtomicU64,
    /// Quests cancelled by world events.
    pub quests_cancelled: AtomicU64,
    /// Events passed to `dispatch`.
    pub events_dispatched: AtomicU64,
    /// Individual event deliveries to quests.
    pub deliveries: AtomicU64,
}

impl BoardCounters {
    /// Zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            issues_offered: load(&self.issues_offered),
            issues_taken: load(&self.issues_taken),
            accepts_blocked: load(&self.accepts_blocked),
            issues_resolved: load(&self.issues_resolved),
            issues_expired: load(&self.issues_expired),
            issues_abandoned: load(&self.issues_abandoned),
            quests_succeeded: load(&self.quests_succeeded),
            quests_failed: load(&self.quests_failed),
            quests_cancelled: load(&self.quests_cancelled),
            events_dispatched: load(&self.events_dispatched),
            deliveries: load(&self.deliveries),
        }
    }
}

/// Point-in-time copy of [`BoardCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CounterSnapshot {
    pub issues_offered: u64,
    pub issues_taken: u64,
    pub accepts_blocked: u64,
    pub issues_resolved: u64,
    pub issues_expired: u64,
    pub issues_abandoned: u64,
    pub quests_succeeded: u64,
    pub quests_failed: u64,
    pub quests_cancelled: u64,
    pub events_dispatched: u64,
    pub deliveries: u64,
}

//! Progress tracking — journal entries and authoritative objective counts.
//!
//! A [`ProgressTracker`] never adds or subtracts deltas. Every
//! [`ProgressTracker::recompute`] scans the current inventory from scratch,
//! so a duplicated event, an out-of-order event or a reload mid-session
//! cannot make the count drift.
//!
//! Reaching the requirement surfaces a "ready" journal entry and a
//! notification; falling below it removes the entry again. Neither changes
//! the quest's lifecycle state.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::predicate::ItemFilter;
use crate::types::{CampaignTime, ItemStack, LogId, QuestId};
use crate::world::Action;

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// A numeric `current / required` pair attached to a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscreteProgress {
    /// Short label for the counter (e.g. "Weapon bought").
    pub label: String,
    /// Current value, always `<= required`.
    pub current: u32,
    /// Target value.
    pub required: u32,
}

/// A player-visible journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Identifier within the owning quest.
    pub id: LogId,
    /// Display text.
    pub text: String,
    /// Optional counter.
    pub progress: Option<DiscreteProgress>,
    /// When the entry was written.
    pub added_at: CampaignTime,
}

/// The ordered journal of a single quest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    next_id: u32,
    entries: Vec<LogEntry>,
}

impl Journal {
    /// An empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plain text entry and return a copy of it.
    pub fn add_log(&mut self, text: impl Into<String>, now: CampaignTime) -> LogEntry {
        self.push(text.into(), None, now)
    }

    /// Append an entry with a counter; `current` is clamped to `required`.
    pub fn add_discrete_log(
        &mut self,
        text: impl Into<String>,
        label: impl Into<String>,
        current: u32,
        required: u32,
        now: CampaignTime,
    ) -> LogEntry {
        let progress = DiscreteProgress {
            label: label.into(),
            current: current.min(required),
            required,
        };
        self.push(text.into(), Some(progress), now)
    }

    fn push(
        &mut self,
        text: String,
        progress: Option<DiscreteProgress>,
        now: CampaignTime,
    ) -> LogEntry {
        let entry = LogEntry {
            id: LogId(self.next_id),
            text,
            progress,
            added_at: now,
        };
        self.next_id += 1;
        self.entries.push(entry.clone());
        entry
    }

    /// Remove an entry. Returns `true` if it existed.
    pub fn remove(&mut self, id: LogId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Set an entry's counter, clamped to its requirement.
    ///
    /// Returns the stored value when it changed, `None` when nothing did.
    pub fn set_progress(&mut self, id: LogId, current: u32) -> Option<u32> {
        let progress = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .and_then(|e| e.progress.as_mut())?;
        let clamped = current.min(progress.required);
        if progress.current == clamped {
            return None;
        }
        progress.current = clamped;
        Some(clamped)
    }

    /// Look up an entry.
    #[must_use]
    pub fn get(&self, id: LogId) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// All entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the journal is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Whether a recomputation crossed the requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Same side as before.
    None,
    /// Went from below to at-or-above the requirement.
    Reached,
    /// Went from at-or-above to below the requirement.
    Lost,
}

/// Result of one authoritative recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recount {
    /// Raw number of qualifying items held.
    pub count: u32,
    /// `count >= required`.
    pub complete: bool,
    /// Threshold crossing, if any.
    pub crossing: Crossing,
    /// Journal and notification actions for the host.
    pub actions: Vec<Action>,
}

/// Texts the tracker writes when the requirement is crossed.
#[derive(Debug, Clone, Copy)]
pub struct ReadyTexts<'a> {
    /// Journal line shown while the requirement is met.
    pub ready_log: &'a str,
    /// One-off notification when the requirement is first met.
    pub notice: &'a str,
}

/// Objective counter for one quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    /// What counts.
    pub filter: ItemFilter,
    /// How many are needed.
    pub required: u32,
    /// Journal entry carrying the `current / required` pair.
    pub progress_log: Option<LogId>,
    /// Journal entry present while the requirement is met.
    pub ready_log: Option<LogId>,
}

impl ProgressTracker {
    /// A tracker with no journal entries yet.
    #[must_use]
    pub fn new(filter: ItemFilter, required: u32) -> Self {
        Self {
            filter,
            required,
            progress_log: None,
            ready_log: None,
        }
    }

    /// Count qualifying items in `inventory` from scratch.
    #[must_use]
    pub fn scan(&self, inventory: &[ItemStack]) -> u32 {
        self.filter.count_in(inventory)
    }

    /// Whether the last recomputation met the requirement.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.ready_log.is_some()
    }

    /// Re-derive the count from `inventory` and update the journal.
    pub fn recompute(
        &mut self,
        quest: QuestId,
        journal: &mut Journal,
        inventory: &[ItemStack],
        texts: ReadyTexts<'_>,
        now: CampaignTime,
    ) -> Recount {
        let count = self.scan(inventory);
        let complete = count >= self.required;
        let mut actions = Vec::new();

        if let Some(log) = self.progress_log {
            if let Some(current) = journal.set_progress(log, count) {
                actions.push(Action::JournalProgress {
                    quest,
                    log,
                    current,
                });
            }
        }

        let crossing = match (self.ready_log, complete) {
            (None, true) => {
                let entry = journal.add_log(texts.ready_log, now);
                self.ready_log = Some(entry.id);
                actions.push(Action::JournalAdded { quest, entry });
                actions.push(Action::Notify {
                    text: texts.notice.to_string(),
                });
                Crossing::Reached
            }
            (Some(log), false) => {
                journal.remove(log);
                self.ready_log = None;
                actions.push(Action::JournalRemoved { quest, log });
                Crossing::Lost
            }
            _ => Crossing::None,
        };

        debug!(
            quest = %quest,
            count,
            required = self.required,
            ?crossing,
            "Progress recomputed"
        );

        Recount {
            count,
            complete,
            crossing,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts() -> ReadyTexts<'static> {
        ReadyTexts {
            ready_log: "Ready to hand over.",
            notice: "Return to the giver.",
        }
    }

    fn spear_tracker(journal: &mut Journal) -> ProgressTracker {
        let mut tracker = ProgressTracker::new(ItemFilter::category("polearm"), 3);
        let entry = journal.add_discrete_log("Bring spears", "Spears", 0, 3, CampaignTime::ZERO);
        tracker.progress_log = Some(entry.id);
        tracker
    }

    #[test]
    fn discrete_log_clamps_to_required() {
        let mut journal = Journal::new();
        let entry = journal.add_discrete_log("x", "y", 9, 2, CampaignTime::ZERO);
        assert_eq!(entry.progress.as_ref().map(|p| p.current), Some(2));
        assert_eq!(journal.set_progress(entry.id, 1), Some(1));
        assert_eq!(journal.set_progress(entry.id, 1), None);
        assert_eq!(journal.set_progress(entry.id, 50), Some(2));
    }

    #[test]
    fn log_ids_are_never_reused() {
        let mut journal = Journal::new();
        let a = journal.add_log("a", CampaignTime::ZERO).id;
        assert!(journal.remove(a));
        let b = journal.add_log("b", CampaignTime::ZERO).id;
        assert_ne!(a, b);
        assert!(!journal.remove(a));
    }

    #[test]
    fn reaching_requirement_adds_ready_log_and_notice() {
        let quest = QuestId::new();
        let mut journal = Journal::new();
        let mut tracker = spear_tracker(&mut journal);
        let inventory = vec![ItemStack::new("pike", "polearm", 100, 4)];

        let recount = tracker.recompute(quest, &mut journal, &inventory, texts(), CampaignTime::ZERO);
        assert_eq!(recount.count, 4);
        assert!(recount.complete);
        assert_eq!(recount.crossing, Crossing::Reached);
        assert!(tracker.is_complete());
        assert_eq!(journal.len(), 2);
        assert!(recount.actions.iter().any(|a| matches!(a, Action::Notify { .. })));

        let progress = journal
            .get(tracker.progress_log.expect("progress log"))
            .and_then(|e| e.progress.clone())
            .expect("discrete progress");
        assert_eq!(progress.current, 3);
    }

    #[test]
    fn falling_below_removes_ready_log() {
        let quest = QuestId::new();
        let mut journal = Journal::new();
        let mut tracker = spear_tracker(&mut journal);
        let full = vec![ItemStack::new("pike", "polearm", 100, 3)];
        let short = vec![ItemStack::new("pike", "polearm", 100, 1)];

        tracker.recompute(quest, &mut journal, &full, texts(), CampaignTime::ZERO);
        let recount = tracker.recompute(quest, &mut journal, &short, texts(), CampaignTime::ZERO);
        assert_eq!(recount.crossing, Crossing::Lost);
        assert!(!tracker.is_complete());
        assert_eq!(journal.len(), 1);
    }

    #[test]
    fn repeated_recompute_is_silent() {
        let quest = QuestId::new();
        let mut journal = Journal::new();
        let mut tracker = spear_tracker(&mut journal);
        let inventory = vec![ItemStack::new("pike", "polearm", 100, 3)];

        tracker.recompute(quest, &mut journal, &inventory, texts(), CampaignTime::ZERO);
        let again = tracker.recompute(quest, &mut journal, &inventory, texts(), CampaignTime::ZERO);
        assert_eq!(again.crossing, Crossing::None);
        assert!(again.actions.is_empty());
        assert_eq!(journal.len(), 2);
    }
}

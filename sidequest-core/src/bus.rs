//! Event bus adapter — instance-scoped subscriptions.
//!
//! A quest registers on acceptance (or on reload) through an explicitly
//! injected [`BusHandle`] and receives a [`Subscription`] guard. Dropping the
//! guard unregisters the quest, so a quest that reaches a terminal state and
//! drops its guard can never be handed another event.
//!
//! The bus only tracks *who* listens to *what*; the owning
//! [`crate::board::IssueBoard`] performs the delivery. Lookups copy the
//! recipient list out before any handler runs, so handlers are free to
//! unsubscribe while a dispatch is in progress.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::events::EventKind;
use crate::types::QuestId;

#[derive(Debug)]
struct Registration {
    token: u64,
    kinds: Vec<EventKind>,
}

/// Listener table.
#[derive(Debug, Default)]
pub struct EventBus {
    listeners: BTreeMap<QuestId, Registration>,
    next_token: u64,
}

/// Shared handle to an [`EventBus`]; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct BusHandle(Arc<Mutex<EventBus>>);

impl BusHandle {
    /// A fresh, empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `quest` for `kinds`, replacing any previous registration.
    #[must_use = "dropping the subscription immediately unregisters the quest"]
    pub fn subscribe(&self, quest: QuestId, kinds: &[EventKind]) -> Subscription {
        let mut bus = self.0.lock();
        bus.next_token += 1;
        let token = bus.next_token;
        bus.listeners.insert(
            quest,
            Registration {
                token,
                kinds: kinds.to_vec(),
            },
        );
        debug!(quest = %quest, ?kinds, "Subscribed");
        Subscription {
            bus: self.clone(),
            quest,
            token,
        }
    }

    /// Quests listening to `kind`, in stable order.
    #[must_use]
    pub fn recipients(&self, kind: EventKind) -> Vec<QuestId> {
        self.0
            .lock()
            .listeners
            .iter()
            .filter(|(_, r)| r.kinds.contains(&kind))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether `quest` currently has a registration.
    #[must_use]
    pub fn is_subscribed(&self, quest: QuestId) -> bool {
        self.0.lock().listeners.contains_key(&quest)
    }

    /// Number of registered quests.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.0.lock().listeners.len()
    }

    fn unsubscribe(&self, quest: QuestId, token: u64) {
        let mut bus = self.0.lock();
        if bus.listeners.get(&quest).is_some_and(|r| r.token == token) {
            bus.listeners.remove(&quest);
            debug!(quest = %quest, "Unsubscribed");
        }
    }
}

/// Registration guard owned by exactly one quest.
///
/// Unregisters on drop. A stale guard (superseded by a newer registration
/// for the same quest) leaves the newer registration in place.
pub struct Subscription {
    bus: BusHandle,
    quest: QuestId,
    token: u64,
}

impl Subscription {
    /// The quest this guard belongs to.
    #[must_use]
    pub fn quest(&self) -> QuestId {
        self.quest
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("quest", &self.quest)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.quest, self.token);
    }
}

//! World events consumed by quests.
//!
//! The host translates its own callbacks into [`WorldEvent`]s and hands
//! them to [`crate::board::IssueBoard::dispatch`]. Events of different kinds
//! may arrive in any order; handlers re-validate world state instead of
//! relying on what an earlier event implied.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, FactionId, ItemStack, MapEventId, SettlementId};

/// The fixed set of event kinds a quest can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Items entered or left the player's inventory.
    InventoryExchange,
    /// Two factions went to war.
    WarDeclared,
    /// An actor changed faction.
    AffiliationChanged,
    /// A battle, raid or siege began.
    MapEventStarted,
    /// A raid finished.
    RaidCompleted,
}

/// Which side of a map event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleSide {
    /// The side that started the event.
    Attacker,
    /// The side that was attacked.
    Defender,
}

/// One participant of a map event, as far as quests care.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    /// Party leader, if the party has one.
    pub leader: Option<ActorId>,
    /// Faction the party fights for.
    pub faction: Option<FactionId>,
    /// Settlement the party belongs to (villagers, caravans, garrisons).
    pub settlement: Option<SettlementId>,
    /// Whether this is the player's own party.
    pub is_player: bool,
}

/// A notification from the host world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// Items entered (`added`) or left (`removed`) the player's inventory.
    InventoryExchange {
        /// Items the player received.
        added: Vec<ItemStack>,
        /// Items the player gave away or sold.
        removed: Vec<ItemStack>,
        /// Whether this was a market trade.
        is_trading: bool,
    },
    /// Two factions went to war.
    WarDeclared {
        /// One belligerent.
        faction_a: FactionId,
        /// The other belligerent.
        faction_b: FactionId,
    },
    /// An actor (usually a clan) left one faction for another.
    AffiliationChanged {
        /// Who changed.
        actor: ActorId,
        /// Faction before.
        old: Option<FactionId>,
        /// Faction after.
        new: Option<FactionId>,
    },
    /// A battle, raid or siege began.
    MapEventStarted {
        /// Host identifier of the map event.
        event: MapEventId,
        /// Attacking party.
        attacker: PartyRef,
        /// Defending party.
        defender: PartyRef,
    },
    /// A raid finished.
    RaidCompleted {
        /// Side that won.
        winner: BattleSide,
        /// Host identifier of the raid.
        event: MapEventId,
        /// Settlement that was raided.
        settlement: SettlementId,
    },
}

impl WorldEvent {
    /// The subscription kind this event is delivered under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::InventoryExchange { .. } => EventKind::InventoryExchange,
            Self::WarDeclared { .. } => EventKind::WarDeclared,
            Self::AffiliationChanged { .. } => EventKind::AffiliationChanged,
            Self::MapEventStarted { .. } => EventKind::MapEventStarted,
            Self::RaidCompleted { .. } => EventKind::RaidCompleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let war = WorldEvent::WarDeclared {
            faction_a: FactionId::new(),
            faction_b: FactionId::new(),
        };
        assert_eq!(war.kind(), EventKind::WarDeclared);

        let raid = WorldEvent::RaidCompleted {
            winner: BattleSide::Attacker,
            event: MapEventId::new(),
            settlement: SettlementId::new(),
        };
        assert_eq!(raid.kind(), EventKind::RaidCompleted);
    }

    #[test]
    fn events_serialize_for_replay_logs() {
        let event = WorldEvent::InventoryExchange {
            added: vec![ItemStack::new("pike", "polearm", 120, 2)],
            removed: Vec::new(),
            is_trading: true,
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: WorldEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, event);
    }
}

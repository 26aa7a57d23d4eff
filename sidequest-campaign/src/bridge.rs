//! Bridge module — maps campaign-native identifiers to engine ids.
//!
//! The campaign host identifies things its own way:
//! - heroes and clans by numeric ids (`u64`)
//! - kingdoms by numeric ids (`u64`)
//! - settlements by string ids (`"town_EN1"`)
//! - map events by numeric ids (`u64`)
//!
//! The engine uses UUID newtypes. [`HostIds`] hands out an engine id the
//! first time a native id is seen and keeps both directions, so events
//! can be translated inward and actions outward. It is saved beside the
//! board; a reload must see the same mapping or every restored quest
//! would point at a stranger.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sidequest_core::types::{ActorId, FactionId, MapEventId, SettlementId};

/// Persisted form: forward tables only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdTables {
    heroes: BTreeMap<u64, ActorId>,
    factions: BTreeMap<u64, FactionId>,
    settlements: BTreeMap<String, SettlementId>,
    map_events: BTreeMap<u64, MapEventId>,
}

/// Bidirectional native ↔ engine id registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "IdTables", into = "IdTables")]
pub struct HostIds {
    tables: IdTables,
    hero_of: HashMap<ActorId, u64>,
    faction_of: HashMap<FactionId, u64>,
    settlement_of: HashMap<SettlementId, String>,
}

impl From<IdTables> for HostIds {
    fn from(tables: IdTables) -> Self {
        let hero_of = tables.heroes.iter().map(|(n, e)| (*e, *n)).collect();
        let faction_of = tables.factions.iter().map(|(n, e)| (*e, *n)).collect();
        let settlement_of = tables
            .settlements
            .iter()
            .map(|(n, e)| (*e, n.clone()))
            .collect();
        Self {
            tables,
            hero_of,
            faction_of,
            settlement_of,
        }
    }
}

impl From<HostIds> for IdTables {
    fn from(ids: HostIds) -> Self {
        ids.tables
    }
}

impl HostIds {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the engine id of a hero (or clan leader).
    pub fn actor(&mut self, hero: u64) -> ActorId {
        if let Some(id) = self.tables.heroes.get(&hero) {
            return *id;
        }
        let id = ActorId::new();
        self.tables.heroes.insert(hero, id);
        self.hero_of.insert(id, hero);
        id
    }

    /// Get or create the engine id of a kingdom.
    pub fn faction(&mut self, kingdom: u64) -> FactionId {
        if let Some(id) = self.tables.factions.get(&kingdom) {
            return *id;
        }
        let id = FactionId::new();
        self.tables.factions.insert(kingdom, id);
        self.faction_of.insert(id, kingdom);
        id
    }

    /// Get or create the engine id of a settlement.
    pub fn settlement(&mut self, settlement: &str) -> SettlementId {
        if let Some(id) = self.tables.settlements.get(settlement) {
            return *id;
        }
        let id = SettlementId::new();
        self.tables.settlements.insert(settlement.to_string(), id);
        self.settlement_of.insert(id, settlement.to_string());
        id
    }

    /// Get or create the engine id of a map event.
    pub fn map_event(&mut self, event: u64) -> MapEventId {
        *self
            .tables
            .map_events
            .entry(event)
            .or_insert_with(MapEventId::new)
    }

    /// Engine id of a hero already seen.
    #[must_use]
    pub fn known_actor(&self, hero: u64) -> Option<ActorId> {
        self.tables.heroes.get(&hero).copied()
    }

    /// Native id behind an engine actor.
    #[must_use]
    pub fn native_hero(&self, id: ActorId) -> Option<u64> {
        self.hero_of.get(&id).copied()
    }

    /// Native id behind an engine faction.
    #[must_use]
    pub fn native_kingdom(&self, id: FactionId) -> Option<u64> {
        self.faction_of.get(&id).copied()
    }

    /// Native id behind an engine settlement.
    #[must_use]
    pub fn native_settlement(&self, id: SettlementId) -> Option<&str> {
        self.settlement_of.get(&id).map(String::as_str)
    }

    /// Forget a finished map event. Returns its engine id if it was known.
    pub fn end_map_event(&mut self, event: u64) -> Option<MapEventId> {
        self.tables.map_events.remove(&event)
    }

    /// Map events still running.
    #[must_use]
    pub fn running_map_events(&self) -> usize {
        self.tables.map_events.len()
    }

    /// Total registered ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tables.heroes.len()
            + self.tables.factions.len()
            + self.tables.settlements.len()
            + self.tables.map_events.len()
    }
}

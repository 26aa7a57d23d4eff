//! Host callback hooks.
//!
//! Each hook takes the host's own callback arguments (native ids, roster
//! rows, party descriptions) and produces the engine [`WorldEvent`] to
//! dispatch. Native ids are translated through [`HostIds`], creating
//! engine ids on first sight.

use sidequest_core::events::{BattleSide, PartyRef, WorldEvent};
use sidequest_core::types::{ItemStack, MapEventId};

use crate::bridge::HostIds;

/// One row of a host roster delta. Negative amounts are removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterElement {
    /// Host item id.
    pub item_id: String,
    /// Host item category.
    pub category: String,
    /// Unit value.
    pub value: u32,
    /// Signed quantity.
    pub amount: i32,
}

/// A party as the host describes it at the start of a map event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeParty {
    /// Leading hero, if any.
    pub leader: Option<u64>,
    /// Kingdom the party fights for.
    pub faction: Option<u64>,
    /// Home settlement of villagers, caravans and garrisons.
    pub settlement: Option<String>,
    /// Whether this is the player's main party.
    pub is_player: bool,
}

fn stack(row: &RosterElement) -> ItemStack {
    ItemStack::new(
        row.item_id.clone(),
        row.category.clone(),
        row.value,
        row.amount.unsigned_abs(),
    )
}

fn party_ref(ids: &mut HostIds, party: &NativeParty) -> PartyRef {
    PartyRef {
        leader: party.leader.map(|hero| ids.actor(hero)),
        faction: party.faction.map(|kingdom| ids.faction(kingdom)),
        settlement: party.settlement.as_deref().map(|s| ids.settlement(s)),
        is_player: party.is_player,
    }
}

/// Player inventory changed (trade, loot, gift).
///
/// Rows with a zero amount are dropped; negative rows in `added` or
/// positive rows in `removed` count by magnitude.
#[must_use]
pub fn on_roster_exchange(
    added: &[RosterElement],
    removed: &[RosterElement],
    is_trading: bool,
) -> WorldEvent {
    let collect = |rows: &[RosterElement]| {
        rows.iter()
            .filter(|r| r.amount != 0)
            .map(stack)
            .collect::<Vec<_>>()
    };
    WorldEvent::InventoryExchange {
        added: collect(added),
        removed: collect(removed),
        is_trading,
    }
}

/// Two kingdoms went to war.
#[must_use]
pub fn on_war_declared(ids: &mut HostIds, kingdom_a: u64, kingdom_b: u64) -> WorldEvent {
    WorldEvent::WarDeclared {
        faction_a: ids.faction(kingdom_a),
        faction_b: ids.faction(kingdom_b),
    }
}

/// A clan switched kingdoms; the clan is represented by its leader.
#[must_use]
pub fn on_clan_changed_kingdom(
    ids: &mut HostIds,
    clan_leader: u64,
    old_kingdom: Option<u64>,
    new_kingdom: Option<u64>,
) -> WorldEvent {
    WorldEvent::AffiliationChanged {
        actor: ids.actor(clan_leader),
        old: old_kingdom.map(|k| ids.faction(k)),
        new: new_kingdom.map(|k| ids.faction(k)),
    }
}

/// A battle, raid or siege began.
#[must_use]
pub fn on_map_event_started(
    ids: &mut HostIds,
    event: u64,
    attacker: &NativeParty,
    defender: &NativeParty,
) -> WorldEvent {
    WorldEvent::MapEventStarted {
        event: ids.map_event(event),
        attacker: party_ref(ids, attacker),
        defender: party_ref(ids, defender),
    }
}

/// A raid on `settlement` finished. The map event ends with it.
#[must_use]
pub fn on_raid_completed(
    ids: &mut HostIds,
    winner: BattleSide,
    event: u64,
    settlement: &str,
) -> WorldEvent {
    WorldEvent::RaidCompleted {
        winner,
        event: ids.end_map_event(event).unwrap_or_else(MapEventId::new),
        settlement: ids.settlement(settlement),
    }
}

//! Host world interfaces.
//!
//! The engine never owns world state. It reads through [`WorldQuery`] and
//! requests mutations through [`WorldActions`]; the host serializes those
//! requests against its own ledger.

pub mod sandbox;

use serde::{Deserialize, Serialize};

use crate::progress::LogEntry;
use crate::types::{
    ActorId, FactionId, ItemCategory, ItemId, ItemStack, LogId, QuestId, SettlementId, TraitKind,
};

// ---------------------------------------------------------------------------
// Snapshots returned by queries
// ---------------------------------------------------------------------------

/// Role and title flags of an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ActorRoles {
    /// A merchant notable.
    pub is_merchant: bool,
    /// Ruler of a faction.
    pub is_faction_leader: bool,
    /// Head of a clan.
    pub is_clan_leader: bool,
    /// Belongs to a minor faction (mercenaries, outlaws).
    pub is_minor_faction_hero: bool,
    /// Member of the player's own clan.
    pub is_in_player_clan: bool,
    /// Currently leads or travels with a party.
    pub has_party: bool,
}

/// What the host knows about an actor right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorProfile {
    /// The actor.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Role flags.
    pub roles: ActorRoles,
    /// Faction the actor is affiliated with.
    pub faction: Option<FactionId>,
    /// Settlement the actor currently lives in or belongs to.
    pub settlement: Option<SettlementId>,
    /// Category of the weapon in the actor's first weapon slot.
    pub primary_weapon: Option<ItemCategory>,
}

impl ActorProfile {
    /// A profile with no roles, faction, settlement or weapon.
    #[must_use]
    pub fn new(id: ActorId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roles: ActorRoles::default(),
            faction: None,
            settlement: None,
            primary_weapon: None,
        }
    }

    /// Set the role flags.
    #[must_use]
    pub fn with_roles(mut self, roles: ActorRoles) -> Self {
        self.roles = roles;
        self
    }

    /// Set the faction.
    #[must_use]
    pub fn with_faction(mut self, faction: FactionId) -> Self {
        self.faction = Some(faction);
        self
    }

    /// Set the home settlement.
    #[must_use]
    pub fn with_settlement(mut self, settlement: SettlementId) -> Self {
        self.settlement = Some(settlement);
        self
    }

    /// Set the primary weapon category.
    #[must_use]
    pub fn with_primary_weapon(mut self, category: impl Into<String>) -> Self {
        self.primary_weapon = Some(ItemCategory::new(category));
        self
    }
}

/// What the host knows about a settlement right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementProfile {
    /// The settlement.
    pub id: SettlementId,
    /// Display name.
    pub name: String,
    /// Towns have markets; castles and villages do not.
    pub is_town: bool,
    /// Food stocks have run out.
    pub is_starving: bool,
    /// Faction owning the settlement.
    pub owner_faction: Option<FactionId>,
}

// ---------------------------------------------------------------------------
// Host interfaces
// ---------------------------------------------------------------------------

/// Read-only view of the host world.
///
/// Every method must be free of side effects; predicates call them
/// repeatedly and in no particular order.
pub trait WorldQuery {
    /// Look up an actor. `None` when the actor no longer exists.
    fn actor(&self, id: ActorId) -> Option<ActorProfile>;
    /// Look up a settlement. `None` when it no longer resolves.
    fn settlement(&self, id: SettlementId) -> Option<SettlementProfile>;
    /// The player-controlled actor.
    fn player(&self) -> ActorId;
    /// The player's faction, if any.
    fn player_faction(&self) -> Option<FactionId>;
    /// Relation score between an actor and the player.
    fn relation_with_player(&self, actor: ActorId) -> i32;
    /// Whether two factions are at war.
    fn is_at_war(&self, a: FactionId, b: FactionId) -> bool;
    /// Current contents of the player's inventory, in host iteration order.
    fn player_inventory(&self) -> Vec<ItemStack>;
}

/// A mutation the engine asks the host to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Move currency. `from: None` mints it.
    TransferGold {
        /// Paying actor.
        from: Option<ActorId>,
        /// Receiving actor.
        to: ActorId,
        /// Amount in the host currency.
        amount: u32,
    },
    /// Change an actor's relation with the player.
    AdjustRelation {
        /// The actor.
        actor: ActorId,
        /// Signed change.
        delta: i32,
    },
    /// Remove items from the player's inventory.
    RemoveItem {
        /// Item to remove.
        item: ItemId,
        /// How many.
        count: u32,
    },
    /// Change settlement counters.
    AdjustSettlement {
        /// The settlement.
        settlement: SettlementId,
        /// Prosperity change.
        prosperity: i32,
        /// Militia change.
        militia: i32,
    },
    /// Change a notable's power.
    AddPower {
        /// The actor.
        actor: ActorId,
        /// Signed change.
        delta: i32,
    },
    /// Grant the player trait experience.
    GrantTraitXp {
        /// Which trait.
        trait_kind: TraitKind,
        /// Experience points.
        amount: i32,
    },
    /// A journal entry was added to a quest.
    JournalAdded {
        /// Owning quest.
        quest: QuestId,
        /// The new entry.
        entry: LogEntry,
    },
    /// A journal entry was removed from a quest.
    JournalRemoved {
        /// Owning quest.
        quest: QuestId,
        /// The removed entry.
        log: LogId,
    },
    /// A discrete journal entry's progress changed.
    JournalProgress {
        /// Owning quest.
        quest: QuestId,
        /// The entry.
        log: LogId,
        /// New current value.
        current: u32,
    },
    /// Show a short message to the player.
    Notify {
        /// Message text.
        text: String,
    },
}

/// Mutation sink implemented by the host.
pub trait WorldActions {
    /// Perform one mutation. Must not call back into the engine.
    fn apply(&mut self, action: Action);
}

/// A host that can be both queried and mutated.
pub trait Host: WorldQuery + WorldActions {}

impl<T: WorldQuery + WorldActions + ?Sized> Host for T {}

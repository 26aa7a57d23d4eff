//! In-memory host world.
//!
//! [`SandboxWorld`] implements both host interfaces over plain maps, applies
//! every [`Action`] to its own state and keeps a log of what was applied.
//! Tests and benches drive the engine through it; hosts can use it to
//! prototype before wiring the real simulation.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::progress::LogEntry;
use crate::types::{ActorId, FactionId, ItemId, ItemStack, QuestId, SettlementId, TraitKind};

use super::{Action, ActorProfile, SettlementProfile, WorldActions, WorldQuery};

/// Settlement state tracked by the sandbox.
#[derive(Debug, Clone)]
struct SandboxSettlement {
    profile: SettlementProfile,
    prosperity: i32,
    militia: i32,
}

/// A self-contained world for driving the engine without a game.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    player: ActorId,
    player_faction: Option<FactionId>,
    player_gold: i64,
    actors: HashMap<ActorId, ActorProfile>,
    settlements: HashMap<SettlementId, SandboxSettlement>,
    relations: HashMap<ActorId, i32>,
    wars: HashSet<(FactionId, FactionId)>,
    inventory: Vec<ItemStack>,
    power: HashMap<ActorId, i32>,
    traits: HashMap<TraitKind, i32>,
    journals: BTreeMap<QuestId, Vec<LogEntry>>,
    notifications: Vec<String>,
    applied: Vec<Action>,
}

impl SandboxWorld {
    /// An empty world with a fresh player actor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            player: ActorId::new(),
            player_faction: None,
            player_gold: 0,
            actors: HashMap::new(),
            settlements: HashMap::new(),
            relations: HashMap::new(),
            wars: HashSet::new(),
            inventory: Vec::new(),
            power: HashMap::new(),
            traits: HashMap::new(),
            journals: BTreeMap::new(),
            notifications: Vec::new(),
            applied: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // World setup
    // ------------------------------------------------------------------

    /// Put the player in a faction.
    pub fn set_player_faction(&mut self, faction: Option<FactionId>) {
        self.player_faction = faction;
    }

    /// Add or replace an actor.
    pub fn add_actor(&mut self, profile: ActorProfile) -> ActorId {
        let id = profile.id;
        self.actors.insert(id, profile);
        id
    }

    /// Mutable access to an actor, for scenario changes.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut ActorProfile> {
        self.actors.get_mut(&id)
    }

    /// Remove an actor from the world (death, disappearance).
    pub fn remove_actor(&mut self, id: ActorId) {
        self.actors.remove(&id);
    }

    /// Add or replace a settlement.
    pub fn add_settlement(&mut self, profile: SettlementProfile) -> SettlementId {
        let id = profile.id;
        self.settlements.insert(
            id,
            SandboxSettlement {
                profile,
                prosperity: 0,
                militia: 0,
            },
        );
        id
    }

    /// Remove a settlement from the world.
    pub fn remove_settlement(&mut self, id: SettlementId) {
        self.settlements.remove(&id);
    }

    /// Flip a settlement's starvation flag.
    pub fn set_starving(&mut self, id: SettlementId, starving: bool) {
        if let Some(s) = self.settlements.get_mut(&id) {
            s.profile.is_starving = starving;
        }
    }

    /// Set an actor's relation with the player.
    pub fn set_relation(&mut self, actor: ActorId, value: i32) {
        self.relations.insert(actor, value);
    }

    /// Put two factions at war.
    pub fn declare_war(&mut self, a: FactionId, b: FactionId) {
        self.wars.insert(war_key(a, b));
    }

    /// End a war.
    pub fn make_peace(&mut self, a: FactionId, b: FactionId) {
        self.wars.remove(&war_key(a, b));
    }

    /// Add items to the player's inventory, merging with an existing stack.
    pub fn give_item(&mut self, stack: ItemStack) {
        if let Some(existing) = self.inventory.iter_mut().find(|s| s.item == stack.item) {
            existing.count += stack.count;
        } else {
            self.inventory.push(stack);
        }
    }

    /// Remove up to `count` items; returns how many were removed.
    pub fn take_item(&mut self, item: &ItemId, count: u32) -> u32 {
        let Some(pos) = self.inventory.iter().position(|s| &s.item == item) else {
            return 0;
        };
        let stack = &mut self.inventory[pos];
        let removed = stack.count.min(count);
        stack.count -= removed;
        if stack.count == 0 {
            self.inventory.remove(pos);
        }
        removed
    }

    /// Set the player's gold.
    pub fn set_gold(&mut self, gold: i64) {
        self.player_gold = gold;
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Player gold.
    #[must_use]
    pub fn gold(&self) -> i64 {
        self.player_gold
    }

    /// Relation between `actor` and the player.
    #[must_use]
    pub fn relation(&self, actor: ActorId) -> i32 {
        self.relations.get(&actor).copied().unwrap_or(0)
    }

    /// Settlement prosperity and militia, relative to the starting value.
    #[must_use]
    pub fn settlement_counters(&self, id: SettlementId) -> Option<(i32, i32)> {
        self.settlements.get(&id).map(|s| (s.prosperity, s.militia))
    }

    /// Accumulated power change of a notable.
    #[must_use]
    pub fn power(&self, actor: ActorId) -> i32 {
        self.power.get(&actor).copied().unwrap_or(0)
    }

    /// Accumulated player trait experience.
    #[must_use]
    pub fn trait_xp(&self, kind: TraitKind) -> i32 {
        self.traits.get(&kind).copied().unwrap_or(0)
    }

    /// Journal entries mirrored for a quest.
    #[must_use]
    pub fn journal(&self, quest: QuestId) -> &[LogEntry] {
        self.journals.get(&quest).map_or(&[], Vec::as_slice)
    }

    /// Messages shown to the player.
    #[must_use]
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    /// Every action applied so far, in order.
    #[must_use]
    pub fn applied(&self) -> &[Action] {
        &self.applied
    }

    /// Drain the applied-action log.
    pub fn take_applied(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.applied)
    }

    /// Count applied actions matching a predicate.
    pub fn count_applied(&self, pred: impl Fn(&Action) -> bool) -> usize {
        self.applied.iter().filter(|a| pred(a)).count()
    }
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn war_key(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl WorldQuery for SandboxWorld {
    fn actor(&self, id: ActorId) -> Option<ActorProfile> {
        self.actors.get(&id).cloned()
    }

    fn settlement(&self, id: SettlementId) -> Option<SettlementProfile> {
        self.settlements.get(&id).map(|s| s.profile.clone())
    }

    fn player(&self) -> ActorId {
        self.player
    }

    fn player_faction(&self) -> Option<FactionId> {
        self.player_faction
    }

    fn relation_with_player(&self, actor: ActorId) -> i32 {
        self.relation(actor)
    }

    fn is_at_war(&self, a: FactionId, b: FactionId) -> bool {
        a != b && self.wars.contains(&war_key(a, b))
    }

    fn player_inventory(&self) -> Vec<ItemStack> {
        self.inventory.clone()
    }
}

impl WorldActions for SandboxWorld {
    fn apply(&mut self, action: Action) {
        match &action {
            Action::TransferGold { from, to, amount } => {
                if *to == self.player {
                    self.player_gold += i64::from(*amount);
                } else if *from == Some(self.player) {
                    self.player_gold -= i64::from(*amount);
                }
            }
            Action::AdjustRelation { actor, delta } => {
                *self.relations.entry(*actor).or_insert(0) += delta;
            }
            Action::RemoveItem { item, count } => {
                self.take_item(item, *count);
            }
            Action::AdjustSettlement {
                settlement,
                prosperity,
                militia,
            } => {
                if let Some(s) = self.settlements.get_mut(settlement) {
                    s.prosperity += prosperity;
                    s.militia += militia;
                }
            }
            Action::AddPower { actor, delta } => {
                *self.power.entry(*actor).or_insert(0) += delta;
            }
            Action::GrantTraitXp { trait_kind, amount } => {
                *self.traits.entry(*trait_kind).or_insert(0) += amount;
            }
            Action::JournalAdded { quest, entry } => {
                self.journals.entry(*quest).or_default().push(entry.clone());
            }
            Action::JournalRemoved { quest, log } => {
                if let Some(entries) = self.journals.get_mut(quest) {
                    entries.retain(|e| e.id != *log);
                }
            }
            Action::JournalProgress { quest, log, current } => {
                if let Some(entry) = self
                    .journals
                    .get_mut(quest)
                    .and_then(|entries| entries.iter_mut().find(|e| e.id == *log))
                {
                    if let Some(progress) = entry.progress.as_mut() {
                        progress.current = *current;
                    }
                }
            }
            Action::Notify { text } => self.notifications.push(text.clone()),
        }
        self.applied.push(action);
    }
}

//! Predicate library — pure checks against host state.
//!
//! Nothing here mutates or caches. Every function may be called any number
//! of times, for any candidate, in any order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, ItemCategory, ItemStack, SettlementId};
use crate::world::{ActorProfile, WorldQuery};

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Which inventory items count towards an objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Required category.
    pub category: ItemCategory,
    /// Minimum value per item, if any.
    pub min_value: Option<u32>,
}

impl ItemFilter {
    /// Exact category match.
    #[must_use]
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: ItemCategory::new(category),
            min_value: None,
        }
    }

    /// Category match plus a minimum value per item.
    #[must_use]
    pub fn category_with_min_value(category: impl Into<String>, min_value: u32) -> Self {
        Self {
            category: ItemCategory::new(category),
            min_value: Some(min_value),
        }
    }

    /// Whether a stack qualifies.
    #[must_use]
    pub fn matches(&self, stack: &ItemStack) -> bool {
        stack.category == self.category && self.min_value.is_none_or(|min| stack.value >= min)
    }

    /// Total number of qualifying items across all stacks.
    #[must_use]
    pub fn count_in(&self, inventory: &[ItemStack]) -> u32 {
        inventory
            .iter()
            .filter(|s| self.matches(s))
            .fold(0u32, |acc, s| acc.saturating_add(s.count))
    }

    /// First qualifying non-empty stack in inventory order.
    #[must_use]
    pub fn first_match<'a>(&self, inventory: &'a [ItemStack]) -> Option<&'a ItemStack> {
        inventory.iter().find(|s| s.count > 0 && self.matches(s))
    }

    /// Whether any stack in a batch qualifies.
    #[must_use]
    pub fn touches(&self, batch: &[ItemStack]) -> bool {
        batch.iter().any(|s| self.matches(s))
    }
}

// ---------------------------------------------------------------------------
// Relations & war
// ---------------------------------------------------------------------------

/// Whether `actor`'s relation with the player is strictly below `threshold`.
#[must_use]
pub fn relation_below<W: WorldQuery + ?Sized>(world: &W, actor: ActorId, threshold: i32) -> bool {
    world.relation_with_player(actor) < threshold
}

/// Whether `actor`'s faction is at war with the player's faction.
///
/// False when either side has no faction or the actor no longer exists.
#[must_use]
pub fn at_war_with_player<W: WorldQuery + ?Sized>(world: &W, actor: ActorId) -> bool {
    let Some(theirs) = world.actor(actor).and_then(|a| a.faction) else {
        return false;
    };
    world
        .player_faction()
        .is_some_and(|ours| world.is_at_war(theirs, ours))
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A faction or clan leader outside minor factions and the player's clan.
#[must_use]
pub fn is_noble(profile: &ActorProfile) -> bool {
    let roles = profile.roles;
    (roles.is_faction_leader || roles.is_clan_leader)
        && !roles.is_minor_faction_hero
        && !roles.is_in_player_clan
}

/// A merchant notable whose settlement is a town.
#[must_use]
pub fn is_town_merchant<W: WorldQuery + ?Sized>(world: &W, profile: &ActorProfile) -> bool {
    profile.roles.is_merchant
        && profile
            .settlement
            .and_then(|id| world.settlement(id))
            .is_some_and(|s| s.is_town)
}

/// Whether a settlement resolves and is starving.
#[must_use]
pub fn settlement_is_starving<W: WorldQuery + ?Sized>(world: &W, settlement: SettlementId) -> bool {
    world.settlement(settlement).is_some_and(|s| s.is_starving)
}

// ---------------------------------------------------------------------------
// Accept-time preconditions
// ---------------------------------------------------------------------------

/// Why the player may not take an issue right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    /// Relation with the giver is too low.
    Relation,
    /// The giver's faction is at war with the player's.
    AtWar,
}

impl BlockReason {
    /// Stable reason string shown to the player.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relation => "Relation",
            Self::AtWar => "AtWar",
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept-time refusal, carrying every failed precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptBlocked {
    /// Failed preconditions, in check order.
    pub reasons: Vec<BlockReason>,
}

impl AcceptBlocked {
    /// Whether a given reason is among the failures.
    #[must_use]
    pub fn has(&self, reason: BlockReason) -> bool {
        self.reasons.contains(&reason)
    }
}

impl fmt::Display for AcceptBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.reasons.iter().map(|r| r.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Shared accept preconditions: relation floor and no war with the giver.
///
/// # Errors
/// Returns [`AcceptBlocked`] listing every failed check.
pub fn check_accept<W: WorldQuery + ?Sized>(
    world: &W,
    giver: ActorId,
    min_relation: i32,
) -> Result<(), AcceptBlocked> {
    let mut reasons = Vec::new();
    if relation_below(world, giver, min_relation) {
        reasons.push(BlockReason::Relation);
    }
    if at_war_with_player(world, giver) {
        reasons.push(BlockReason::AtWar);
    }
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(AcceptBlocked { reasons })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FactionId;
    use crate::world::sandbox::SandboxWorld;
    use crate::world::{ActorRoles, SettlementProfile};

    #[test]
    fn filter_respects_min_value() {
        let filter = ItemFilter::category_with_min_value("sword", 3000);
        assert!(filter.matches(&ItemStack::new("a", "sword", 3000, 1)));
        assert!(!filter.matches(&ItemStack::new("b", "sword", 2999, 1)));
        assert!(!filter.matches(&ItemStack::new("c", "axe", 9000, 1)));
    }

    #[test]
    fn count_sums_qualifying_stacks_only() {
        let filter = ItemFilter::category("grain");
        let inventory = vec![
            ItemStack::new("grain", "grain", 10, 7),
            ItemStack::new("fish", "fish", 10, 4),
            ItemStack::new("grain_b", "grain", 12, 3),
        ];
        assert_eq!(filter.count_in(&inventory), 10);
        assert_eq!(
            filter.first_match(&inventory).map(|s| s.item.0.as_str()),
            Some("grain")
        );
    }

    #[test]
    fn relation_threshold_is_strict() {
        let mut world = SandboxWorld::new();
        let actor = ActorId::new();
        world.set_relation(actor, -10);
        assert!(!relation_below(&world, actor, -10));
        world.set_relation(actor, -11);
        assert!(relation_below(&world, actor, -10));
    }

    #[test]
    fn war_needs_both_factions() {
        let mut world = SandboxWorld::new();
        let (theirs, ours) = (FactionId::new(), FactionId::new());
        let noble = world.add_actor(ActorProfile::new(ActorId::new(), "Derthert").with_faction(theirs));
        world.declare_war(theirs, ours);
        assert!(!at_war_with_player(&world, noble));

        world.set_player_faction(Some(ours));
        assert!(at_war_with_player(&world, noble));
    }

    #[test]
    fn nobility_excludes_minor_factions_and_player_clan() {
        let leader = ActorRoles {
            is_clan_leader: true,
            ..ActorRoles::default()
        };
        let profile = ActorProfile::new(ActorId::new(), "x").with_roles(leader);
        assert!(is_noble(&profile));

        let minor = profile.clone().with_roles(ActorRoles {
            is_minor_faction_hero: true,
            ..leader
        });
        assert!(!is_noble(&minor));

        let kin = profile.with_roles(ActorRoles {
            is_in_player_clan: true,
            ..leader
        });
        assert!(!is_noble(&kin));
    }

    #[test]
    fn town_merchant_requires_town() {
        let mut world = SandboxWorld::new();
        let village = world.add_settlement(SettlementProfile {
            id: SettlementId::new(),
            name: "Village".into(),
            is_town: false,
            is_starving: true,
            owner_faction: None,
        });
        let merchant = ActorProfile::new(ActorId::new(), "m")
            .with_roles(ActorRoles {
                is_merchant: true,
                ..ActorRoles::default()
            })
            .with_settlement(village);
        assert!(!is_town_merchant(&world, &merchant));
        assert!(settlement_is_starving(&world, village));
    }

    #[test]
    fn accept_reports_all_reasons() {
        let mut world = SandboxWorld::new();
        let (theirs, ours) = (FactionId::new(), FactionId::new());
        let giver = world.add_actor(ActorProfile::new(ActorId::new(), "g").with_faction(theirs));
        world.set_player_faction(Some(ours));
        world.set_relation(giver, -15);
        world.declare_war(theirs, ours);

        let blocked = check_accept(&world, giver, -10).expect_err("blocked");
        assert!(blocked.has(BlockReason::Relation));
        assert!(blocked.has(BlockReason::AtWar));
        assert_eq!(blocked.to_string(), "Relation, AtWar");
    }
}

//! Weapon commission — a noble wants a fine weapon of their favoured class.
//!
//! The candidate must lead a faction or clan, stand outside minor factions
//! and the player's clan, travel with a party and carry a weapon. The
//! objective is one weapon of that class worth at least the configured
//! value; the giver pays a multiple of what the handed-over weapon is worth.

use tracing::debug;

use crate::config::WeaponCommissionConfig;
use crate::dialog::DialogLines;
use crate::events::EventKind;
use crate::predicate::{self, AcceptBlocked, ItemFilter};
use crate::types::{ActorId, IssueFrequency, ItemCategory, ItemStack};
use crate::world::{Action, Host, WorldQuery};

use super::{
    actor_name, EffectBundle, IssueTemplate, QuestPayload, QuestSeed, QuestTemplate,
    QuestTexts, TemplateKind,
};

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::InventoryExchange,
    EventKind::WarDeclared,
    EventKind::AffiliationChanged,
    EventKind::MapEventStarted,
];

/// Issue side: eligibility and quest generation.
#[derive(Debug, Clone)]
pub struct WeaponCommissionTemplate {
    config: WeaponCommissionConfig,
    min_relation: i32,
}

impl WeaponCommissionTemplate {
    /// Configure the template.
    #[must_use]
    pub fn new(config: WeaponCommissionConfig, min_relation: i32) -> Self {
        Self {
            config,
            min_relation,
        }
    }

    fn wanted_category<W: WorldQuery + ?Sized>(world: &W, owner: ActorId) -> Option<ItemCategory> {
        world.actor(owner).and_then(|a| a.primary_weapon)
    }
}

impl IssueTemplate for WeaponCommissionTemplate {
    fn kind(&self) -> TemplateKind {
        TemplateKind::WeaponCommission
    }

    fn frequency(&self) -> IssueFrequency {
        self.config.frequency
    }

    fn is_eligible<W: WorldQuery + ?Sized>(&self, world: &W, candidate: ActorId) -> bool {
        world.actor(candidate).is_some_and(|profile| {
            predicate::is_noble(&profile)
                && profile.roles.has_party
                && profile.primary_weapon.is_some()
        })
    }

    fn stays_alive<W: WorldQuery + ?Sized>(&self, _world: &W, _owner: ActorId) -> bool {
        true
    }

    fn title<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        format!("{} needs a new weapon", actor_name(world, owner))
    }

    fn description<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        let category = Self::wanted_category(world, owner)
            .map_or_else(|| "weapon".to_string(), |c| c.0);
        format!(
            "{} is looking for a {category} worth at least {} denars and will pay handsomely for it.",
            actor_name(world, owner),
            self.config.min_value
        )
    }

    fn accept_preconditions<W: WorldQuery + ?Sized>(
        &self,
        world: &W,
        owner: ActorId,
    ) -> Result<(), AcceptBlocked> {
        predicate::check_accept(world, owner, self.min_relation)
    }

    fn generate_quest<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> Option<QuestSeed> {
        let category = Self::wanted_category(world, owner)?;
        Some(QuestSeed {
            payload: QuestPayload::WeaponCommission(WeaponCommission {
                category,
                min_value: self.config.min_value,
                payout_multiplier: self.config.payout_multiplier,
                success: EffectBundle::relation(self.config.success_relation),
                failure: EffectBundle::relation(self.config.failure_relation),
            }),
            reward_gold: 0,
        })
    }

    fn on_issue_timeout<H: Host + ?Sized>(&self, _host: &mut H, owner: ActorId) {
        debug!(owner = %owner, "Weapon commission expired unanswered");
    }
}

/// Quest side: the weapon wanted and the terms of the deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponCommission {
    /// Weapon class the giver favours.
    pub category: ItemCategory,
    /// Minimum value of a qualifying weapon.
    pub min_value: u32,
    /// Payout is this many times the handed-over weapon's value.
    pub payout_multiplier: u32,
    /// Applied on success.
    pub success: EffectBundle,
    /// Applied on timeout.
    pub failure: EffectBundle,
}

impl QuestTemplate for WeaponCommission {
    fn kind(&self) -> TemplateKind {
        TemplateKind::WeaponCommission
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn objective(&self) -> (ItemFilter, u32) {
        (
            ItemFilter::category_with_min_value(self.category.as_str(), self.min_value),
            1,
        )
    }

    fn texts(&self, giver: &str, place: &str) -> QuestTexts {
        let category = &self.category;
        QuestTexts::with_common(
            giver,
            format!("{giver} needs a new weapon"),
            format!(
                "{giver} of {place} asked you to find a {category} worth at least {} denars. \
                 {giver} will pay {} times its value.",
                self.min_value, self.payout_multiplier
            ),
            "Weapon found".to_string(),
            format!("You have a suitable {category}. Bring it to {giver}."),
            format!("You have a {category} that should satisfy {giver}."),
            format!("{giver} took the {category} and paid you well for it."),
            format!("You failed to bring {giver} a {category} in time."),
        )
    }

    fn dialog_lines(&self, giver: &str) -> DialogLines {
        let category = &self.category;
        DialogLines {
            offer: format!("Bring me a fine {category} and you will not regret it."),
            accept: "I will find one for you.".to_string(),
            discuss_prompt: format!("Have you found me a {category}?"),
            hand_over: format!("Here is your {category}, {giver}."),
            still_working: "Not yet. I am still looking.".to_string(),
            thanks: "A fine piece. Here is your payment.".to_string(),
            waiting: "Do not keep me waiting too long.".to_string(),
            missing_items: format!(
                "You don't have a {category} worth at least {} denars.",
                self.min_value
            ),
        }
    }

    fn settle(&self, inventory: &[ItemStack], player: ActorId, reward_gold: u32) -> Option<Vec<Action>> {
        let (filter, _) = self.objective();
        let weapon = filter.first_match(inventory)?;
        let payout = weapon
            .value
            .saturating_mul(self.payout_multiplier)
            .saturating_add(reward_gold);
        Some(vec![
            Action::TransferGold {
                from: None,
                to: player,
                amount: payout,
            },
            Action::RemoveItem {
                item: weapon.item.clone(),
                count: 1,
            },
        ])
    }

    fn success_effects(&self) -> &EffectBundle {
        &self.success
    }

    fn failure_effects(&self) -> &EffectBundle {
        &self.failure
    }

    fn cancels_on_raid(&self) -> bool {
        false
    }
}

//! Supply delivery — a merchant in a starving town needs goods.
//!
//! Offered by merchant notables whose town is starving, and withdrawn as
//! soon as the town is fed again. A raid on the town cancels the quest.

use tracing::debug;

use crate::config::SupplyDeliveryConfig;
use crate::dialog::DialogLines;
use crate::events::EventKind;
use crate::predicate::{self, AcceptBlocked, ItemFilter};
use crate::types::{ActorId, IssueFrequency, ItemCategory, ItemStack, TraitKind};
use crate::world::{Action, Host, WorldQuery};

use super::{
    actor_name, home_name, EffectBundle, IssueTemplate, QuestPayload, QuestSeed, QuestTemplate,
    QuestTexts, TemplateKind,
};

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::InventoryExchange,
    EventKind::WarDeclared,
    EventKind::AffiliationChanged,
    EventKind::MapEventStarted,
    EventKind::RaidCompleted,
];

/// Issue side: eligibility, survival and quest generation.
#[derive(Debug, Clone)]
pub struct SupplyDeliveryTemplate {
    config: SupplyDeliveryConfig,
    min_relation: i32,
}

impl SupplyDeliveryTemplate {
    /// Configure the template.
    #[must_use]
    pub fn new(config: SupplyDeliveryConfig, min_relation: i32) -> Self {
        Self {
            config,
            min_relation,
        }
    }

    fn home_is_starving<W: WorldQuery + ?Sized>(world: &W, owner: ActorId) -> bool {
        world
            .actor(owner)
            .and_then(|a| a.settlement)
            .is_some_and(|s| predicate::settlement_is_starving(world, s))
    }
}

impl IssueTemplate for SupplyDeliveryTemplate {
    fn kind(&self) -> TemplateKind {
        TemplateKind::SupplyDelivery
    }

    fn frequency(&self) -> IssueFrequency {
        self.config.frequency
    }

    fn is_eligible<W: WorldQuery + ?Sized>(&self, world: &W, candidate: ActorId) -> bool {
        world.actor(candidate).is_some_and(|profile| {
            predicate::is_town_merchant(world, &profile) && Self::home_is_starving(world, candidate)
        })
    }

    fn stays_alive<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> bool {
        Self::home_is_starving(world, owner)
    }

    fn title<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        format!("{} is starving", home_name(world, owner))
    }

    fn description<W: WorldQuery + ?Sized>(&self, world: &W, owner: ActorId) -> String {
        format!(
            "The stores of {} are empty. {} asks for {} loads of {} and offers {} denars.",
            home_name(world, owner),
            actor_name(world, owner),
            self.config.needed,
            self.config.category,
            self.config.reward_gold
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
        world.actor(owner)?.settlement?;
        let c = &self.config;
        Some(QuestSeed {
            payload: QuestPayload::SupplyDelivery(SupplyDelivery {
                category: ItemCategory::new(c.category.clone()),
                needed: c.needed,
                success: EffectBundle {
                    relation: c.success_relation,
                    giver_power: c.success_power,
                    prosperity: c.success_prosperity,
                    militia: c.success_militia,
                    traits: vec![
                        (TraitKind::Mercy, c.mercy_xp),
                        (TraitKind::Generosity, c.generosity_xp),
                    ],
                },
                failure: EffectBundle {
                    relation: c.failure_relation,
                    giver_power: c.failure_power,
                    prosperity: c.failure_prosperity,
                    militia: 0,
                    traits: Vec::new(),
                },
            }),
            reward_gold: c.reward_gold,
        })
    }

    fn on_issue_timeout<H: Host + ?Sized>(&self, _host: &mut H, owner: ActorId) {
        debug!(owner = %owner, "Supply request expired unanswered");
    }
}

/// Quest side: what the town needs and what it gives back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyDelivery {
    /// Category of the goods.
    pub category: ItemCategory,
    /// Number of items to hand over.
    pub needed: u32,
    /// Applied on success.
    pub success: EffectBundle,
    /// Applied on timeout.
    pub failure: EffectBundle,
}

impl QuestTemplate for SupplyDelivery {
    fn kind(&self) -> TemplateKind {
        TemplateKind::SupplyDelivery
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn objective(&self) -> (ItemFilter, u32) {
        (ItemFilter::category(self.category.as_str()), self.needed)
    }

    fn texts(&self, giver: &str, place: &str) -> QuestTexts {
        let (needed, category) = (self.needed, &self.category);
        QuestTexts::with_common(
            giver,
            format!("{place} is starving"),
            format!("{giver} asked you to bring {needed} {category} to the starving people of {place}."),
            format!("{category} collected"),
            format!("You have enough {category}. Take it to {giver} in {place}."),
            format!("You have enough {category} for {place}."),
            format!("You delivered {needed} {category} to {giver}. {place} will eat tonight."),
            format!("You did not bring the {category} to {place} in time."),
        )
    }

    fn dialog_lines(&self, giver: &str) -> DialogLines {
        let (needed, category) = (self.needed, &self.category);
        DialogLines {
            offer: format!("Bless you. We need {needed} {category}, as soon as you can manage."),
            accept: "I will bring what you need.".to_string(),
            discuss_prompt: "Have you brought the supplies?".to_string(),
            hand_over: format!("Here are the {category}, {giver}."),
            still_working: "Not yet, I am still gathering them.".to_string(),
            thanks: "You have saved many lives today.".to_string(),
            waiting: "Please hurry. People are going hungry.".to_string(),
            missing_items: format!("You don't have {needed} {category}."),
        }
    }

    fn settle(&self, inventory: &[ItemStack], player: ActorId, reward_gold: u32) -> Option<Vec<Action>> {
        let (filter, needed) = self.objective();
        if filter.count_in(inventory) < needed {
            return None;
        }
        let mut actions = vec![Action::TransferGold {
            from: None,
            to: player,
            amount: reward_gold,
        }];
        let mut remaining = needed;
        for stack in inventory.iter().filter(|s| filter.matches(s)) {
            if remaining == 0 {
                break;
            }
            let take = stack.count.min(remaining);
            if take > 0 {
                actions.push(Action::RemoveItem {
                    item: stack.item.clone(),
                    count: take,
                });
                remaining -= take;
            }
        }
        Some(actions)
    }

    fn success_effects(&self) -> &EffectBundle {
        &self.success
    }

    fn failure_effects(&self) -> &EffectBundle {
        &self.failure
    }

    fn cancels_on_raid(&self) -> bool {
        true
    }
}
